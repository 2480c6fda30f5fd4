use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;

use crate::error::UploadError;

/// Bounds applied to every photo before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Longest edge in pixels after normalization.
    pub max_dimension: u32,
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_dimension: 1920,
            jpeg_quality: 80,
        }
    }
}

/// A re-encoded JPEG ready for storage.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Detected format of the raw capture.
    pub source_mime: Option<String>,
}

/// Decodes `raw`, shrinks it so its longest edge fits `max_dimension`
/// keeping the aspect ratio, and re-encodes it as JPEG. Smaller images are
/// not enlarged.
pub fn normalize(raw: &[u8], options: &NormalizeOptions) -> Result<NormalizedImage, UploadError> {
    let _span = tracing::info_span!("upload.normalize", bytes = raw.len()).entered();

    let source_mime = image::guess_format(raw)
        .ok()
        .map(|f| f.to_mime_type().to_string());

    let img = image::load_from_memory(raw)
        .map_err(|e| UploadError::Normalize(format!("Failed to decode image: {}", e)))?;

    let max = options.max_dimension.max(1);
    let (width, height) = img.dimensions();
    let img = if width > max || height > max {
        img.resize(max, max, FilterType::Triangle)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut buf = Cursor::new(Vec::new());
    let quality = options.jpeg_quality.clamp(1, 100);
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| UploadError::Normalize(format!("Failed to encode JPEG: {}", e)))?;

    Ok(NormalizedImage {
        bytes: buf.into_inner(),
        width,
        height,
        source_mime,
    })
}
