//! Storage keys for uploaded photos.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::catalog::FeatureCatalog;
use crate::categories::Phase;

/// Phase a photo of `category_key` is recorded under when captured during
/// `phase`, or `None` when the catalog cannot produce that category.
///
/// Compare categories keep the capture phase. General areas are always
/// recorded as after.
pub fn effective_phase(catalog: &FeatureCatalog, category_key: &str, phase: Phase) -> Option<Phase> {
    if catalog.is_general_key(category_key) {
        Some(Phase::After)
    } else if catalog.is_compare_key(category_key) {
        Some(phase)
    } else {
        None
    }
}

/// Builds `{job}/{phase}/{category}/{timestamp}_{name}.jpg`.
///
/// The same inputs always give the same key. The timestamp has millisecond
/// resolution and the original file stem is kept, so two captures only
/// collide when both match.
pub fn photo_key(
    job_id: &str,
    effective_phase: Phase,
    category_key: &str,
    at: DateTime<Utc>,
    original_filename: &str,
) -> String {
    format!(
        "{}/{}/{}/{}_{}.jpg",
        sanitize_segment(job_id),
        effective_phase,
        sanitize_segment(category_key),
        at.format("%Y%m%dT%H%M%S%3fZ"),
        sanitize_segment(file_stem(original_filename)),
    )
}

fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("photo")
}

/// Keeps ASCII alphanumerics, `-` and `_`; everything else becomes `_`.
fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "photo".to_string()
    } else {
        trimmed.to_string()
    }
}
