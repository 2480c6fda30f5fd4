//! Upload pipeline: normalize a capture, address it, store it, record it.

pub mod capture;
pub mod key;
pub mod normalize;
pub mod pipeline;

pub use capture::{CaptureEntry, CaptureId, CaptureSet, CaptureState};
pub use key::{effective_phase, photo_key};
pub use normalize::{normalize, NormalizeOptions, NormalizedImage};
pub use pipeline::{UploadOutcome, UploadPipeline, UploadRequest, UploadSettings};
