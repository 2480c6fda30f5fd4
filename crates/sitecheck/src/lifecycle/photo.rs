//! Photo records as seen by the lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::categories::Phase;

/// A confirmed photo: one successful upload for a job category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: String,
    pub job_id: String,
    pub category_key: String,
    pub phase: Phase,
    /// Reference returned by the blob store.
    pub storage_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_mime: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Number of photos stored for one category in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category_key: String,
    pub phase: Phase,
    pub count: u64,
}
