use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tracing::Instrument;

use super::key::{effective_phase, photo_key};
use super::normalize::{normalize, NormalizeOptions};
use crate::broadcast::{Channel, JobEvent, NotificationTransport};
use crate::catalog::FeatureCatalog;
use crate::categories::{required_keys, Phase};
use crate::db::Persistence;
use crate::error::UploadError;
use crate::lifecycle::{Clock, Job, JobStatus, PhotoRecord};
use crate::storage::BlobStore;

/// Runtime limits for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    pub normalize: NormalizeOptions,
    /// Hard limit for one file, normalization and storage included.
    pub timeout: Duration,
    /// Files in flight at once during a batch.
    pub max_concurrent: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            normalize: NormalizeOptions::default(),
            timeout: Duration::from_secs(30),
            max_concurrent: 4,
        }
    }
}

/// One captured file destined for a job category.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub job_id: String,
    pub phase: Phase,
    pub category_key: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadRequest {
    pub fn new(job_id: &str, phase: Phase, category_key: &str, filename: &str, bytes: Vec<u8>) -> Self {
        Self {
            job_id: job_id.to_string(),
            phase,
            category_key: category_key.to_string(),
            filename: filename.to_string(),
            bytes,
        }
    }
}

/// Result of one file in a batch.
#[derive(Debug)]
pub struct UploadOutcome {
    pub filename: String,
    pub category_key: String,
    pub result: Result<PhotoRecord, UploadError>,
}

impl UploadOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct UploadPipeline {
    store: Arc<dyn Persistence>,
    blobs: Arc<dyn BlobStore>,
    catalog: Arc<FeatureCatalog>,
    notifier: Arc<dyn NotificationTransport>,
    clock: Arc<dyn Clock>,
    settings: UploadSettings,
}

impl UploadPipeline {
    pub fn new(
        store: Arc<dyn Persistence>,
        blobs: Arc<dyn BlobStore>,
        catalog: Arc<FeatureCatalog>,
        notifier: Arc<dyn NotificationTransport>,
        clock: Arc<dyn Clock>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            store,
            blobs,
            catalog,
            notifier,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Normalizes and stores one file, then records it as a confirmed photo.
    ///
    /// A timeout or failure affects this file only. Nothing is recorded
    /// unless the blob write finished within the time limit.
    pub async fn upload(&self, request: UploadRequest) -> Result<PhotoRecord, UploadError> {
        let span = tracing::info_span!(
            "upload.file",
            job_id = %request.job_id,
            category = %request.category_key,
            phase = %request.phase,
        );
        let job_id = request.job_id.clone();
        let category_key = request.category_key.clone();

        let result = self.upload_inner(request).instrument(span).await;
        match &result {
            Ok(photo) => log::info!(
                "Uploaded {} photo for job {} ({})",
                photo.category_key,
                photo.job_id,
                photo.storage_ref
            ),
            Err(e) if e.is_timeout() => {
                log::info!("Upload timed out for job {} category {}: {}", job_id, category_key, e)
            }
            Err(e) => log::debug!("Upload failed for job {} category {}: {}", job_id, category_key, e),
        }
        result
    }

    async fn upload_inner(&self, request: UploadRequest) -> Result<PhotoRecord, UploadError> {
        let Some(job) = self.store.read_job(&request.job_id)? else {
            return Err(UploadError::JobNotFound(request.job_id));
        };

        let phase = effective_phase(&self.catalog, &request.category_key, request.phase).ok_or_else(
            || UploadError::UnknownCategory {
                key: request.category_key.clone(),
                phase: request.phase,
            },
        )?;
        self.check_category(&job, &request.category_key, phase)?;

        let now = self.clock.now();
        let key = photo_key(&request.job_id, phase, &request.category_key, now, &request.filename);
        let options = self.settings.normalize;
        let raw = request.bytes;
        let filename = request.filename;

        let store_blob = async {
            let normalized = tokio::task::spawn_blocking(move || normalize(&raw, &options))
                .await
                .map_err(|e| UploadError::Normalize(format!("Normalization task failed: {}", e)))??;
            let source_mime = normalized.source_mime.clone().or_else(|| {
                mime_guess::from_path(&filename)
                    .first()
                    .map(|m| m.essence_str().to_string())
            });
            let storage_ref = self.blobs.put(&key, normalized.bytes).await?;
            Ok::<_, UploadError>((storage_ref, source_mime))
        };

        let (storage_ref, source_mime) = tokio::time::timeout(self.settings.timeout, store_blob)
            .await
            .map_err(|_| UploadError::Timeout {
                key: key.clone(),
                seconds: self.settings.timeout.as_secs(),
            })??;

        let photo = PhotoRecord {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: request.job_id,
            category_key: request.category_key,
            phase,
            storage_ref,
            source_mime,
            uploaded_at: now,
        };
        self.store.write_photo(&photo)?;

        self.notifier.publish(
            &Channel::job(&photo.job_id),
            JobEvent::photo_uploaded(
                &photo.job_id,
                &photo.category_key,
                photo.phase,
                &photo.storage_ref,
                now,
            ),
        );
        Ok(photo)
    }

    /// Before photos are only taken while the job is pending, and then any
    /// compare category the catalog knows is accepted since features may
    /// still arrive with the start. Everything else must be required by the
    /// job's current attributes.
    fn check_category(&self, job: &Job, category_key: &str, phase: Phase) -> Result<(), UploadError> {
        if phase == Phase::Before && job.status != JobStatus::Pending {
            return Err(UploadError::PhaseClosed {
                job_id: job.id.clone(),
                status: job.status,
            });
        }
        if phase == Phase::Before {
            return Ok(());
        }

        let required = required_keys(&self.catalog, job.unit_type, &job.features, phase);
        if required.iter().any(|k| k == category_key) {
            Ok(())
        } else {
            Err(UploadError::CategoryNotRequired {
                key: category_key.to_string(),
                phase,
            })
        }
    }

    /// Uploads files concurrently, at most `max_concurrent` at a time.
    /// Returns one outcome per request, in request order.
    pub async fn upload_batch(&self, requests: Vec<UploadRequest>) -> Vec<UploadOutcome> {
        let limit = self.settings.max_concurrent.max(1);
        let outcomes: Vec<UploadOutcome> = stream::iter(requests)
            .map(|request| async move {
                let filename = request.filename.clone();
                let category_key = request.category_key.clone();
                let result = self.upload(request).await;
                UploadOutcome {
                    filename,
                    category_key,
                    result,
                }
            })
            .buffered(limit)
            .collect()
            .await;

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        log::debug!("Batch finished: {} uploaded, {} failed", outcomes.len() - failed, failed);
        outcomes
    }
}
