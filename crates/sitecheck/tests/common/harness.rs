//! Test harness for isolated integration tests.
//!
//! The `TestHarness` struct wires the full stack together:
//! - In-memory SQLite store behind the persistence trait
//! - Broadcast hub, manual clock and a file blob store in a temp directory
//! - Job lifecycle and upload pipeline sharing those collaborators
//! - Optional delays on the lifecycle's store to force overlapping calls

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use sitecheck::lifecycle::ManualClock;
use sitecheck::{
    Actor, AttributeUpdate, BlobStore, BroadcastHub, Database, FeatureCatalog, FileBlobStore, Job,
    JobDraft, JobLifecycle, Persistence, Phase, PhotoRecord, SqliteStore, UploadError,
    UploadPipeline, UploadRequest, UploadSettings,
};

use super::builders::{png, t0, ADMIN, WORKER};
use super::delayed_store::DelayedStore;

pub struct TestHarness {
    temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub hub: Arc<BroadcastHub>,
    pub clock: Arc<ManualClock>,
    pub catalog: Arc<FeatureCatalog>,
    pub lifecycle: Arc<JobLifecycle>,
    pub uploads: UploadPipeline,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_settings(UploadSettings::default())
    }

    pub fn with_settings(settings: UploadSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(temp_dir.path().join("photos")));
        Self::with_blob_store(temp_dir, blobs, settings)
    }

    /// Harness whose uploads go to `blobs` instead of the temp directory.
    pub fn with_blob_store(
        temp_dir: TempDir,
        blobs: Arc<dyn BlobStore>,
        settings: UploadSettings,
    ) -> Self {
        Self::build(temp_dir, blobs, settings, |store| store as Arc<dyn Persistence>)
    }

    /// Harness whose lifecycle reads and commits through a [`DelayedStore`].
    /// Uploads still go straight to the database.
    pub fn with_delays(read_delay: Duration, commit_delay: Duration) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(temp_dir.path().join("photos")));
        Self::build(temp_dir, blobs, UploadSettings::default(), |store| {
            Arc::new(
                DelayedStore::new(store)
                    .with_read_delay(read_delay)
                    .with_commit_delay(commit_delay),
            ) as Arc<dyn Persistence>
        })
    }

    fn build<F>(temp_dir: TempDir, blobs: Arc<dyn BlobStore>, settings: UploadSettings, wrap: F) -> Self
    where
        F: FnOnce(Arc<SqliteStore>) -> Arc<dyn Persistence>,
    {
        let store = Arc::new(SqliteStore::new(
            Database::open_in_memory().expect("Failed to open database"),
        ));
        let hub = Arc::new(BroadcastHub::new(64));
        let clock = Arc::new(ManualClock::new(t0()));
        let catalog = Arc::new(FeatureCatalog::default());

        let lifecycle = Arc::new(JobLifecycle::new(
            wrap(store.clone()),
            catalog.clone(),
            hub.clone(),
            clock.clone(),
        ));
        let uploads = UploadPipeline::new(
            store.clone(),
            blobs,
            catalog.clone(),
            hub.clone(),
            clock.clone(),
            settings,
        );

        Self {
            temp_dir,
            store,
            hub,
            clock,
            catalog,
            lifecycle,
            uploads,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn admin(&self) -> Actor {
        Actor::administrator(ADMIN)
    }

    pub fn worker(&self) -> Actor {
        Actor::worker(WORKER)
    }

    pub fn register(&self, draft: JobDraft) -> Job {
        self.lifecycle
            .register_job(&self.admin(), draft)
            .expect("Failed to register job")
    }

    /// Uploads a small PNG for each key through the real pipeline.
    pub async fn capture(&self, job_id: &str, phase: Phase, keys: &[String]) {
        for key in keys {
            self.upload(job_id, phase, key)
                .await
                .unwrap_or_else(|e| panic!("Upload of '{}' failed: {}", key, e));
        }
    }

    pub async fn upload(
        &self,
        job_id: &str,
        phase: Phase,
        key: &str,
    ) -> Result<PhotoRecord, UploadError> {
        let filename = format!("{}.png", key);
        self.uploads
            .upload(UploadRequest::new(job_id, phase, key, &filename, png(16, 12)))
            .await
    }

    pub async fn start(&self, job_id: &str) -> Job {
        self.lifecycle
            .start(&self.worker(), job_id, AttributeUpdate::none())
            .await
            .expect("Failed to start job")
    }

    pub fn activity_count(&self, job_id: &str) -> usize {
        self.store.read_activities(job_id).unwrap().len()
    }

    pub fn photo_count(&self, job_id: &str) -> usize {
        self.store.read_photos(job_id).unwrap().len()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
