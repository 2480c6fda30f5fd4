pub mod broadcast;
pub mod catalog;
pub mod categories;
pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod lifecycle;
pub mod storage;
pub mod telemetry;
pub mod upload;

pub use broadcast::{BroadcastHub, Channel, JobEvent, JobEventKind, JobListView, NotificationTransport};
pub use catalog::{FeatureCatalog, FeatureSpec, UnitType};
pub use categories::{derive_categories, CategoryGroup, FeatureSet, Phase, PhotoCategory};
pub use config::{load_config, Config};
pub use db::{Database, JobFilter, Persistence, SqliteStore};
pub use error::{
    ConfigError, Result, SitecheckError, StorageError, SubscribeError, TransitionError, UploadError,
};
pub use gate::{can_transition, GateDecision};
pub use ledger::{ActivityAction, ActivityEntry, ActivityLedger};
pub use lifecycle::{
    Actor, AttributeUpdate, Clock, Job, JobDraft, JobLifecycle, JobStatus, PhotoRecord, Role,
    SystemClock,
};
pub use storage::{BlobStore, FileBlobStore};
pub use upload::{CaptureSet, UploadPipeline, UploadRequest, UploadSettings};
