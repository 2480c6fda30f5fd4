//! Sync and notification layer.
//!
//! Committed job changes are published as [`JobEvent`]s on per-job and
//! per-role channels. Observers keep a [`JobListView`] current from those
//! events and refetch from the store when they fall behind.

pub mod events;
pub mod hub;
pub mod view;

pub use events::{next_seq, JobEvent, JobEventKind};
pub use hub::{BroadcastHub, Channel, NotificationTransport};
pub use view::JobListView;
