//! Job lifecycle: the job record, callers, and the state machine that
//! moves jobs between states.

pub mod actor;
pub mod clock;
pub mod job;
pub mod machine;
pub mod photo;

pub use actor::{Actor, Role};
pub use clock::{Clock, ManualClock, SystemClock};
pub use job::{Job, JobDraft, JobPatch, JobStatus};
pub use machine::{AttributeUpdate, JobLifecycle, JobPage, JobReport, StatusCounts};
pub use photo::{CategoryCount, PhotoRecord};
