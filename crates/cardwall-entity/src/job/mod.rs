//! Background job domain entities.

pub mod error_entry;
pub mod kind;
pub mod model;
pub mod mutation;
pub mod payload;
pub mod progress;
pub mod status;

pub use error_entry::{ErrorEntry, ErrorSeverity, PENDING_RAISING_CARD};
pub use kind::JobKind;
pub use model::{Job, JobResult, NewJob};
pub use mutation::JobMutation;
pub use payload::JobPayload;
pub use progress::ProgressSummary;
pub use status::JobStatus;
