//! # cardwall-service
//!
//! The boundary callers use to submit long-running jobs and observe their
//! outcome. Services follow constructor injection: the job store, catalog,
//! file area, and executor are provided at construction time.

pub mod context;
pub mod job;

pub use context::RequestContext;
pub use job::{ErrorResolution, JobService, JobStatusView, SubmitJob, Upload};
