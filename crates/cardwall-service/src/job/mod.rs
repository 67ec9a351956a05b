//! Job submission, polling, and error resolution.

pub mod request;
pub mod service;
pub mod view;

pub use request::{ErrorResolution, SubmitJob, Upload};
pub use service::JobService;
pub use view::JobStatusView;
