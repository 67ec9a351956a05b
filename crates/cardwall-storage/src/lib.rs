//! # cardwall-storage
//!
//! The file-holding area: a local filesystem provider and the per-job
//! [`TempFileArea`] where uploaded inputs and generated artifacts live.

pub mod providers;
pub mod temp_area;

pub use providers::LocalStorageProvider;
pub use temp_area::TempFileArea;
