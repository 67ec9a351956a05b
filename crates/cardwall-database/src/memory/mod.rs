//! Process-local implementations backed by `dashmap`.

pub mod catalog;
pub mod job_store;

pub use catalog::MemoryCardCatalog;
pub use job_store::MemoryJobStore;
