//! # cardwall-database
//!
//! The job record store: the [`JobStore`] trait, its PostgreSQL
//! implementation, and process-local implementations of the store and the
//! card catalog.

pub mod bootstrap;
pub mod memory;
pub mod repositories;
pub mod store;

pub use bootstrap::{OpenedStore, open_job_store};
pub use memory::{MemoryCardCatalog, MemoryJobStore};
pub use repositories::PgJobRepository;
pub use store::JobStore;
