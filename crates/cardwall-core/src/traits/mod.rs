//! Core traits defined in `cardwall-core` and implemented by other crates.

pub mod catalog;
pub mod storage;

pub use catalog::CardCatalog;
pub use storage::StorageProvider;
