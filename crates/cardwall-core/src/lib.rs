//! # cardwall-core
//!
//! Core crate for Cardwall. Contains configuration schemas, typed
//! identifiers, pagination types, the card catalog collaborator trait,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other Cardwall crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
