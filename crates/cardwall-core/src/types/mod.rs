//! Core type definitions used across the Cardwall workspace.

pub mod card;
pub mod id;
pub mod pagination;

pub use card::{CardDraft, CardRecord, CardRef, DependencyDraft};
pub use id::*;
pub use pagination::{PageRequest, PageResponse};
