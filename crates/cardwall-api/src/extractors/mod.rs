//! Custom Axum extractors.

pub mod pagination;
pub mod user;

pub use pagination::PaginationParams;
pub use user::{CurrentUser, USER_HEADER};
