//! # cardwall-api
//!
//! HTTP API layer for Cardwall jobs built on Axum.
//!
//! Exposes job submission, progress polling, error resolution and artifact
//! download, together with the middleware stack, extractors, DTOs and
//! error mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::build_app;
pub use error::ApiError;
pub use state::AppState;
