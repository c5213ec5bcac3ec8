//! Axum trigger service for the render pipeline.
//!
//! This crate provides:
//! - `POST /render` and `POST /run` triggers that hold the request until the
//!   job finishes
//! - Queue status, health and Prometheus metrics endpoints
//! - A background listener that renders newly inserted records
//! - Shutdown that drains the render queue before closing connections

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod shutdown;
pub mod state;

pub use config::{ApiConfig, ArtifactStoreKind};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::InsertListener;
pub use state::AppState;
