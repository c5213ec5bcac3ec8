//! Job record store.
//!
//! This crate provides:
//! - The [`RecordStore`] seam (fetch, update, insert subscription)
//! - A PostgREST HTTP client with retry, metrics and polling subscription
//! - An in-memory store for local runs and tests

pub mod error;
pub mod memory;
pub mod metrics;
pub mod rest;
pub mod retry;
pub mod store;

pub use error::{RecordError, RecordResult};
pub use memory::MemoryRecordStore;
pub use rest::{RestRecordConfig, RestRecordStore};
pub use retry::RetryConfig;
pub use store::RecordStore;
