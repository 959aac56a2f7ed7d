//! focusflow-client: HTTP backend for the focusflow services

pub mod api;
pub mod http;

pub use api::{ApiResponse, classify_status};
pub use http::{BackendConfig, HttpBackend};
