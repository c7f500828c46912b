//! HTTP client building for provider endpoints.

mod client;

pub use client::{ClientBuilder, HttpClientConfig};
