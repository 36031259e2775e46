//! Common transport types for the podauth crates.

#![warn(missing_docs)]

/// HTTP client abstraction used by podauth crates.
pub mod http_client;

pub use http_client::{FetchFn, HttpClient};

/// Boxed, thread-safe error used wherever an underlying source is opaque.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
