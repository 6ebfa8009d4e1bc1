//! Utility modules shared by the HTTP bindings.
//!
//! - [`HttpClient`]: reqwest client built from an explicit [`TransportConfig`](crate::config::TransportConfig)
//! - [`RetryConfig`] / [`with_retry`]: bounded exponential backoff for transient provider errors
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use fare_master::sources::SourceError;
//! use fare_master::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_fares() -> Result<String, SourceError> { Ok("[]".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let body = with_retry(RetryConfig::default().max_attempts(3), || fetch_fares()).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod retry;

pub use http::HttpClient;
pub use retry::{with_retry, RetryConfig, TransientError};
