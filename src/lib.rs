//! # Fare Master
//!
//! Aggregates flight fares from several incompatible search backends,
//! including hidden-city fares and model-suggested hidden-city routes, and has
//! a text-generation model turn them into a markdown report.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (SearchRequest, CanonicalFlightRecord, PipelineResult)
//! - [`sources`]: Provider contracts, adapters and their HTTP bindings
//! - [`pipeline`]: Normalization, filtering, budgeting, prompting and the orchestrator
//! - [`utils`]: HTTP client and retry helpers
//! - [`ui`]: Terminal output for the CLI
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```rust,no_run
//! use fare_master::config::get_config;
//! use fare_master::{FlightAggregator, SearchRequest};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let aggregator = FlightAggregator::from_config(&get_config())?;
//! let request = SearchRequest::new("PEK", "SHA", "2026-11-01".parse()?);
//! let result = aggregator.run(&request).await;
//! println!("{}", result.report);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use models::{PipelineResult, SearchRequest};
pub use pipeline::FlightAggregator;
pub use sources::{AdapterRegistry, ProviderAdapter, SourceError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
