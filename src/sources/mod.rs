//! Flight search sources: collaborator contracts and the adapters built on them.
//!
//! Three kinds of external collaborator feed the pipeline:
//!
//! - [`StructuredSearchProvider`]: a structured fare search service. Libraries
//!   with a blocking API implement [`BlockingStructuredSearch`] instead and are
//!   wrapped in [`Offloaded`] so they never stall the async scheduler.
//! - [`HiddenCitySearchProvider`]: a hidden-city fare search service.
//! - [`CompletionModel`]: a text-generation service, used both for hidden-city
//!   candidate discovery and for writing the final report.
//!
//! Each pipeline stream is produced by a [`ProviderAdapter`]. Adapters translate
//! a [`SearchRequest`] into their provider's terms and return raw records; any
//! error they return is turned into an empty stream by the orchestrator.
//!
//! # Adapters
//!
//! - [`StructuredSearchAdapter`]: one structured search call
//! - [`HiddenCitySearchAdapter`]: regular + hidden-only queries, concatenated
//! - [`SuggestedHiddenCityAdapter`]: model-suggested candidates, then constrained
//!   searches post-filtered to routes that land at the real destination
//!
//! # HTTP bindings
//!
//! [`ChatCompletionsModel`], [`HttpStructuredProvider`] and
//! [`HttpHiddenCityProvider`] map the contracts onto configured HTTP endpoints.

mod chat;
mod hidden_city;
mod http_provider;
pub mod mock;
mod registry;
mod structured;
mod suggested;

pub use chat::ChatCompletionsModel;
pub use hidden_city::{HiddenCityQuery, HiddenCityResponse, HiddenCitySearchAdapter};
pub use http_provider::{HttpHiddenCityProvider, HttpStructuredProvider};
pub use registry::AdapterRegistry;
pub use structured::{ProviderSort, SeatClass, StopsFilter, StructuredFilters, StructuredSearchAdapter, TripType};
pub use suggested::{airport_matches, parse_candidate_codes, SuggestedHiddenCityAdapter};

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{FlightSource, RawProviderRecord, SearchRequest};

/// A pipeline stream backed by one external search backend
#[async_trait]
pub trait ProviderAdapter: Send + Sync + std::fmt::Debug {
    /// Unique identifier used in logs
    fn id(&self) -> &str;

    /// The stream this adapter feeds
    fn source(&self) -> FlightSource;

    /// Search for raw records matching the request
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawProviderRecord>, SourceError>;
}

/// Structured fare search service
#[async_trait]
pub trait StructuredSearchProvider: Send + Sync + std::fmt::Debug {
    /// Human-readable name of this provider
    fn name(&self) -> &str;

    async fn search(
        &self,
        filters: &StructuredFilters,
    ) -> Result<Vec<RawProviderRecord>, SourceError>;
}

/// Structured fare search with a synchronous API
pub trait BlockingStructuredSearch: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn search_blocking(
        &self,
        filters: &StructuredFilters,
    ) -> Result<Vec<RawProviderRecord>, SourceError>;
}

/// Runs a blocking provider on the blocking thread pool
#[derive(Debug)]
pub struct Offloaded<P> {
    inner: Arc<P>,
}

impl<P> Offloaded<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl<P> StructuredSearchProvider for Offloaded<P>
where
    P: BlockingStructuredSearch + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn search(
        &self,
        filters: &StructuredFilters,
    ) -> Result<Vec<RawProviderRecord>, SourceError> {
        let inner = Arc::clone(&self.inner);
        let filters = filters.clone();

        tokio::task::spawn_blocking(move || inner.search_blocking(&filters))
            .await
            .map_err(|e| SourceError::Other(format!("Blocking search task failed: {}", e)))?
    }
}

/// Hidden-city fare search service
#[async_trait]
pub trait HiddenCitySearchProvider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    async fn search(&self, query: &HiddenCityQuery) -> Result<HiddenCityResponse, SourceError>;
}

/// Text-generation service
#[async_trait]
pub trait CompletionModel: Send + Sync + std::fmt::Debug {
    /// Complete a prompt with the named model, returning the generated text
    async fn complete(
        &self,
        system: Option<&str>,
        user: &str,
        model: &str,
    ) -> Result<String, SourceError>;
}

/// Errors that can occur when interacting with a provider or model
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Provider not configured or its dependencies are missing
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// A call exceeded its timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Network or HTTP transport error
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success response from the provider
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parsing error (JSON, text)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The response carried no usable content
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}
