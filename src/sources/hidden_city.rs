//! Hidden-city fare search adapter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{CabinClass, FlightSource, RawProviderRecord, RecordTags, SearchRequest};
use crate::sources::{HiddenCitySearchProvider, ProviderAdapter, SourceError};

/// Query sent to the hidden-city provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenCityQuery {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    pub cabin: CabinClass,
    pub adults: u32,
    pub currency: String,

    /// Restrict results to hidden-city fares
    pub hidden_only: bool,
}

/// Response envelope of the hidden-city provider
#[derive(Debug, Clone, Default)]
pub struct HiddenCityResponse {
    pub success: bool,
    pub flights: Vec<RawProviderRecord>,
    pub error: Option<String>,
}

impl HiddenCityResponse {
    /// A successful response
    pub fn ok(flights: Vec<RawProviderRecord>) -> Self {
        Self {
            success: true,
            flights,
            error: None,
        }
    }

    /// A response the provider itself marked as failed
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            flights: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Adapter that runs a regular and a hidden-only query and concatenates both
#[derive(Debug, Clone)]
pub struct HiddenCitySearchAdapter {
    provider: Arc<dyn HiddenCitySearchProvider>,
}

impl HiddenCitySearchAdapter {
    pub fn new(provider: Arc<dyn HiddenCitySearchProvider>) -> Self {
        Self { provider }
    }

    fn query(request: &SearchRequest, hidden_only: bool) -> HiddenCityQuery {
        HiddenCityQuery {
            origin: request.origin.clone(),
            destination: request.destination.clone(),
            date: request.departure_date,
            cabin: request.cabin,
            adults: request.passengers.adults.max(1),
            currency: request.currency.clone(),
            hidden_only,
        }
    }

    async fn run_query(&self, query: &HiddenCityQuery) -> Result<Vec<RawProviderRecord>, SourceError> {
        let response = self.provider.search(query).await?;
        if !response.success {
            return Err(SourceError::Api {
                status: 200,
                message: response
                    .error
                    .unwrap_or_else(|| "provider reported failure".to_string()),
            });
        }
        Ok(response.flights)
    }
}

#[async_trait]
impl ProviderAdapter for HiddenCitySearchAdapter {
    fn id(&self) -> &str {
        "hidden_city"
    }

    fn source(&self) -> FlightSource {
        FlightSource::HiddenCity
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawProviderRecord>, SourceError> {
        let regular_query = Self::query(request, false);
        let hidden_query = Self::query(request, true);

        let (regular, hidden) = tokio::join!(
            self.run_query(&regular_query),
            self.run_query(&hidden_query)
        );

        match (regular, hidden) {
            (Err(regular_err), Err(hidden_err)) => {
                tracing::warn!(
                    "[{}] both queries failed: regular: {}; hidden: {}",
                    self.provider.name(),
                    regular_err,
                    hidden_err
                );
                Err(hidden_err)
            }
            (regular, hidden) => {
                let mut records = Vec::new();

                match regular {
                    Ok(found) => records.extend(found),
                    Err(e) => tracing::warn!("[{}] regular query failed: {}", self.provider.name(), e),
                }

                match hidden {
                    Ok(found) => records.extend(found.into_iter().map(|record| {
                        let tags = RecordTags {
                            hidden_city: Some(true),
                            ..record.tags.clone()
                        };
                        record.with_tags(tags)
                    })),
                    Err(e) => tracing::warn!("[{}] hidden-only query failed: {}", self.provider.name(), e),
                }

                Ok(records)
            }
        }
    }
}
