//! Structured fare search adapter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{
    CabinClass, FlightSource, MaxStops, Passengers, RawProviderRecord, SearchRequest, SortBy,
};
use crate::sources::{ProviderAdapter, SourceError, StructuredSearchProvider};

/// Seat class as the structured provider names it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl From<CabinClass> for SeatClass {
    fn from(cabin: CabinClass) -> Self {
        match cabin {
            CabinClass::Economy => SeatClass::Economy,
            CabinClass::PremiumEconomy => SeatClass::PremiumEconomy,
            CabinClass::Business => SeatClass::Business,
            CabinClass::First => SeatClass::First,
        }
    }
}

/// Stop-count filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopsFilter {
    Any,
    NonStop,
    OneStopOrFewer,
    TwoOrFewerStops,
}

impl From<MaxStops> for StopsFilter {
    fn from(stops: MaxStops) -> Self {
        match stops {
            MaxStops::Any => StopsFilter::Any,
            MaxStops::NonStop => StopsFilter::NonStop,
            MaxStops::OneStop => StopsFilter::OneStopOrFewer,
            MaxStops::TwoStops => StopsFilter::TwoOrFewerStops,
        }
    }
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderSort {
    TopFlights,
    Cheapest,
    Duration,
    DepartureTime,
    ArrivalTime,
}

impl From<SortBy> for ProviderSort {
    fn from(sort: SortBy) -> Self {
        match sort {
            SortBy::Best => ProviderSort::TopFlights,
            SortBy::Price => ProviderSort::Cheapest,
            SortBy::Duration => ProviderSort::Duration,
            SortBy::DepartureTime => ProviderSort::DepartureTime,
            SortBy::ArrivalTime => ProviderSort::ArrivalTime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripType {
    OneWay,
    RoundTrip,
}

/// Filters understood by the structured provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredFilters {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub trip_type: TripType,
    pub seat: SeatClass,
    pub stops: StopsFilter,
    pub sort_by: ProviderSort,
    pub passengers: Passengers,
    pub max_results: usize,
    pub language: String,
    pub currency: String,
}

impl StructuredFilters {
    /// Translate a search request into provider filters
    pub fn from_request(request: &SearchRequest, max_results: usize) -> Self {
        Self {
            origin: request.origin.clone(),
            destination: request.destination.clone(),
            departure_date: request.departure_date,
            return_date: request.return_date,
            trip_type: if request.is_round_trip() {
                TripType::RoundTrip
            } else {
                TripType::OneWay
            },
            seat: request.cabin.into(),
            stops: request.max_stops.into(),
            sort_by: request.sort_by.into(),
            passengers: request.passengers,
            max_results,
            language: request.locale.clone(),
            currency: request.currency.clone(),
        }
    }
}

/// Adapter over the structured fare search service
#[derive(Debug, Clone)]
pub struct StructuredSearchAdapter {
    provider: Arc<dyn StructuredSearchProvider>,
    one_way_cap: usize,
    round_trip_cap: usize,
}

impl StructuredSearchAdapter {
    pub fn new(
        provider: Arc<dyn StructuredSearchProvider>,
        one_way_cap: usize,
        round_trip_cap: usize,
    ) -> Self {
        Self {
            provider,
            one_way_cap,
            round_trip_cap,
        }
    }

    /// Result cap for a request
    pub fn result_cap(&self, request: &SearchRequest) -> usize {
        if request.is_round_trip() {
            self.round_trip_cap
        } else {
            self.one_way_cap
        }
    }
}

#[async_trait]
impl ProviderAdapter for StructuredSearchAdapter {
    fn id(&self) -> &str {
        "structured"
    }

    fn source(&self) -> FlightSource {
        FlightSource::Structured
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawProviderRecord>, SourceError> {
        let cap = self.result_cap(request);
        let filters = StructuredFilters::from_request(request, cap);

        tracing::debug!(
            "[{}] {} -> {} on {} (cap {})",
            self.provider.name(),
            filters.origin,
            filters.destination,
            filters.departure_date,
            cap
        );

        let mut records = self.provider.search(&filters).await?;
        records.truncate(cap);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::{flight_mapping, MockStructuredProvider};

    fn request() -> SearchRequest {
        SearchRequest::new("PEK", "SHA", "2026-11-01".parse().unwrap())
            .cabin(CabinClass::PremiumEconomy)
            .max_stops(MaxStops::OneStop)
            .sort_by(SortBy::Price)
    }

    #[test]
    fn test_filters_from_request() {
        let filters = StructuredFilters::from_request(&request(), 25);
        assert_eq!(filters.seat, SeatClass::PremiumEconomy);
        assert_eq!(filters.stops, StopsFilter::OneStopOrFewer);
        assert_eq!(filters.sort_by, ProviderSort::Cheapest);
        assert_eq!(filters.trip_type, TripType::OneWay);
        assert_eq!(filters.max_results, 25);

        let json = serde_json::to_value(&filters).unwrap();
        assert_eq!(json["seat"], "PREMIUM_ECONOMY");
        assert_eq!(json["stops"], "ONE_STOP_OR_FEWER");
    }

    #[tokio::test]
    async fn test_cap_depends_on_trip_type() {
        let provider = Arc::new(MockStructuredProvider::new());
        let many: Vec<_> = (0..50)
            .map(|i| flight_mapping(&[("PEK", "SHA")], 100.0 + i as f64))
            .collect();
        provider.set_default_response(many);

        let adapter = StructuredSearchAdapter::new(provider.clone(), 40, 10);

        let one_way = adapter.search(&request()).await.unwrap();
        assert_eq!(one_way.len(), 40);

        let round_trip = request().return_date("2026-11-05".parse().unwrap());
        let records = adapter.search(&round_trip).await.unwrap();
        assert_eq!(records.len(), 10);

        let seen = provider.seen_filters();
        assert_eq!(seen[0].max_results, 40);
        assert_eq!(seen[1].max_results, 10);
        assert_eq!(seen[1].trip_type, TripType::RoundTrip);
    }
}
