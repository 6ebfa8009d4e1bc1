//! Mock providers, adapters and models for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::{FlightSource, RawProviderRecord, SearchRequest};
use crate::sources::{
    CompletionModel, HiddenCityQuery, HiddenCityResponse, HiddenCitySearchProvider,
    ProviderAdapter, SourceError, StructuredFilters, StructuredSearchProvider,
};

/// What a mock returns when called
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Records(Vec<RawProviderRecord>),
    Fail(String),
    /// Sleep before answering with the records
    Slow(Duration, Vec<RawProviderRecord>),
    Panic,
}

impl MockOutcome {
    async fn resolve(self) -> Result<Vec<RawProviderRecord>, SourceError> {
        match self {
            MockOutcome::Records(records) => Ok(records),
            MockOutcome::Fail(msg) => Err(SourceError::Network(msg)),
            MockOutcome::Slow(delay, records) => {
                tokio::time::sleep(delay).await;
                Ok(records)
            }
            MockOutcome::Panic => panic!("mock provider panicked"),
        }
    }
}

/// A mock pipeline adapter that counts its calls
#[derive(Debug)]
pub struct MockAdapter {
    source: FlightSource,
    outcome: Mutex<MockOutcome>,
    calls: AtomicUsize,
}

impl MockAdapter {
    pub fn new(source: FlightSource, outcome: MockOutcome) -> Self {
        Self {
            source,
            outcome: Mutex::new(outcome),
            calls: AtomicUsize::new(0),
        }
    }

    /// Adapter that returns the given records
    pub fn returning(source: FlightSource, records: Vec<RawProviderRecord>) -> Self {
        Self::new(source, MockOutcome::Records(records))
    }

    /// Adapter that always fails
    pub fn failing(source: FlightSource) -> Self {
        Self::new(source, MockOutcome::Fail(format!("{} is down", source.id())))
    }

    /// Number of times `search` was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn id(&self) -> &str {
        self.source.id()
    }

    fn source(&self) -> FlightSource {
        self.source
    }

    async fn search(&self, _request: &SearchRequest) -> Result<Vec<RawProviderRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcome.lock().unwrap().clone();
        outcome.resolve().await
    }
}

/// A mock structured provider answering per destination
#[derive(Debug, Default)]
pub struct MockStructuredProvider {
    by_destination: Mutex<HashMap<String, MockOutcome>>,
    default_response: Mutex<Option<Vec<RawProviderRecord>>>,
    seen: Mutex<Vec<StructuredFilters>>,
}

impl MockStructuredProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the outcome for searches to `destination`
    pub fn set_outcome(&self, destination: &str, outcome: MockOutcome) {
        let mut guard = self.by_destination.lock().unwrap();
        guard.insert(destination.to_string(), outcome);
    }

    /// Set the records returned for any destination without an explicit outcome
    pub fn set_default_response(&self, records: Vec<RawProviderRecord>) {
        let mut guard = self.default_response.lock().unwrap();
        *guard = Some(records);
    }

    /// Filters of every call so far, in call order
    pub fn seen_filters(&self) -> Vec<StructuredFilters> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl StructuredSearchProvider for MockStructuredProvider {
    fn name(&self) -> &str {
        "Mock Structured"
    }

    async fn search(
        &self,
        filters: &StructuredFilters,
    ) -> Result<Vec<RawProviderRecord>, SourceError> {
        self.seen.lock().unwrap().push(filters.clone());

        let outcome = self
            .by_destination
            .lock()
            .unwrap()
            .get(&filters.destination)
            .cloned();

        match outcome {
            Some(outcome) => outcome.resolve().await,
            None => Ok(self.default_response.lock().unwrap().clone().unwrap_or_default()),
        }
    }
}

/// A mock hidden-city provider with separate regular and hidden-only answers
#[derive(Debug)]
pub struct MockHiddenCityProvider {
    regular: Mutex<MockOutcome>,
    hidden: Mutex<MockOutcome>,
}

impl MockHiddenCityProvider {
    pub fn new(regular: MockOutcome, hidden: MockOutcome) -> Self {
        Self {
            regular: Mutex::new(regular),
            hidden: Mutex::new(hidden),
        }
    }
}

#[async_trait]
impl HiddenCitySearchProvider for MockHiddenCityProvider {
    fn name(&self) -> &str {
        "Mock Hidden City"
    }

    async fn search(&self, query: &HiddenCityQuery) -> Result<HiddenCityResponse, SourceError> {
        let outcome = if query.hidden_only {
            self.hidden.lock().unwrap().clone()
        } else {
            self.regular.lock().unwrap().clone()
        };
        Ok(HiddenCityResponse::ok(outcome.resolve().await?))
    }
}

/// How a mock model answers
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(String),
    /// Never answers within any reasonable timeout
    Hang,
}

/// A mock text-generation model keyed by model name
#[derive(Debug, Default)]
pub struct MockCompletionModel {
    replies: Mutex<HashMap<String, MockReply>>,
    calls: Mutex<Vec<String>>,
}

impl MockCompletionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the reply for a model name
    pub fn reply(self, model: &str, reply: MockReply) -> Self {
        self.replies.lock().unwrap().insert(model.to_string(), reply);
        self
    }

    /// Model names requested so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for MockCompletionModel {
    async fn complete(
        &self,
        _system: Option<&str>,
        _user: &str,
        model: &str,
    ) -> Result<String, SourceError> {
        self.calls.lock().unwrap().push(model.to_string());
        let reply = self.replies.lock().unwrap().get(model).cloned();

        match reply {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Fail(msg)) => Err(SourceError::Api {
                status: 500,
                message: msg,
            }),
            Some(MockReply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(SourceError::Timeout("mock hang".to_string()))
            }
            None => Err(SourceError::Unavailable(format!("unknown model {}", model))),
        }
    }
}

/// Helper to build a key/value flight record from (from, to) legs and a price
pub fn flight_mapping(legs: &[(&str, &str)], price: f64) -> RawProviderRecord {
    let legs: Vec<serde_json::Value> = legs
        .iter()
        .enumerate()
        .map(|(i, (from, to))| {
            serde_json::json!({
                "airline_code": "MU",
                "airline_name": "China Eastern",
                "flight_number": format!("MU{}", 5100 + i),
                "departure_airport": from,
                "arrival_airport": to,
                "departure_time": format!("2026-11-01T{:02}:00:00", 8 + i * 3),
                "arrival_time": format!("2026-11-01T{:02}:30:00", 10 + i * 3),
            })
        })
        .collect();

    let value = serde_json::json!({
        "price": price,
        "currency": "CNY",
        "legs": legs,
    });

    RawProviderRecord::from_json(value).expect("mapping is an object")
}
