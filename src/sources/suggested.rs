//! AI-suggested hidden-city adapter.
//!
//! Phase A asks a fast model for onward cities beyond the traveller's
//! destination. Phase B searches `origin → candidate` for each of them and keeps
//! only itineraries that pass through the real destination on the way.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use regex::Regex;
use tokio::time::Instant;

use crate::models::{FlightSource, RawProviderRecord, RecordTags, SearchRequest};
use crate::pipeline::normalize::normalize;
use crate::sources::{
    CompletionModel, ProviderAdapter, SourceError, StopsFilter, StructuredFilters,
    StructuredSearchProvider,
};

/// Metropolitan city codes and the airports they group
const METRO_AREAS: &[(&str, &[&str])] = &[
    ("BJS", &["PEK", "PKX", "NAY"]),
    ("SHA", &["SHA", "PVG"]),
    ("CTU", &["CTU", "TFU"]),
    ("TYO", &["HND", "NRT"]),
    ("OSA", &["KIX", "ITM", "UKB"]),
    ("SEL", &["ICN", "GMP"]),
    ("LON", &["LHR", "LGW", "STN", "LTN", "LCY", "SEN"]),
    ("PAR", &["CDG", "ORY", "BVA"]),
    ("MIL", &["MXP", "LIN", "BGY"]),
    ("ROM", &["FCO", "CIA"]),
    ("STO", &["ARN", "BMA", "NYO"]),
    ("MOW", &["SVO", "DME", "VKO"]),
    ("NYC", &["JFK", "LGA", "EWR"]),
    ("WAS", &["IAD", "DCA", "BWI"]),
    ("CHI", &["ORD", "MDW"]),
    ("YTO", &["YYZ", "YTZ"]),
    ("SAO", &["GRU", "CGH", "VCP"]),
    ("BUE", &["EZE", "AEP"]),
    ("BKK", &["BKK", "DMK"]),
    ("JKT", &["CGK", "HLP"]),
];

static IATA_TOKEN: OnceLock<Regex> = OnceLock::new();

fn iata_token() -> &'static Regex {
    IATA_TOKEN.get_or_init(|| Regex::new(r"\b[A-Z]{3}\b").expect("static regex"))
}

fn metro_of(code: &str) -> Option<&'static str> {
    METRO_AREAS.iter().find_map(|(metro, airports)| {
        (*metro == code || airports.contains(&code)).then_some(*metro)
    })
}

/// Whether two airport or city codes refer to the same place
///
/// Codes match when equal, or when they belong to the same metro area
/// (`SHA` matches `PVG`, `TYO` matches `HND`).
pub fn airport_matches(a: &str, b: &str) -> bool {
    let a = a.trim().to_ascii_uppercase();
    let b = b.trim().to_ascii_uppercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    matches!((metro_of(&a), metro_of(&b)), (Some(x), Some(y)) if x == y)
}

/// Extract candidate city codes from a discovery answer
///
/// Three-letter uppercase tokens are taken in order, deduplicated, stripped of
/// the origin and destination (metro-aware) and bounded to `max`.
pub fn parse_candidate_codes(text: &str, origin: &str, destination: &str, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();

    iata_token()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|code| !airport_matches(code, origin) && !airport_matches(code, destination))
        .filter(|code| seen.insert(code.to_string()))
        .take(max)
        .map(str::to_string)
        .collect()
}

/// Adapter that discovers hidden-city candidates with a model and verifies
/// them with constrained structured searches.
#[derive(Debug, Clone)]
pub struct SuggestedHiddenCityAdapter {
    model: Arc<dyn CompletionModel>,
    search: Arc<dyn StructuredSearchProvider>,
    discovery_model: String,
    discovery_timeout: Duration,
    candidate_timeout: Duration,
    max_candidates: usize,
    concurrency: usize,
    result_cap: usize,
    per_candidate_results: usize,
    deadline: Option<Duration>,
}

impl SuggestedHiddenCityAdapter {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        search: Arc<dyn StructuredSearchProvider>,
        discovery_model: impl Into<String>,
    ) -> Self {
        Self {
            model,
            search,
            discovery_model: discovery_model.into(),
            discovery_timeout: Duration::from_secs(60),
            candidate_timeout: Duration::from_secs(45),
            max_candidates: 10,
            concurrency: 4,
            result_cap: 100,
            per_candidate_results: 60,
            deadline: None,
        }
    }

    /// Set the discovery and per-candidate timeouts
    pub fn timeouts(mut self, discovery: Duration, candidate: Duration) -> Self {
        self.discovery_timeout = discovery;
        self.candidate_timeout = candidate;
        self
    }

    /// Set candidate count, search concurrency and final result cap
    pub fn limits(mut self, max_candidates: usize, concurrency: usize, result_cap: usize) -> Self {
        self.max_candidates = max_candidates;
        self.concurrency = concurrency.max(1);
        self.result_cap = result_cap;
        self
    }

    /// Set how many results each constrained search asks for
    pub fn per_candidate_results(mut self, results: usize) -> Self {
        self.per_candidate_results = results;
        self
    }

    /// Stop waiting for candidate searches once `deadline` has passed since
    /// the search started, keeping the candidates that already finished
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn discovery_prompt(request: &SearchRequest) -> String {
        format!(
            "A traveller wants to fly from {origin} to {dest}. Hidden-city ticketing means \
             booking a cheaper ticket from {origin} to a city beyond {dest} whose route \
             connects through {dest}, then leaving the trip at {dest}.\n\n\
             List up to 10 domestic cities in the same country as {dest} that are plausible \
             onward destinations for such tickets. Prefer cities that:\n\
             - are served by carriers using {dest} as a hub or frequent connection point\n\
             - have heavy price competition from {origin}\n\
             - are larger markets than {dest} itself\n\n\
             Answer with IATA city or airport codes only, separated by commas, \
             for example: CAN, SZX, CTU. Do not include {origin} or {dest}.",
            origin = request.origin,
            dest = request.destination,
        )
    }

    async fn discover(&self, request: &SearchRequest) -> Result<Vec<String>, SourceError> {
        let prompt = Self::discovery_prompt(request);
        let call = self.model.complete(None, &prompt, &self.discovery_model);

        let answer = tokio::time::timeout(self.discovery_timeout, call)
            .await
            .map_err(|_| {
                SourceError::Timeout(format!(
                    "candidate discovery exceeded {:?}",
                    self.discovery_timeout
                ))
            })??;

        let candidates = parse_candidate_codes(
            &answer,
            &request.origin,
            &request.destination,
            self.max_candidates,
        );
        tracing::info!(
            "[suggested_hidden_city] {} candidate(s) for {} -> {}: {:?}",
            candidates.len(),
            request.origin,
            request.destination,
            candidates
        );
        Ok(candidates)
    }

    /// Search one candidate and keep itineraries that pass through the destination
    async fn search_candidate(
        &self,
        request: &SearchRequest,
        candidate: String,
    ) -> Vec<RawProviderRecord> {
        let mut filters = StructuredFilters::from_request(request, self.per_candidate_results);
        filters.destination = candidate.clone();
        filters.stops = StopsFilter::Any;

        let found = match tokio::time::timeout(self.candidate_timeout, self.search.search(&filters)).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                tracing::warn!("[suggested_hidden_city] search to {} failed: {}", candidate, e);
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(
                    "[suggested_hidden_city] search to {} timed out after {:?}",
                    candidate,
                    self.candidate_timeout
                );
                return Vec::new();
            }
        };

        let total = found.len();
        let kept: Vec<_> = found
            .into_iter()
            .filter(|raw| passes_through(raw, &request.destination))
            .map(|raw| {
                raw.with_tags(RecordTags {
                    hidden_city: Some(true),
                    hidden_destination: Some(candidate.clone()),
                    ai_recommended: true,
                })
            })
            .collect();

        tracing::debug!(
            "[suggested_hidden_city] {}: {} of {} itineraries pass through {}",
            candidate,
            kept.len(),
            total,
            request.destination
        );
        kept
    }
}

/// Whether some intermediate arrival of the itinerary is the destination
fn passes_through(raw: &RawProviderRecord, destination: &str) -> bool {
    normalize(raw, FlightSource::SuggestedHiddenCity)
        .map(|record| record.layovers().any(|stop| airport_matches(stop, destination)))
        .unwrap_or(false)
}

/// Sort key: parsed price, unpriced records last
fn price_key(raw: &RawProviderRecord) -> f64 {
    normalize(raw, FlightSource::SuggestedHiddenCity)
        .and_then(|record| (record.price.amount > 0.0).then_some(record.price.amount))
        .unwrap_or(f64::INFINITY)
}

#[async_trait]
impl ProviderAdapter for SuggestedHiddenCityAdapter {
    fn id(&self) -> &str {
        "suggested_hidden_city"
    }

    fn source(&self) -> FlightSource {
        FlightSource::SuggestedHiddenCity
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawProviderRecord>, SourceError> {
        let started = Instant::now();
        let candidates = self.discover(request).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let total = candidates.len();
        let mut pending = stream::iter(candidates)
            .map(|candidate| self.search_candidate(request, candidate))
            .buffer_unordered(self.concurrency);

        let mut batches: Vec<Vec<RawProviderRecord>> = Vec::with_capacity(total);
        loop {
            let next = match self.deadline {
                Some(limit) => match tokio::time::timeout_at(started + limit, pending.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(
                            "[suggested_hidden_city] deadline of {:?} reached; keeping {} of {} candidate searches",
                            limit,
                            batches.len(),
                            total
                        );
                        break;
                    }
                },
                None => pending.next().await,
            };
            match next {
                Some(batch) => batches.push(batch),
                None => break,
            }
        }

        let mut keyed: Vec<(f64, RawProviderRecord)> = batches
            .into_iter()
            .flatten()
            .map(|raw| (price_key(&raw), raw))
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        keyed.truncate(self.result_cap);

        Ok(keyed.into_iter().map(|(_, raw)| raw).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::{flight_mapping, MockCompletionModel, MockOutcome, MockReply, MockStructuredProvider};

    fn request() -> SearchRequest {
        SearchRequest::new("PEK", "SHA", "2026-11-01".parse().unwrap())
    }

    fn adapter(
        answer: MockReply,
        provider: Arc<MockStructuredProvider>,
    ) -> SuggestedHiddenCityAdapter {
        let model = MockCompletionModel::new().reply("fast", answer);
        SuggestedHiddenCityAdapter::new(Arc::new(model), provider, "fast")
            .timeouts(Duration::from_millis(100), Duration::from_millis(100))
    }

    #[test]
    fn test_parse_candidate_codes() {
        let text = "Good options: CAN, SZX, CAN, XMN, PEK, SHA, PVG and CTU. Also KMG, TAO.";
        let codes = parse_candidate_codes(text, "PEK", "SHA", 4);
        assert_eq!(codes, vec!["CAN", "SZX", "XMN", "CTU"]);
    }

    #[test]
    fn test_parse_candidate_codes_ignores_lowercase_and_longer_tokens() {
        let codes = parse_candidate_codes("can ABCD XMN", "PEK", "SHA", 10);
        assert_eq!(codes, vec!["XMN"]);
    }

    #[test]
    fn test_airport_matches_metro() {
        assert!(airport_matches("SHA", "PVG"));
        assert!(airport_matches("TYO", "HND"));
        assert!(airport_matches("nrt", "HND"));
        assert!(airport_matches("CAN", "CAN"));
        assert!(!airport_matches("PEK", "PVG"));
        assert!(!airport_matches("", ""));
    }

    #[tokio::test]
    async fn test_keeps_only_routes_through_destination() {
        let provider = Arc::new(MockStructuredProvider::new());
        provider.set_outcome(
            "CAN",
            MockOutcome::Records(vec![
                flight_mapping(&[("PEK", "SHA"), ("SHA", "CAN")], 700.0),
                flight_mapping(&[("PEK", "CAN")], 500.0),
                flight_mapping(&[("PEK", "WUH"), ("WUH", "CAN")], 400.0),
            ]),
        );
        provider.set_outcome(
            "XMN",
            MockOutcome::Records(vec![flight_mapping(&[("PEK", "PVG"), ("PVG", "XMN")], 650.0)]),
        );

        let adapter = adapter(MockReply::Text("CAN, XMN".into()), provider.clone());
        let records = adapter.search(&request()).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tags.hidden_destination.as_deref(), Some("XMN"));
        assert_eq!(records[1].tags.hidden_destination.as_deref(), Some("CAN"));
        assert!(records.iter().all(|r| r.tags.ai_recommended && r.tags.hidden_city == Some(true)));

        let seen = provider.seen_filters();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|f| f.stops == StopsFilter::Any));
    }

    #[tokio::test]
    async fn test_failing_candidate_is_skipped() {
        let provider = Arc::new(MockStructuredProvider::new());
        provider.set_outcome("CAN", MockOutcome::Fail("rate limited".into()));
        provider.set_outcome(
            "XMN",
            MockOutcome::Slow(
                Duration::from_secs(5),
                vec![flight_mapping(&[("PEK", "SHA"), ("SHA", "XMN")], 300.0)],
            ),
        );
        provider.set_outcome(
            "SZX",
            MockOutcome::Records(vec![flight_mapping(&[("PEK", "SHA"), ("SHA", "SZX")], 800.0)]),
        );

        let adapter = adapter(MockReply::Text("CAN XMN SZX".into()), provider);
        let records = adapter.search(&request()).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tags.hidden_destination.as_deref(), Some("SZX"));
    }

    #[tokio::test]
    async fn test_deadline_keeps_finished_candidates() {
        let provider = Arc::new(MockStructuredProvider::new());
        provider.set_outcome(
            "CAN",
            MockOutcome::Records(vec![flight_mapping(&[("PEK", "SHA"), ("SHA", "CAN")], 600.0)]),
        );
        provider.set_outcome(
            "XMN",
            MockOutcome::Slow(
                Duration::from_secs(5),
                vec![flight_mapping(&[("PEK", "SHA"), ("SHA", "XMN")], 300.0)],
            ),
        );

        let model = MockCompletionModel::new().reply("fast", MockReply::Text("CAN XMN".into()));
        let adapter = SuggestedHiddenCityAdapter::new(Arc::new(model), provider, "fast")
            .timeouts(Duration::from_millis(100), Duration::from_secs(10))
            .deadline(Duration::from_millis(200));

        let started = std::time::Instant::now();
        let records = adapter.search(&request()).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tags.hidden_destination.as_deref(), Some("CAN"));
    }

    #[tokio::test]
    async fn test_empty_discovery_yields_empty_stream() {
        let provider = Arc::new(MockStructuredProvider::new());
        let adapter = adapter(MockReply::Text("no idea".into()), provider.clone());

        let records = adapter.search(&request()).await.unwrap();
        assert!(records.is_empty());
        assert!(provider.seen_filters().is_empty());
    }

    #[tokio::test]
    async fn test_discovery_failure_is_an_error() {
        let provider = Arc::new(MockStructuredProvider::new());
        let adapter = adapter(MockReply::Hang, provider);

        let result = adapter.search(&request()).await;
        assert!(matches!(result, Err(SourceError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_result_cap_and_ordering() {
        let provider = Arc::new(MockStructuredProvider::new());
        let many: Vec<_> = (0..30)
            .map(|i| flight_mapping(&[("PEK", "SHA"), ("SHA", "CAN")], 1000.0 - i as f64))
            .collect();
        provider.set_outcome("CAN", MockOutcome::Records(many));

        let adapter = adapter(MockReply::Text("CAN".into()), provider).limits(10, 2, 5);
        let records = adapter.search(&request()).await.unwrap();

        assert_eq!(records.len(), 5);
        let prices: Vec<f64> = records.iter().map(price_key).collect();
        assert_eq!(prices, vec![971.0, 972.0, 973.0, 974.0, 975.0]);
    }
}
