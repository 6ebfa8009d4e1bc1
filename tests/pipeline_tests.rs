//! End-to-end tests for the aggregation pipeline
//!
//! Every backend is a mock from `fare_master::sources::mock`, so these run
//! offline and exercise the real adapters, normalizer, merger and invoker.

use fare_master::models::{FlightSource, PipelineShape};
use fare_master::pipeline::{FlightAggregator, ModelInvoker};
use fare_master::sources::mock::{
    flight_mapping, MockAdapter, MockCompletionModel, MockHiddenCityProvider, MockOutcome,
    MockReply, MockStructuredProvider,
};
use fare_master::sources::{
    AdapterRegistry, HiddenCitySearchAdapter, StructuredSearchAdapter, SuggestedHiddenCityAdapter,
};
use fare_master::SearchRequest;
use std::sync::Arc;
use std::time::Duration;

const PRIMARY: &str = "report-large";
const FALLBACK: &str = "report-small";

fn one_way() -> SearchRequest {
    SearchRequest::new("PEK", "SHA", "2026-11-01".parse().unwrap())
}

fn round_trip() -> SearchRequest {
    one_way().return_date("2026-11-05".parse().unwrap())
}

fn invoker(model: Arc<MockCompletionModel>) -> ModelInvoker {
    ModelInvoker::new(model, FALLBACK).timeouts(Duration::from_millis(100), Duration::from_millis(100))
}

fn aggregator(registry: AdapterRegistry, model: Arc<MockCompletionModel>) -> FlightAggregator {
    FlightAggregator::new(registry, invoker(model), PRIMARY).adapter_timeout(Duration::from_millis(500))
}

fn some_flights(n: usize) -> Vec<fare_master::models::RawProviderRecord> {
    (0..n)
        .map(|i| flight_mapping(&[("PEK", "SHA")], 400.0 + i as f64 * 10.0))
        .collect()
}

#[tokio::test]
async fn test_round_trip_skips_suggested_adapter() {
    let structured = Arc::new(MockAdapter::returning(FlightSource::Structured, some_flights(2)));
    let hidden = Arc::new(MockAdapter::returning(FlightSource::HiddenCity, some_flights(1)));
    let suggested = Arc::new(MockAdapter::returning(FlightSource::SuggestedHiddenCity, some_flights(3)));

    let registry = AdapterRegistry::new()
        .with(structured.clone())
        .with(hidden.clone())
        .with(suggested.clone());
    let model = Arc::new(MockCompletionModel::new().reply(PRIMARY, MockReply::Text("# Report".into())));

    let result = aggregator(registry, model).run(&round_trip()).await;

    assert!(result.success);
    assert_eq!(result.shape, PipelineShape::TwoStage);
    assert_eq!(structured.calls(), 1);
    assert_eq!(hidden.calls(), 1);
    assert_eq!(suggested.calls(), 0);
    assert_eq!(result.source_counts.ai_recommended, 0);
    assert_eq!(result.source_counts.total(), 3);
}

#[tokio::test]
async fn test_all_adapters_failing_is_not_an_error() {
    let registry = AdapterRegistry::new()
        .with(Arc::new(MockAdapter::failing(FlightSource::Structured)))
        .with(Arc::new(MockAdapter::failing(FlightSource::HiddenCity)))
        .with(Arc::new(MockAdapter::failing(FlightSource::SuggestedHiddenCity)));
    let model = Arc::new(MockCompletionModel::new().reply(PRIMARY, MockReply::Text("unused".into())));

    let agg = aggregator(registry, model.clone());
    let result = agg.run(&one_way()).await;

    assert!(result.success);
    assert!(result.report.contains("No flights found"));
    assert!(result.model_used.is_none());
    assert_eq!(result.source_counts.total(), 0);
    assert!(model.calls().is_empty());

    let metrics = agg.metrics().snapshot();
    assert_eq!(metrics.adapter_failures, 3);
    assert_eq!(metrics.empty_runs, 1);
}

#[tokio::test]
async fn test_primary_hang_falls_back() {
    let registry = AdapterRegistry::new()
        .with(Arc::new(MockAdapter::returning(FlightSource::Structured, some_flights(4))));
    let model = Arc::new(
        MockCompletionModel::new()
            .reply(PRIMARY, MockReply::Hang)
            .reply(FALLBACK, MockReply::Text("# Fallback report".into())),
    );

    let result = aggregator(registry, model.clone()).run(&one_way()).await;

    assert!(result.success);
    assert!(result.fallback_used);
    assert_eq!(result.model_used.as_deref(), Some(FALLBACK));
    assert_eq!(result.report, "# Fallback report");
    assert_eq!(model.calls(), vec![PRIMARY.to_string(), FALLBACK.to_string()]);
}

#[tokio::test]
async fn test_both_models_failing_gives_statistics_report() {
    let registry = AdapterRegistry::new()
        .with(Arc::new(MockAdapter::returning(FlightSource::Structured, some_flights(3))))
        .with(Arc::new(MockAdapter::returning(FlightSource::HiddenCity, some_flights(2))));
    let model = Arc::new(
        MockCompletionModel::new()
            .reply(PRIMARY, MockReply::Fail("overloaded".into()))
            .reply(FALLBACK, MockReply::Fail("overloaded".into())),
    );

    let result = aggregator(registry, model).run(&one_way()).await;

    assert!(!result.success);
    assert!(result.fallback_used);
    assert!(result.model_used.is_none());
    assert!(!result.report.trim().is_empty());
    assert!(result.report.contains("Total: 5"));
    assert_eq!(result.source_counts.structured, 3);
    assert_eq!(result.source_counts.hidden_city, 2);
}

#[tokio::test]
async fn test_panicking_adapter_does_not_abort_run() {
    let registry = AdapterRegistry::new()
        .with(Arc::new(MockAdapter::new(FlightSource::Structured, MockOutcome::Panic)))
        .with(Arc::new(MockAdapter::returning(FlightSource::HiddenCity, some_flights(2))));
    let model = Arc::new(MockCompletionModel::new().reply(PRIMARY, MockReply::Text("# Report".into())));

    let agg = aggregator(registry, model);
    let result = agg.run(&one_way()).await;

    assert!(result.success);
    assert_eq!(result.source_counts.structured, 0);
    assert_eq!(result.source_counts.hidden_city, 2);
    assert_eq!(agg.metrics().snapshot().adapter_panics, 1);
}

#[tokio::test]
async fn test_three_stage_run_with_real_adapters() {
    // Structured search: two direct flights to SHA, and for the CAN candidate one
    // itinerary through SHA plus one direct that must be discarded.
    let search = Arc::new(MockStructuredProvider::new());
    search.set_outcome(
        "SHA",
        MockOutcome::Records(vec![
            flight_mapping(&[("PEK", "SHA")], 900.0),
            flight_mapping(&[("PEK", "SHA")], 700.0),
        ]),
    );
    search.set_outcome(
        "CAN",
        MockOutcome::Records(vec![
            flight_mapping(&[("PEK", "SHA"), ("SHA", "CAN")], 450.0),
            flight_mapping(&[("PEK", "CAN")], 300.0),
        ]),
    );

    let hidden_provider = Arc::new(MockHiddenCityProvider::new(
        MockOutcome::Records(vec![flight_mapping(&[("PEK", "SHA")], 650.0)]),
        MockOutcome::Records(vec![flight_mapping(&[("PEK", "SHA"), ("SHA", "CTU")], 500.0)]),
    ));

    let model = Arc::new(
        MockCompletionModel::new()
            .reply("discovery", MockReply::Text("CAN, SZX".into()))
            .reply(PRIMARY, MockReply::Text("# Three-stage report".into())),
    );

    let suggested = SuggestedHiddenCityAdapter::new(model.clone(), search.clone(), "discovery")
        .timeouts(Duration::from_millis(200), Duration::from_millis(200));

    let registry = AdapterRegistry::new()
        .with(Arc::new(StructuredSearchAdapter::new(search.clone(), 100, 50)))
        .with(Arc::new(HiddenCitySearchAdapter::new(hidden_provider)))
        .with(Arc::new(suggested));

    let result = aggregator(registry, model.clone()).run(&one_way()).await;

    assert!(result.success, "report: {}", result.report);
    assert_eq!(result.shape, PipelineShape::ThreeStage);
    assert_eq!(result.report, "# Three-stage report");
    assert_eq!(result.model_used.as_deref(), Some(PRIMARY));
    assert!(!result.fallback_used);

    assert_eq!(result.source_counts.structured, 2);
    assert_eq!(result.source_counts.hidden_city, 2);
    assert_eq!(result.source_counts.ai_recommended, 1);

    let calls = model.calls();
    assert_eq!(calls.first().map(String::as_str), Some("discovery"));
    assert_eq!(calls.last().map(String::as_str), Some(PRIMARY));

    let destinations: Vec<_> = search.seen_filters().into_iter().map(|f| f.destination).collect();
    assert!(destinations.contains(&"SHA".to_string()));
    assert!(destinations.contains(&"CAN".to_string()));
    assert!(destinations.contains(&"SZX".to_string()));
}

#[tokio::test]
async fn test_slow_candidate_does_not_cost_the_suggested_stream() {
    let search = Arc::new(MockStructuredProvider::new());
    search.set_outcome(
        "CAN",
        MockOutcome::Records(vec![flight_mapping(&[("PEK", "SHA"), ("SHA", "CAN")], 450.0)]),
    );
    search.set_outcome(
        "SZX",
        MockOutcome::Slow(
            Duration::from_secs(5),
            vec![flight_mapping(&[("PEK", "SHA"), ("SHA", "SZX")], 350.0)],
        ),
    );

    let model = Arc::new(
        MockCompletionModel::new()
            .reply("discovery", MockReply::Text("CAN, SZX".into()))
            .reply(PRIMARY, MockReply::Text("# Report".into())),
    );

    // Candidate timeout longer than the adapter budget; only the deadline saves the stream
    let suggested = SuggestedHiddenCityAdapter::new(model.clone(), search, "discovery")
        .timeouts(Duration::from_millis(100), Duration::from_secs(10))
        .deadline(Duration::from_millis(300));

    let registry = AdapterRegistry::new().with(Arc::new(suggested));
    let agg = aggregator(registry, model);
    let result = agg.run(&one_way()).await;

    assert!(result.success);
    assert_eq!(result.source_counts.ai_recommended, 1);
    assert_eq!(agg.metrics().snapshot().adapter_timeouts, 0);
}
