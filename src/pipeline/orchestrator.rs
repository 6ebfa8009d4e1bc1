//! The flight aggregation service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;

use crate::config::{BudgetConfig, Config};
use crate::models::{
    FlightSource, PipelineResult, PipelineShape, RawProviderRecord, SearchRequest, SourceCounts,
};
use crate::pipeline::invoker::{InvocationOutcome, ModelInvoker};
use crate::pipeline::merge::merge;
use crate::pipeline::metrics::PipelineMetrics;
use crate::pipeline::normalize::normalize_all;
use crate::pipeline::price::filter_records;
use crate::pipeline::prompt::PromptBuilder;
use crate::pipeline::report::{degraded_report, no_flights_report};
use crate::sources::{
    AdapterRegistry, ChatCompletionsModel, CompletionModel, HiddenCitySearchAdapter,
    HttpHiddenCityProvider, HttpStructuredProvider, SourceError, StructuredSearchAdapter,
    StructuredSearchProvider, SuggestedHiddenCityAdapter,
};
use crate::utils::HttpClient;

/// Runs the whole pipeline for a search request
///
/// The aggregator owns its adapters, the model invoker and the process-wide
/// [`PipelineMetrics`]. [`run`](Self::run) always produces a
/// [`PipelineResult`]; every failure is turned into data.
#[derive(Debug, Clone)]
pub struct FlightAggregator {
    registry: AdapterRegistry,
    invoker: ModelInvoker,
    prompts: PromptBuilder,
    budget: BudgetConfig,
    primary_model: String,
    adapter_timeout: Duration,
    metrics: Arc<PipelineMetrics>,
}

impl FlightAggregator {
    pub fn new(registry: AdapterRegistry, invoker: ModelInvoker, primary_model: impl Into<String>) -> Self {
        Self {
            registry,
            invoker,
            prompts: PromptBuilder::default(),
            budget: BudgetConfig::default(),
            primary_model: primary_model.into(),
            adapter_timeout: Duration::from_secs(180),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Wire the HTTP bindings described by the configuration
    ///
    /// Streams whose endpoint is not configured are left unregistered and
    /// come back empty from every run.
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let http = HttpClient::with_transport(&config.transport)?;
        let models = &config.models;
        let providers = &config.providers;

        let model = Self::completion_model(config)?;

        if config.suggested_worst_case() > providers.adapter_timeout() {
            tracing::warn!(
                "Suggested hidden-city searches may need {:?} but adapters are cut off after {:?}; \
                 slow candidates will be dropped",
                config.suggested_worst_case(),
                providers.adapter_timeout()
            );
        }

        let mut registry = AdapterRegistry::new();

        let structured = HttpStructuredProvider::new(
            http.clone(),
            providers.structured_endpoint.as_deref(),
            providers.api_key.clone(),
        )?;
        if structured.is_configured() {
            let structured: Arc<dyn StructuredSearchProvider> = Arc::new(structured);
            registry.register(Arc::new(StructuredSearchAdapter::new(
                structured.clone(),
                providers.one_way_result_cap,
                providers.round_trip_result_cap,
            )));
            registry.register(Arc::new(
                SuggestedHiddenCityAdapter::new(model.clone(), structured, models.discovery_model.clone())
                    .timeouts(models.discovery_timeout(), providers.candidate_timeout())
                    .limits(
                        config.budget.max_candidates,
                        config.budget.candidate_concurrency,
                        config.budget.suggested_candidate_cap,
                    )
                    .per_candidate_results(providers.one_way_result_cap)
                    .deadline(suggested_deadline(providers.adapter_timeout())),
            ));
        } else {
            tracing::warn!("No structured search endpoint configured; structured and AI-suggested streams disabled");
        }

        let hidden = HttpHiddenCityProvider::new(
            http,
            providers.hidden_city_endpoint.as_deref(),
            providers.api_key.clone(),
        )?;
        if hidden.is_configured() {
            registry.register(Arc::new(HiddenCitySearchAdapter::new(Arc::new(hidden))));
        } else {
            tracing::warn!("No hidden-city endpoint configured; hidden-city stream disabled");
        }

        if registry.is_empty() {
            tracing::warn!("No flight search endpoints configured; every search will come back empty");
        } else {
            tracing::info!("{} flight source(s) configured", registry.len());
        }

        let invoker = ModelInvoker::new(model, models.fallback_model.clone())
            .timeouts(models.request_timeout(), models.fallback_timeout());

        Ok(Self::new(registry, invoker, models.primary_model.clone())
            .budget(config.budget.clone())
            .prompt_builder(PromptBuilder::new(config.report.downgrade_threshold))
            .adapter_timeout(providers.adapter_timeout()))
    }

    /// The report and discovery model client
    ///
    /// Its HTTP timeout is the longest configured model call, so the
    /// invoker's per-attempt timeouts are the ones that apply.
    fn completion_model(config: &Config) -> Result<Arc<dyn CompletionModel>, SourceError> {
        let models = &config.models;
        if models.api_key.is_none() {
            tracing::warn!("No model API key configured; report generation will likely fail");
        }

        let http = HttpClient::with_request_timeout(&config.transport, config.longest_model_call())?;
        Ok(Arc::new(ChatCompletionsModel::new(
            http,
            models.api_base.clone(),
            models.api_key.clone(),
        )))
    }

    pub fn budget(mut self, budget: BudgetConfig) -> Self {
        self.budget = budget;
        self
    }

    pub fn prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    /// Override the model that writes the report
    pub fn primary_model(mut self, model: impl Into<String>) -> Self {
        self.primary_model = model.into();
        self
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Run the pipeline for one search
    pub async fn run(&self, request: &SearchRequest) -> PipelineResult {
        let started = Instant::now();
        self.metrics.record_run();

        let shape = PipelineShape::for_request(request);
        tracing::info!(
            "Searching {} -> {} on {} ({:?})",
            request.origin,
            request.destination,
            request.departure_date,
            shape
        );

        let mut raw = self.collect(request, shape).await;
        let mut stream = |source: FlightSource| {
            let records = raw.remove(&source).unwrap_or_default();
            let kept = filter_records(normalize_all(&records, source), source);
            self.metrics.record_records(source, kept.len());
            kept
        };
        let structured = stream(FlightSource::Structured);
        let hidden_city = stream(FlightSource::HiddenCity);
        let suggested = stream(FlightSource::SuggestedHiddenCity);

        let dataset = merge(structured, hidden_city, suggested, &self.budget);
        let elapsed = |started: Instant| started.elapsed().as_millis() as u64;

        if dataset.is_empty() {
            tracing::info!("No flights found for {} -> {}", request.origin, request.destination);
            self.metrics.record_empty_run();
            return PipelineResult {
                success: true,
                report: no_flights_report(request),
                source_counts: SourceCounts::default(),
                model_used: None,
                fallback_used: false,
                shape,
                elapsed_ms: elapsed(started),
            };
        }

        let source_counts = dataset.counts();
        let prompt = self.prompts.build(&dataset, request);
        let invocation = self.invoker.invoke(&prompt, &self.primary_model).await;

        if invocation.fallback_used {
            self.metrics.record_fallback();
        }

        let result = match invocation.outcome {
            InvocationOutcome::Success(report) => PipelineResult {
                success: true,
                report,
                source_counts,
                model_used: invocation.actual_model,
                fallback_used: invocation.fallback_used,
                shape,
                elapsed_ms: elapsed(started),
            },
            InvocationOutcome::Failure(reason) => {
                tracing::error!("Report generation failed: {}", reason);
                self.metrics.record_model_failure();
                PipelineResult {
                    success: false,
                    report: degraded_report(&dataset, request, &invocation.errors),
                    source_counts,
                    model_used: None,
                    fallback_used: invocation.fallback_used,
                    shape,
                    elapsed_ms: elapsed(started),
                }
            }
        };

        tracing::info!(
            "Pipeline finished in {} ms: {} flights, model {:?}",
            result.elapsed_ms,
            result.source_counts.total(),
            result.model_used
        );
        result
    }

    /// Run every adapter of the shape concurrently and wait for all of them
    async fn collect(
        &self,
        request: &SearchRequest,
        shape: PipelineShape,
    ) -> HashMap<FlightSource, Vec<RawProviderRecord>> {
        let mut handles = Vec::new();
        for (source, adapter) in self.registry.for_shape(shape) {
            let adapter = match adapter {
                Ok(adapter) => adapter,
                Err(e) => {
                    tracing::warn!("[{}] skipped: {}", source.id(), e);
                    continue;
                }
            };

            let request = request.clone();
            let limit = self.adapter_timeout;
            let handle = tokio::spawn(async move {
                tokio::time::timeout(limit, adapter.search(&request)).await
            });
            handles.push((source, handle));
        }

        let outcomes = join_all(
            handles
                .into_iter()
                .map(|(source, handle)| async move { (source, handle.await) }),
        )
        .await;

        let mut streams = HashMap::new();
        for (source, outcome) in outcomes {
            let records = match outcome {
                Ok(Ok(Ok(records))) => {
                    tracing::info!("[{}] {} raw records", source.id(), records.len());
                    records
                }
                Ok(Ok(Err(e))) => {
                    tracing::warn!("[{}] search failed: {}", source.id(), e);
                    self.metrics.record_adapter_failure();
                    Vec::new()
                }
                Ok(Err(_)) => {
                    tracing::warn!("[{}] timed out after {:?}", source.id(), self.adapter_timeout);
                    self.metrics.record_adapter_timeout();
                    Vec::new()
                }
                Err(e) => {
                    if e.is_panic() {
                        self.metrics.record_adapter_panic();
                    }
                    tracing::warn!("[{}] task aborted: {}", source.id(), e);
                    Vec::new()
                }
            };
            streams.insert(source, records);
        }
        streams
    }
}

/// Time the suggested adapter may spend before returning what it has,
/// leaving a tenth of the adapter timeout for its final sort
fn suggested_deadline(adapter_timeout: Duration) -> Duration {
    adapter_timeout - adapter_timeout / 10
}
