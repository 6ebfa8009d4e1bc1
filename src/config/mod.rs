//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `FARE_MASTER` (nested keys separated by
//! `__`, e.g. `FARE_MASTER_MODELS__PRIMARY_MODEL=gpt-4o`).

mod file_config;

pub use file_config::{default_config_path, find_config_file, write_default_config};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Report and discovery model settings
    #[serde(default)]
    pub models: ModelConfig,

    /// Search provider endpoints and limits
    #[serde(default)]
    pub providers: ProviderConfig,

    /// Payload budgeting
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Report generation
    #[serde(default)]
    pub report: ReportConfig,

    /// HTTP transport shared by every client
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Config {
    /// Longest single model call the invoker or the discovery phase allows
    pub fn longest_model_call(&self) -> Duration {
        self.models
            .request_timeout()
            .max(self.models.fallback_timeout())
            .max(self.models.discovery_timeout())
    }

    /// Time the suggested adapter needs when discovery and every candidate
    /// wave run to their timeouts
    pub fn suggested_worst_case(&self) -> Duration {
        let concurrency = self.budget.candidate_concurrency.max(1);
        let waves = self.budget.max_candidates.div_ceil(concurrency) as u32;
        self.models.discovery_timeout() + self.providers.candidate_timeout() * waves
    }
}

/// Text-generation model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API key (falls back to `OPENAI_API_KEY`)
    #[serde(default = "default_api_key", skip_serializing)]
    pub api_key: Option<String>,

    /// Model that writes the report
    #[serde(default = "default_primary_model")]
    pub primary_model: String,

    /// Model used when the primary fails
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    /// Fast model that suggests hidden-city candidates
    #[serde(default = "default_discovery_model")]
    pub discovery_model: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_fallback_timeout")]
    pub fallback_timeout_secs: u64,

    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: default_api_key(),
            primary_model: default_primary_model(),
            fallback_model: default_fallback_model(),
            discovery_model: default_discovery_model(),
            request_timeout_secs: default_request_timeout(),
            fallback_timeout_secs: default_fallback_timeout(),
            discovery_timeout_secs: default_discovery_timeout(),
        }
    }
}

impl ModelConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY").ok()
}

fn default_primary_model() -> String {
    "gpt-4o".to_string()
}

fn default_fallback_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_discovery_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_request_timeout() -> u64 {
    300 // large datasets need generation time
}

fn default_fallback_timeout() -> u64 {
    180
}

fn default_discovery_timeout() -> u64 {
    60
}

/// Search provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Structured fare search endpoint (POST, JSON filters)
    #[serde(default)]
    pub structured_endpoint: Option<String>,

    /// Hidden-city fare search endpoint (GET, query parameters)
    #[serde(default)]
    pub hidden_city_endpoint: Option<String>,

    /// Bearer token sent to both endpoints
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Upper bound for one adapter, including all of its calls
    #[serde(default = "default_adapter_timeout")]
    pub adapter_timeout_secs: u64,

    /// Upper bound for one hidden-city candidate search
    #[serde(default = "default_candidate_timeout")]
    pub candidate_timeout_secs: u64,

    #[serde(default = "default_one_way_cap")]
    pub one_way_result_cap: usize,

    /// Round-trip responses are heavier per result
    #[serde(default = "default_round_trip_cap")]
    pub round_trip_result_cap: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            structured_endpoint: None,
            hidden_city_endpoint: None,
            api_key: None,
            adapter_timeout_secs: default_adapter_timeout(),
            candidate_timeout_secs: default_candidate_timeout(),
            one_way_result_cap: default_one_way_cap(),
            round_trip_result_cap: default_round_trip_cap(),
        }
    }
}

impl ProviderConfig {
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }

    pub fn candidate_timeout(&self) -> Duration {
        Duration::from_secs(self.candidate_timeout_secs)
    }
}

fn default_adapter_timeout() -> u64 {
    180
}

fn default_candidate_timeout() -> u64 {
    30
}

fn default_one_way_cap() -> usize {
    60
}

fn default_round_trip_cap() -> usize {
    30
}

/// Payload budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_stream_cap")]
    pub structured_cap: usize,

    #[serde(default = "default_stream_cap")]
    pub hidden_city_cap: usize,

    /// Cap for the AI-suggested stream in the merged dataset
    #[serde(default = "default_suggested_cap")]
    pub suggested_cap: usize,

    /// Cap applied by the suggested adapter's final selection
    #[serde(default = "default_suggested_cap")]
    pub suggested_candidate_cap: usize,

    /// Maximum hidden-city candidate cities taken from the discovery model
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Concurrent candidate searches
    #[serde(default = "default_candidate_concurrency")]
    pub candidate_concurrency: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            structured_cap: default_stream_cap(),
            hidden_city_cap: default_stream_cap(),
            suggested_cap: default_suggested_cap(),
            suggested_candidate_cap: default_suggested_cap(),
            max_candidates: default_max_candidates(),
            candidate_concurrency: default_candidate_concurrency(),
        }
    }
}

fn default_stream_cap() -> usize {
    60
}

fn default_suggested_cap() -> usize {
    100
}

fn default_max_candidates() -> usize {
    10
}

fn default_candidate_concurrency() -> usize {
    4
}

/// Report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Below this many exact matches the report may show best available alternatives
    #[serde(default = "default_downgrade_threshold")]
    pub downgrade_threshold: usize,

    /// Locale used when the caller does not pass one
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Currency used when the caller does not pass one
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            downgrade_threshold: default_downgrade_threshold(),
            default_locale: default_locale(),
            default_currency: default_currency(),
        }
    }
}

fn default_downgrade_threshold() -> usize {
    3
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

/// HTTP transport and TLS settings, passed into every client constructor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Per-request timeout for provider calls
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Proxy URL for all requests (http, https or socks5)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Extra PEM root certificate to trust
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,

    /// Disable certificate verification (local testing only)
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: default_http_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            proxy: None,
            ca_bundle: None,
            accept_invalid_certs: false,
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Load configuration from an optional file plus `FARE_MASTER_*` environment variables
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("FARE_MASTER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Get the default configuration (from env vars or defaults)
pub fn get_config() -> Config {
    Config::default()
}
