//! JSON-over-HTTP bindings for the search provider contracts.
//!
//! Both bindings accept either a bare JSON array of flights or an object
//! wrapping one under `flights`, `results` or `data`.

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::models::RawProviderRecord;
use crate::sources::{
    HiddenCityQuery, HiddenCityResponse, HiddenCitySearchProvider, SourceError,
    StructuredFilters, StructuredSearchProvider,
};
use crate::utils::{with_retry, HttpClient, RetryConfig};

fn parse_endpoint(endpoint: Option<&str>) -> Result<Option<Url>, SourceError> {
    endpoint
        .map(|e| {
            Url::parse(e).map_err(|err| SourceError::InvalidRequest(format!("Invalid endpoint {}: {}", e, err)))
        })
        .transpose()
}

fn flight_list(body: &Value) -> Vec<RawProviderRecord> {
    let items = match body {
        Value::Array(items) => Some(items),
        Value::Object(map) => ["flights", "results", "data"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array)),
        _ => None,
    };

    items
        .map(|items| items.iter().cloned().filter_map(RawProviderRecord::from_json).collect())
        .unwrap_or_default()
}

async fn read_json(response: reqwest::Response) -> Result<Value, SourceError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(SourceError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Structured fare search behind a JSON endpoint
///
/// Filters are POSTed as JSON; the response is a list of flight mappings.
#[derive(Debug, Clone)]
pub struct HttpStructuredProvider {
    http: HttpClient,
    endpoint: Option<Url>,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl HttpStructuredProvider {
    pub fn new(http: HttpClient, endpoint: Option<&str>, api_key: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            http,
            endpoint: parse_endpoint(endpoint)?,
            api_key,
            retry: RetryConfig::default(),
        })
    }

    /// Override the retry policy
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[async_trait]
impl StructuredSearchProvider for HttpStructuredProvider {
    fn name(&self) -> &str {
        "HTTP structured search"
    }

    async fn search(&self, filters: &StructuredFilters) -> Result<Vec<RawProviderRecord>, SourceError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| SourceError::Unavailable("structured search endpoint not configured".to_string()))?;

        let body = with_retry(self.retry, move || async move {
            let mut request = self.http.client().post(endpoint.clone()).json(filters);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }
            read_json(request.send().await?).await
        })
        .await?;

        Ok(flight_list(&body))
    }
}

/// Hidden-city fare search behind a JSON endpoint
///
/// The query is sent as GET parameters; the response is
/// `{"success": bool, "flights": [...], "error": "..."}`.
#[derive(Debug, Clone)]
pub struct HttpHiddenCityProvider {
    http: HttpClient,
    endpoint: Option<Url>,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl HttpHiddenCityProvider {
    pub fn new(http: HttpClient, endpoint: Option<&str>, api_key: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            http,
            endpoint: parse_endpoint(endpoint)?,
            api_key,
            retry: RetryConfig::default(),
        })
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    fn query_url(endpoint: &Url, query: &HiddenCityQuery) -> Url {
        let mut url = endpoint.clone();
        url.query_pairs_mut()
            .append_pair("origin", &query.origin)
            .append_pair("destination", &query.destination)
            .append_pair("date", &query.date.to_string())
            .append_pair("cabin", query.cabin.name())
            .append_pair("adults", &query.adults.to_string())
            .append_pair("currency", &query.currency)
            .append_pair("hidden_only", if query.hidden_only { "true" } else { "false" });
        url
    }
}

#[async_trait]
impl HiddenCitySearchProvider for HttpHiddenCityProvider {
    fn name(&self) -> &str {
        "HTTP hidden-city search"
    }

    async fn search(&self, query: &HiddenCityQuery) -> Result<HiddenCityResponse, SourceError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| SourceError::Unavailable("hidden-city endpoint not configured".to_string()))?;
        let url = Self::query_url(endpoint, query);
        let url = &url;

        let body = with_retry(self.retry, move || async move {
            let mut request = self.http.client().get(url.clone());
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }
            read_json(request.send().await?).await
        })
        .await?;

        let success = body.get("success").and_then(Value::as_bool).unwrap_or(true);
        if !success {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("provider reported failure");
            return Ok(HiddenCityResponse::failed(error));
        }

        Ok(HiddenCityResponse::ok(flight_list(&body)))
    }
}
