//! HTTP client utilities.
//!
//! Every client is built from an explicit [`TransportConfig`]; TLS roots,
//! proxies and timeouts are scoped to the client, never set process-wide.

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TransportConfig;
use crate::sources::SourceError;

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default transport settings
    pub fn new() -> Self {
        Self::with_transport(&TransportConfig::default()).expect("Failed to create HTTP client")
    }

    /// Create a client from transport settings
    pub fn with_transport(transport: &TransportConfig) -> Result<Self, SourceError> {
        Self::build(transport, Duration::from_secs(transport.timeout_secs))
    }

    /// Create a client from transport settings whose whole-request timeout is
    /// `request_timeout` instead of `transport.timeout_secs`
    ///
    /// Model calls use this so that their own, much longer, deadlines apply.
    pub fn with_request_timeout(
        transport: &TransportConfig,
        request_timeout: Duration,
    ) -> Result<Self, SourceError> {
        Self::build(transport, request_timeout)
    }

    fn build(transport: &TransportConfig, request_timeout: Duration) -> Result<Self, SourceError> {
        let user_agent = transport.user_agent.clone().unwrap_or_else(|| {
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
        });

        let mut builder = Client::builder()
            .user_agent(user_agent)
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(transport.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .danger_accept_invalid_certs(transport.accept_invalid_certs);

        if let Some(proxy) = &transport.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| SourceError::InvalidRequest(format!("Invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        if let Some(path) = &transport.ca_bundle {
            let pem = std::fs::read(path).map_err(|e| {
                SourceError::Unavailable(format!(
                    "Cannot read CA bundle {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| SourceError::InvalidRequest(format!("Invalid CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_client_with_proxy() {
        let transport = TransportConfig {
            proxy: Some("http://127.0.0.1:8080".to_string()),
            ..Default::default()
        };
        assert!(HttpClient::with_transport(&transport).is_ok());
    }

    #[test]
    fn test_missing_ca_bundle_is_unavailable() {
        let transport = TransportConfig {
            ca_bundle: Some(PathBuf::from("/nonexistent/root.pem")),
            ..Default::default()
        };
        match HttpClient::with_transport(&transport) {
            Err(SourceError::Unavailable(msg)) => assert!(msg.contains("root.pem")),
            other => panic!("expected Unavailable, got {:?}", other.map(|_| ())),
        }
    }
}
