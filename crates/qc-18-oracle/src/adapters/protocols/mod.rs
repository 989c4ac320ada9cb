//! # Fetch Protocols
//!
//! Scheme → protocol dispatch, filtering and filter-cost accounting.
//!
//! Every failure collapses into an error response: the network must be
//! able to agree on a negative outcome as well as a positive one.

pub mod http;

pub use http::HttpProtocol;

use crate::config::FetchConfig;
use crate::domain::filter;
use crate::error::FetchError;
use crate::ports::outbound::OracleProtocol;
use reqwest::Url;
use shared_types::{short_hex, OracleRequest, OracleResponseAttribute};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Protocols keyed by lowercase URL scheme.
#[derive(Clone)]
pub struct ProtocolRegistry {
    protocols: HashMap<String, Arc<dyn OracleProtocol>>,
    max_result_bytes: usize,
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self {
            protocols: HashMap::new(),
            max_result_bytes: FetchConfig::default().max_response_bytes,
        }
    }
}

impl ProtocolRegistry {
    /// Empty registry; every request yields an error response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry serving `http` and `https` with [`HttpProtocol`].
    ///
    /// Filtered results share the fetch body limit.
    pub fn with_http(config: FetchConfig) -> Result<Self, FetchError> {
        let max_result_bytes = config.max_response_bytes;
        let http: Arc<dyn OracleProtocol> = Arc::new(HttpProtocol::new(config)?);
        let mut registry = Self {
            max_result_bytes,
            ..Self::new()
        };
        registry.register("http", Arc::clone(&http));
        registry.register("https", http);
        Ok(registry)
    }

    /// Register (or replace) the protocol for `scheme`.
    pub fn register(&mut self, scheme: &str, protocol: Arc<dyn OracleProtocol>) {
        self.protocols.insert(scheme.to_ascii_lowercase(), protocol);
    }

    /// Fetch and filter `request`.
    ///
    /// Filter cost is `(raw bytes - filtered bytes) * fee_per_byte`.
    pub async fn fetch(
        &self,
        request: &OracleRequest,
        fee_per_byte: u64,
    ) -> Result<OracleResponseAttribute, FetchError> {
        let url =
            Url::parse(&request.url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let protocol = self
            .protocols
            .get(url.scheme())
            .ok_or_else(|| FetchError::UnsupportedScheme(url.scheme().to_string()))?;

        let raw = protocol.fetch(&url).await?;

        let (data, filter_cost) = match request.filter.as_deref() {
            Some(expr) if !expr.trim().is_empty() => {
                let filtered = filter::apply(&raw, expr, self.max_result_bytes)?;
                let removed = raw.len().saturating_sub(filtered.len()) as u64;
                (filtered, removed.saturating_mul(fee_per_byte))
            }
            _ => (raw, 0),
        };

        Ok(OracleResponseAttribute::success(
            request.request_id,
            data,
            filter_cost,
        ))
    }

    /// Like [`Self::fetch`], but any failure becomes an error response.
    pub async fn process(
        &self,
        request: &OracleRequest,
        fee_per_byte: u64,
    ) -> OracleResponseAttribute {
        match self.fetch(request, fee_per_byte).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    request_id = %short_hex(&request.request_id),
                    reason = %err,
                    "[qc-18] Fetch failed, responding with error"
                );
                OracleResponseAttribute::error(request.request_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticProtocol;

    fn registry(body: &str) -> (ProtocolRegistry, Arc<StaticProtocol>) {
        let protocol = Arc::new(StaticProtocol::ok(body));
        let mut registry = ProtocolRegistry::new();
        registry.register("https", protocol.clone());
        (registry, protocol)
    }

    #[tokio::test]
    async fn test_filter_cost_charged_for_removed_bytes() {
        let body = r#"{"price":42,"padding":"xxxxxxxxxx"}"#;
        let (registry, _) = registry(body);
        let request = OracleRequest::new(
            [1u8; 32],
            "https://api.example/price",
            Some("$.price".into()),
        );

        let response = registry.fetch(&request, 3).await.unwrap();
        assert_eq!(response.data.as_deref(), Some(&b"[42]"[..]));
        assert_eq!(response.filter_cost, (body.len() as u64 - 4) * 3);
    }

    #[tokio::test]
    async fn test_no_filter_returns_raw_body() {
        let (registry, protocol) = registry("[1,2]");
        let request = OracleRequest::new([1u8; 32], "HTTPS://api.example/list", None);

        let response = registry.fetch(&request, 3).await.unwrap();
        assert_eq!(response.data.as_deref(), Some(&b"[1,2]"[..]));
        assert_eq!(response.filter_cost, 0);
        assert_eq!(protocol.calls(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_scheme_and_bad_url() {
        let (registry, _) = registry("{}");

        let ftp = OracleRequest::new([1u8; 32], "ftp://files.example/x", None);
        assert_eq!(
            registry.fetch(&ftp, 1).await,
            Err(FetchError::UnsupportedScheme("ftp".into()))
        );

        let garbage = OracleRequest::new([1u8; 32], "not a url", None);
        assert!(matches!(
            registry.fetch(&garbage, 1).await,
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_process_collapses_errors() {
        let protocol = Arc::new(StaticProtocol::failing(FetchError::Timeout));
        let mut registry = ProtocolRegistry::new();
        registry.register("https", protocol);

        let request = OracleRequest::new([6u8; 32], "https://slow.example", None);
        let response = registry.process(&request, 1).await;

        assert!(response.is_error());
        assert_eq!(response.request_id, [6u8; 32]);
        assert_eq!(response.filter_cost, 0);
    }

    #[tokio::test]
    async fn test_runaway_filter_is_error_response() {
        let body = format!("{}0{}", "[".repeat(40), "]".repeat(40));
        let (registry, _) = registry(&body);
        let expr = format!("${}", "..*".repeat(5));
        let request = OracleRequest::new([1u8; 32], "https://x.example", Some(expr));

        assert!(matches!(
            registry.fetch(&request, 1).await,
            Err(FetchError::FilterError(_))
        ));
        assert!(registry.process(&request, 1).await.is_error());
    }

    #[tokio::test]
    async fn test_filter_failure_is_error_response() {
        let (registry, _) = registry("<html>");
        let request = OracleRequest::new([1u8; 32], "https://x.example", Some("$.a".into()));
        assert!(registry.process(&request, 1).await.is_error());
    }
}
