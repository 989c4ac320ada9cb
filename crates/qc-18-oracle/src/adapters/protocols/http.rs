//! # HTTP(S) Fetch Protocol
//!
//! ## Security
//!
//! - Targets resolving to loopback, private, link-local, broadcast or
//!   unspecified addresses are refused unless `allow_private_hosts` is set.
//! - Redirects are not followed (a redirect could bypass the address check).
//! - The whole exchange, body included, is bounded by the configured timeout
//!   and the body by `max_response_bytes`.

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::ports::outbound::OracleProtocol;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect, Client, Url};
use std::net::IpAddr;
use tracing::debug;

/// Fetches `http` and `https` resources.
pub struct HttpProtocol {
    client: Client,
    config: FetchConfig,
}

impl HttpProtocol {
    /// Build a protocol with its own HTTP client.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn check_destination(&self, url: &Url) -> Result<(), FetchError> {
        if self.config.allow_private_hosts {
            return Ok(());
        }
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;

        let literal = host.trim_start_matches('[').trim_end_matches(']');
        let addresses: Vec<IpAddr> = match literal.parse::<IpAddr>() {
            Ok(ip) => vec![ip],
            Err(_) => {
                let port = url.port_or_known_default().unwrap_or(80);
                tokio::net::lookup_host((host, port))
                    .await
                    .map_err(|e| FetchError::Transport(format!("resolve {}: {}", host, e)))?
                    .map(|addr| addr.ip())
                    .collect()
            }
        };

        match addresses.iter().find(|ip| is_internal(ip)) {
            Some(ip) => Err(FetchError::PolicyError(format!(
                "{} resolves to internal address {}",
                host, ip
            ))),
            None => Ok(()),
        }
    }

    async fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ResponseError {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
            .unwrap_or_default();
        if !self
            .config
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&content_type))
        {
            return Err(FetchError::UnsupportedContentType(content_type));
        }

        let max = self.config.max_response_bytes;
        if let Some(size) = response.content_length() {
            if size as usize > max {
                return Err(FetchError::ResponseTooLarge {
                    size: size as usize,
                    max,
                });
            }
        }

        // Content-Length may be absent or wrong; count what actually arrives.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_transport)? {
            let size = body.len() + chunk.len();
            if size > max {
                return Err(FetchError::ResponseTooLarge { size, max });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl OracleProtocol for HttpProtocol {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        self.check_destination(url).await?;
        debug!("[qc-18] Fetching {}", url);

        tokio::time::timeout(self.config.timeout, self.get(url))
            .await
            .map_err(|_| FetchError::Timeout)?
    }
}

fn map_transport(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(err.to_string())
    }
}

/// Whether `ip` is not publicly routable.
pub fn is_internal(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_internal(&IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header;
    use axum::routing::get;
    use axum::Router;
    use std::time::Duration;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn local_config() -> FetchConfig {
        FetchConfig {
            allow_private_hosts: true,
            timeout: Duration::from_millis(500),
            ..Default::default()
        }
    }

    fn test_router() -> Router {
        Router::new()
            .route(
                "/json",
                get(|| async { ([(header::CONTENT_TYPE, "application/json; charset=utf-8")], r#"{"a":1}"#) }),
            )
            .route(
                "/html",
                get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<p>") }),
            )
            .route(
                "/big",
                get(|| async { ([(header::CONTENT_TYPE, "application/json")], "1".repeat(256)) }),
            )
            .route(
                "/endless",
                get(|| async {
                    let chunks = futures::stream::repeat_with(|| {
                        Ok::<_, std::io::Error>("[1,2,3,4,5,6,7,8]".to_string())
                    });
                    ([(header::CONTENT_TYPE, "application/json")], Body::from_stream(chunks))
                }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
    }

    #[test]
    fn test_internal_ranges() {
        for ip in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.0.1",
            "255.255.255.255",
            "0.0.0.0",
            "::1",
            "fd00::1",
            "fe80::1",
            "::ffff:10.0.0.1",
        ] {
            assert!(is_internal(&ip.parse().unwrap()), "{ip} should be internal");
        }
        for ip in ["8.8.8.8", "172.32.0.1", "2606:4700::1111"] {
            assert!(!is_internal(&ip.parse().unwrap()), "{ip} should be public");
        }
    }

    #[tokio::test]
    async fn test_loopback_refused_by_default() {
        let protocol = HttpProtocol::new(FetchConfig::default()).unwrap();
        let url = Url::parse("http://127.0.0.1:9/data").unwrap();

        assert!(matches!(
            protocol.fetch(&url).await,
            Err(FetchError::PolicyError(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_json_body() {
        let base = serve(test_router()).await;
        let protocol = HttpProtocol::new(local_config()).unwrap();

        let body = protocol
            .fetch(&Url::parse(&format!("{}/json", base)).unwrap())
            .await
            .unwrap();
        assert_eq!(body, br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_content_type_and_status_errors() {
        let base = serve(test_router()).await;
        let protocol = HttpProtocol::new(local_config()).unwrap();

        assert_eq!(
            protocol
                .fetch(&Url::parse(&format!("{}/html", base)).unwrap())
                .await,
            Err(FetchError::UnsupportedContentType("text/html".into()))
        );
        assert_eq!(
            protocol
                .fetch(&Url::parse(&format!("{}/missing", base)).unwrap())
                .await,
            Err(FetchError::ResponseError { status: 404 })
        );
    }

    #[tokio::test]
    async fn test_size_limit() {
        let base = serve(test_router()).await;
        let protocol = HttpProtocol::new(FetchConfig {
            max_response_bytes: 64,
            ..local_config()
        })
        .unwrap();

        assert!(matches!(
            protocol
                .fetch(&Url::parse(&format!("{}/big", base)).unwrap())
                .await,
            Err(FetchError::ResponseTooLarge { max: 64, .. })
        ));
    }

    #[tokio::test]
    async fn test_streamed_body_cut_off_at_limit() {
        let base = serve(test_router()).await;
        let protocol = HttpProtocol::new(FetchConfig {
            max_response_bytes: 64,
            timeout: Duration::from_secs(2),
            ..local_config()
        })
        .unwrap();

        // No Content-Length: the limit has to trip while reading.
        assert!(matches!(
            protocol
                .fetch(&Url::parse(&format!("{}/endless", base)).unwrap())
                .await,
            Err(FetchError::ResponseTooLarge { max: 64, .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let base = serve(test_router()).await;
        let protocol = HttpProtocol::new(FetchConfig {
            timeout: Duration::from_millis(100),
            ..local_config()
        })
        .unwrap();

        assert_eq!(
            protocol
                .fetch(&Url::parse(&format!("{}/slow", base)).unwrap())
                .await,
            Err(FetchError::Timeout)
        );
    }
}
