//! # HTTP Peer Broadcaster
//!
//! Fire-and-forget gossip: one detached POST per peer carrying
//! `[{"data": "<hex payload>"}]`. Responses are read and discarded; there is
//! no retry.

use crate::domain::OraclePayload;
use crate::error::{OracleError, OracleResult};
use crate::ports::outbound::PeerBroadcaster;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// One entry of the peer-broadcast body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMessage {
    /// Hex-encoded [`OraclePayload`].
    pub data: String,
}

/// Broadcasts payloads to a fixed peer list over HTTP.
pub struct HttpBroadcaster {
    client: Client,
    peers: Vec<Url>,
}

impl HttpBroadcaster {
    /// Peers are `host:port` (sent to `http://host:port/`) or full URLs.
    pub fn new(peers: &[String], timeout: Duration) -> OracleResult<Self> {
        let peers = peers
            .iter()
            .map(|peer| parse_peer(peer))
            .collect::<OracleResult<Vec<_>>>()?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Config {
                reason: format!("http client: {}", e),
            })?;
        Ok(Self { client, peers })
    }

    /// Configured peer endpoints.
    pub fn peers(&self) -> &[Url] {
        &self.peers
    }
}

fn parse_peer(peer: &str) -> OracleResult<Url> {
    let candidate = if peer.contains("://") {
        peer.to_string()
    } else {
        format!("http://{}/", peer)
    };
    Url::parse(&candidate).map_err(|e| OracleError::Config {
        reason: format!("invalid peer '{}': {}", peer, e),
    })
}

impl PeerBroadcaster for HttpBroadcaster {
    fn broadcast(&self, payload: &OraclePayload) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("[qc-18] No async runtime, payload not broadcast");
            return;
        };

        let body = vec![PeerMessage {
            data: payload.to_hex(),
        }];
        let request_id = payload.short_request_id();

        for url in &self.peers {
            let client = self.client.clone();
            let url = url.clone();
            let body = body.clone();
            let request_id = request_id.clone();
            runtime.spawn(async move {
                match client.post(url.clone()).json(&body).send().await {
                    Ok(response) => {
                        let status = response.status();
                        let _ = response.bytes().await;
                        debug!(
                            request_id = %request_id,
                            peer = %url,
                            status = status.as_u16(),
                            "[qc-18] Payload delivered"
                        );
                    }
                    Err(err) => {
                        warn!(
                            request_id = %request_id,
                            peer = %url,
                            reason = %err,
                            "[qc-18] Payload delivery failed"
                        );
                    }
                }
            });
        }
    }
}
