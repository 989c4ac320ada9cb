//! Adapters (hexagonal architecture outer layer)
//!
//! - `protocols`: external data fetch (HTTP/HTTPS) and scheme dispatch
//! - `broadcaster`: gossip egress to peer nodes
//! - `rpc`: HTTP ingress for peer payloads

pub mod broadcaster;
pub mod protocols;
pub mod rpc;

pub use broadcaster::{HttpBroadcaster, PeerMessage};
pub use protocols::{HttpProtocol, ProtocolRegistry};
pub use rpc::router;
