//! Ports (hexagonal architecture boundaries)

pub mod inbound;
pub mod outbound;

pub use inbound::OracleApi;
pub use outbound::{LedgerGateway, OracleProtocol, PeerBroadcaster, SystemTimeSource, TimeSource};
