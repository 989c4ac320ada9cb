//! # Shared Types Crate
//!
//! Value types owned by the ledger and read by the oracle subsystem, together
//! with the length-prefixed binary encoding they are hashed and transmitted in.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: request descriptors, response attributes and
//!   transactions are defined once here; subsystems never redefine them.
//! - **Read-Only for Oracles**: the oracle engine only reads `OracleRequest`
//!   values; their lifecycle is driven by the ledger.
//! - **Deterministic Encoding**: every hash is computed over the explicit
//!   byte layout in [`encoding`], never over a serde format.

pub mod encoding;
pub mod entities;

pub use encoding::{DecodeError, Reader};
pub use entities::*;
