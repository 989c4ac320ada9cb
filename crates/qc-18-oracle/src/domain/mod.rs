//! Domain layer: aggregation state, wire payload, filtering and the
//! candidate response transaction.

pub mod context;
pub mod filter;
pub mod payload;
pub mod pending;
pub mod response;
pub mod task;
pub mod transaction;

pub use context::{Contribution, SignatureContext};
pub use filter::JsonPath;
pub use payload::OraclePayload;
pub use pending::{PendingTaskTable, TaskHandle, TaskSlot};
pub use response::{Millis, ResponseCollection, ResponseItem};
pub use task::{AggregationTask, MergeOutcome, TaskState};
pub use transaction::{build_response_transaction, callback_script, network_fee};
