//! Remote gateway: executes validated operations against the instance
//!
//! The agent loop only ever sees the [`Gateway`] trait. The production
//! implementation is [`ServiceNowClient`]; tests substitute their own.

pub mod servicenow;

pub use servicenow::{QueryOptions, ServiceNowClient};

use crate::operations::{Failure, OperationCall};
use async_trait::async_trait;
use serde_json::Value;

/// Result of one gateway call: remote data or a structured failure
pub type GatewayOutcome = std::result::Result<Value, Failure>;

/// Executes one validated operation and reports the outcome
///
/// Implementations never panic on remote errors and never retry; every
/// problem is returned as a [`Failure`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Execute `call` against the remote system
    async fn invoke(&self, call: &OperationCall) -> GatewayOutcome;
}
