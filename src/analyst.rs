//! Structured-query (Cortex Analyst) integration
//!
//! Sends the protocol history to the analyst service and normalizes whatever
//! comes back into an [`AnalystResult`].

mod client;
mod parser;


pub use client::{AnalystError, CortexAnalystClient};
pub use parser::{parse_analyst_response, AnalystResult};

use crate::session::ProtocolMessage;
use async_trait::async_trait;
use serde_json::Value;

/// Client for the remote structured-query service
#[async_trait]
pub trait AnalystClient: Send + Sync {
    /// Send the conversation so far and return the raw JSON response
    async fn send(&self, messages: &[ProtocolMessage]) -> Result<Value, AnalystError>;
}
