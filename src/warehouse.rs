//! SQL execution bridge
//!
//! Runs a single statement against a warehouse and materializes the result as
//! a [`QueryResult`] table.

mod snowflake;
mod sqlite;
mod table;

pub use snowflake::{SnowflakeWarehouse, StatementContext};
pub use sqlite::SqliteWarehouse;
pub use table::QueryResult;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Warehouse request failed: {0}")]
    Request(String),
    #[error("Warehouse returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("SQL compilation or execution error {code}: {message}")]
    Statement { code: String, message: String },
    #[error("Failed to decode warehouse response: {0}")]
    Decode(String),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Something that can run SQL and return a table
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryResult, WarehouseError>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}
