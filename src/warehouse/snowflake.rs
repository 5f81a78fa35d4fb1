//! Snowflake SQL API v2 backend

use super::{QueryResult, Warehouse, WarehouseError};
use crate::config::SnowflakeConfig;
use crate::snowflake::SnowflakeConnection;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const STATEMENTS_PATH: &str = "/api/v2/statements";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Session context applied to every submitted statement
#[derive(Debug, Clone, Default)]
pub struct StatementContext {
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub role: Option<String>,
}

impl StatementContext {
    pub fn from_config(config: &SnowflakeConfig) -> Self {
        Self {
            warehouse: config.warehouse.clone(),
            database: config.database.clone(),
            schema: config.schema.clone(),
            role: config.role.clone(),
        }
    }
}

/// Warehouse backed by the Snowflake SQL REST API
#[derive(Debug, Clone)]
pub struct SnowflakeWarehouse {
    connection: SnowflakeConnection,
    context: StatementContext,
    poll_interval: Duration,
}

impl SnowflakeWarehouse {
    pub fn new(connection: SnowflakeConnection, context: StatementContext) -> Self {
        Self {
            connection,
            context,
            poll_interval: POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn read_response(
        &self,
        response: reqwest::Response,
    ) -> Result<Progress, WarehouseError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WarehouseError::Request(format!("Failed to read response: {e}")))?;

        match status {
            StatusCode::OK => {
                let parsed: StatementResponse = serde_json::from_str(&body)
                    .map_err(|e| WarehouseError::Decode(e.to_string()))?;
                Ok(Progress::Done(parsed))
            }
            StatusCode::ACCEPTED => {
                let parsed: StatementResponse = serde_json::from_str(&body)
                    .map_err(|e| WarehouseError::Decode(e.to_string()))?;
                let url = parsed
                    .statement_status_url
                    .or_else(|| {
                        parsed
                            .statement_handle
                            .map(|handle| format!("{STATEMENTS_PATH}/{handle}"))
                    })
                    .ok_or_else(|| {
                        WarehouseError::Decode("statement accepted without a status URL".into())
                    })?;
                Ok(Progress::Running(url))
            }
            _ => Err(statement_error(status, &body)),
        }
    }

    async fn fetch_partition(
        &self,
        handle: &str,
        partition: usize,
    ) -> Result<Vec<Vec<Option<String>>>, WarehouseError> {
        let response = self
            .connection
            .get(&format!("{STATEMENTS_PATH}/{handle}?partition={partition}"))
            .send()
            .await
            .map_err(|e| WarehouseError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WarehouseError::Request(format!("Failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(statement_error(status, &body));
        }

        let parsed: PartitionResponse =
            serde_json::from_str(&body).map_err(|e| WarehouseError::Decode(e.to_string()))?;
        Ok(parsed.data)
    }
}

#[async_trait]
impl Warehouse for SnowflakeWarehouse {
    async fn execute(&self, sql: &str) -> Result<QueryResult, WarehouseError> {
        let request = StatementRequest {
            statement: sql,
            warehouse: self.context.warehouse.as_deref(),
            database: self.context.database.as_deref(),
            schema: self.context.schema.as_deref(),
            role: self.context.role.as_deref(),
        };

        let response = self
            .connection
            .post(STATEMENTS_PATH)
            .json(&request)
            .send()
            .await
            .map_err(|e| WarehouseError::Request(e.to_string()))?;

        let mut progress = self.read_response(response).await?;
        let mut finished = loop {
            match progress {
                Progress::Done(body) => break body,
                Progress::Running(url) => {
                    tracing::debug!(url = %url, "Statement still running, polling");
                    tokio::time::sleep(self.poll_interval).await;
                    let response = self
                        .connection
                        .get(&url)
                        .send()
                        .await
                        .map_err(|e| WarehouseError::Request(e.to_string()))?;
                    progress = self.read_response(response).await?;
                }
            }
        };

        let metadata = finished.result_set_meta_data.take().unwrap_or_default();
        let mut raw_rows = std::mem::take(&mut finished.data);

        if metadata.partition_info.len() > 1 {
            let handle = finished.statement_handle.as_deref().ok_or_else(|| {
                WarehouseError::Decode("partitioned result without a statement handle".into())
            })?;
            for partition in 1..metadata.partition_info.len() {
                raw_rows.extend(self.fetch_partition(handle, partition).await?);
            }
        }

        let columns = metadata.row_type.iter().map(|c| c.name.clone()).collect();
        let rows = raw_rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .enumerate()
                    .map(|(i, cell)| {
                        let column_type = metadata.row_type.get(i).map_or("", |c| c.type_name.as_str());
                        typed_cell(cell, column_type)
                    })
                    .collect()
            })
            .collect();

        Ok(QueryResult::new(columns, rows))
    }

    fn backend(&self) -> &'static str {
        "snowflake"
    }
}

enum Progress {
    Running(String),
    Done(StatementResponse),
}

/// Snowflake returns every cell as a string; recover the scalar type from the
/// column metadata so numbers stay numbers in the rendered table.
fn typed_cell(cell: Option<String>, column_type: &str) -> Value {
    let Some(text) = cell else {
        return Value::Null;
    };
    match column_type {
        "fixed" => text
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| text.parse::<f64>().map(Value::from))
            .unwrap_or(Value::String(text)),
        "real" => text.parse::<f64>().map_or(Value::String(text), Value::from),
        "boolean" => match text.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text),
        },
        _ => Value::String(text),
    }
}

fn statement_error(status: StatusCode, body: &str) -> WarehouseError {
    match serde_json::from_str::<StatementResponse>(body) {
        Ok(StatementResponse {
            message: Some(message),
            code,
            ..
        }) => WarehouseError::Statement {
            code: code.unwrap_or_else(|| status.as_u16().to_string()),
            message,
        },
        _ => WarehouseError::Status {
            status: status.as_u16(),
            message: body.trim().to_string(),
        },
    }
}

// Snowflake SQL API types

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    statement_status_url: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<RowType>,
    #[serde(default)]
    partition_info: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
    #[serde(rename = "type", default)]
    type_name: String,
}

#[derive(Debug, Deserialize)]
struct PartitionResponse {
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}
