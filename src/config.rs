//! Startup configuration read from the environment

use crate::session::HistoryWindow;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SEMANTIC_MODEL: &str =
    r#"@"CORTEX_ANALYST_DEMO"."REVENUE_TIMESERIES"."RAW_DATA"/revenue_timeseries.yaml"#;
pub const DEFAULT_SUMMARY_MODEL: &str = "claude-3-5-sonnet";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_ANALYST_TIMEOUT_MS: u64 = 50_000;
const DEFAULT_SQLITE_PATH: &str = "analyst-chat.db";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Snowflake account access
#[derive(Clone)]
pub struct SnowflakeConfig {
    pub account_url: String,
    pub token: String,
    pub token_type: String,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub role: Option<String>,
}

impl fmt::Debug for SnowflakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeConfig")
            .field("account_url", &self.account_url)
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalystConfig {
    pub semantic_model_file: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryConfig {
    pub model: String,
    pub guardrails: bool,
}

/// Where generated SQL runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarehouseBackend {
    Snowflake,
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub snowflake: SnowflakeConfig,
    pub analyst: AnalystConfig,
    pub summary: SummaryConfig,
    pub warehouse: WarehouseBackend,
    pub history_window: HistoryWindow,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let snowflake = SnowflakeConfig {
            account_url: required("SNOWFLAKE_ACCOUNT_URL")?,
            token: required("SNOWFLAKE_TOKEN")?,
            token_type: get("SNOWFLAKE_TOKEN_TYPE").unwrap_or_else(|| "OAUTH".to_string()),
            warehouse: get("SNOWFLAKE_WAREHOUSE"),
            database: get("SNOWFLAKE_DATABASE"),
            schema: get("SNOWFLAKE_SCHEMA"),
            role: get("SNOWFLAKE_ROLE"),
        };

        let analyst = AnalystConfig {
            semantic_model_file: get("SEMANTIC_MODEL_FILE")
                .unwrap_or_else(|| DEFAULT_SEMANTIC_MODEL.to_string()),
            timeout: Duration::from_millis(parse_or(
                "ANALYST_TIMEOUT_MS",
                get("ANALYST_TIMEOUT_MS"),
                DEFAULT_ANALYST_TIMEOUT_MS,
            )?),
        };

        let summary = SummaryConfig {
            model: get("SUMMARY_MODEL").unwrap_or_else(|| DEFAULT_SUMMARY_MODEL.to_string()),
            guardrails: parse_bool("SUMMARY_GUARDRAILS", get("SUMMARY_GUARDRAILS"), true)?,
        };

        let warehouse = match get("WAREHOUSE_BACKEND").as_deref().map(str::to_ascii_lowercase) {
            None => WarehouseBackend::Snowflake,
            Some(backend) if backend == "snowflake" => WarehouseBackend::Snowflake,
            Some(backend) if backend == "sqlite" => WarehouseBackend::Sqlite {
                path: PathBuf::from(
                    get("SQLITE_PATH").unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
                ),
            },
            Some(backend) => {
                return Err(ConfigError::Invalid {
                    name: "WAREHOUSE_BACKEND",
                    value: backend,
                })
            }
        };

        let history_window = match get("HISTORY_WINDOW") {
            None => HistoryWindow::Unbounded,
            Some(v) => HistoryWindow::LastMessages(
                parse_or("HISTORY_WINDOW", Some(v), NonZeroUsize::MIN)?.get(),
            ),
        };

        Ok(Self {
            port: parse_or("ANALYST_CHAT_PORT", get("ANALYST_CHAT_PORT"), DEFAULT_PORT)?,
            snowflake,
            analyst,
            summary,
            warehouse,
            history_window,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: v }),
    }
}

fn parse_bool(name: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value: v }),
        },
    }
}
