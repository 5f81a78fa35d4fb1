//! Shared Snowflake REST connection
//!
//! The analyst, completion and SQL statement endpoints all live on the same
//! account host and accept the same bearer token.

use crate::config::SnowflakeConfig;
use reqwest::{Client, RequestBuilder};
use std::fmt;

const TOKEN_TYPE_HEADER: &str = "X-Snowflake-Authorization-Token-Type";

/// Authenticated handle to a Snowflake account's REST API
#[derive(Clone)]
pub struct SnowflakeConnection {
    http: Client,
    account_url: String,
    token: String,
    token_type: String,
}

impl SnowflakeConnection {
    pub fn new(
        account_url: impl Into<String>,
        token: impl Into<String>,
        token_type: impl Into<String>,
    ) -> Self {
        let account_url: String = account_url.into();
        Self {
            http: Client::new(),
            account_url: account_url.trim_end_matches('/').to_string(),
            token: token.into(),
            token_type: token_type.into(),
        }
    }

    pub fn from_config(config: &SnowflakeConfig) -> Self {
        Self::new(&config.account_url, &config.token, &config.token_type)
    }

    /// Absolute URL for an API path such as `/api/v2/statements`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.account_url, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.post(self.url(path)))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.get(self.url(path)))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header(TOKEN_TYPE_HEADER, &self.token_type)
            .header("Accept", "application/json")
    }
}

impl fmt::Debug for SnowflakeConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeConnection")
            .field("account_url", &self.account_url)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}
