//! Salesforce REST access.
//!
//! [`Connection`] is an authenticated handle to one org's REST API, and
//! [`MetadataLoader`] uses it to build a [`FlowInfo`](crate::FlowInfo) for a
//! flow, falling back to a saved Flow Builder page ([`PageSnapshot`]) when
//! the API is unavailable.
//!
//! # Example
//!
//! ```no_run
//! use flowscan::salesforce::{Connection, MetadataLoader};
//! use flowscan::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let conn = Connection::get_session("acme.my.salesforce.com", Some("00D...".into()), &config)?;
//!     let flow = MetadataLoader::new(&conn)
//!         .load(Some("300000000000001AAA"), Some("301000000000001AAA"))
//!         .await?;
//!     println!("{} ({})", flow.name, flow.status);
//!     Ok(())
//! }
//! ```

mod loader;
mod page;

pub use loader::MetadataLoader;
pub use page::PageSnapshot;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum SalesforceError {
    #[error("no session id; pass --session-id or set SF_ACCESS_TOKEN")]
    MissingSession,

    #[error("no instance host; pass --host or set instance_url in the config")]
    MissingHost,

    #[error("missing flow identifiers (both a flow definition id and a flow id are required)")]
    MissingFlowIds,

    #[error("invalid record id: {0:?}")]
    InvalidId(String),

    #[error("Salesforce API returned {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// An authenticated REST handle for one org.
pub struct Connection {
    client: reqwest::Client,
    instance_url: String,
    session_id: String,
    api_version: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    records: Vec<Value>,
}

impl Connection {
    pub fn new(
        instance_url: &str,
        session_id: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SalesforceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flowscan/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            instance_url: normalize_instance_url(instance_url),
            session_id: session_id.into(),
            api_version: api_version.into(),
        })
    }

    /// Resolves a session for `host` using the configured API version and
    /// timeout.
    pub fn get_session(
        host: &str,
        session_id: Option<String>,
        config: &Config,
    ) -> Result<Self, SalesforceError> {
        if host.trim().is_empty() {
            return Err(SalesforceError::MissingHost);
        }
        let session_id = session_id
            .filter(|s| !s.trim().is_empty())
            .ok_or(SalesforceError::MissingSession)?;

        Self::new(
            host,
            session_id,
            config.api_version.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Authenticated GET of `path` (relative to the instance), decoded as JSON.
    pub async fn rest(&self, path: &str) -> Result<Value, SalesforceError> {
        self.get(path, &[]).await
    }

    /// Runs a Tooling API SOQL query and returns its records.
    pub async fn tooling_query(&self, soql: &str) -> Result<Vec<Value>, SalesforceError> {
        let path = format!("/services/data/v{}/tooling/query/", self.api_version);
        let body = self.get(&path, &[("q", soql)]).await?;
        let response: QueryResponse =
            serde_json::from_value(body).map_err(|e| SalesforceError::Decode(e.to_string()))?;
        Ok(response.records)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, SalesforceError> {
        let url = format!("{}{}", self.instance_url, path);
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .bearer_auth(&self.session_id)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SalesforceError::Api {
                status,
                message: api_error_message(&text),
            });
        }

        response
            .json()
            .await
            .map_err(|e| SalesforceError::Decode(e.to_string()))
    }
}

/// Salesforce reports failures as `[{"message": ..., "errorCode": ...}]`.
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<Vec<ApiErrorBody>>(body) {
        Ok(errors) if !errors.is_empty() => errors
            .into_iter()
            .map(|e| match (e.error_code, e.message) {
                (Some(code), Some(msg)) => format!("{}: {}", code, msg),
                (None, Some(msg)) => msg,
                (Some(code), None) => code,
                (None, None) => "unknown error".to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ if body.trim().is_empty() => "empty response".to_string(),
        _ => body.trim().to_string(),
    }
}

/// Accepts a bare host, a full URL, or a Lightning host and returns the
/// REST base URL without a trailing slash.
pub fn normalize_instance_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let url = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    url.replace(".lightning.force.com", ".my.salesforce.com")
}

/// Record ids are interpolated into SOQL and URL paths, so only plain 15 or
/// 18 character alphanumeric ids are accepted.
pub fn validate_record_id(id: &str) -> Result<&str, SalesforceError> {
    let id = id.trim();
    let valid_len = id.len() == 15 || id.len() == 18;
    if valid_len && id.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(id)
    } else {
        Err(SalesforceError::InvalidId(id.to_string()))
    }
}
