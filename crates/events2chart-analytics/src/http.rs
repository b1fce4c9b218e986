//! HTTP client for a hosted analytics backend.
//!
//! Wire contract:
//! - `POST {base}/projects/{project}/events/{event_type}` with the write
//!   key submits one event.
//! - `POST {base}/projects/{project}/queries/{function}` with the read key
//!   runs an aggregate; the response body is
//!   `{"result": [{"group": "...", "value": 1.0}, ...]}`.
//!
//! Transport failures, timeouts and 5xx map to `BackendError::Transient`;
//! 4xx maps to `BackendError::Rejected`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use events2chart_core::GroupValue;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{BackendError, Result};
use crate::{AggregateQuery, AnalyticsBackend};

const AUTH_HEADER: &str = "authorization";

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct HttpBackendSettings {
    pub base_url: String,
    pub project_id: String,
    pub write_key: String,
    pub read_key: String,
    pub timeout: Duration,
}

pub struct HttpAnalyticsClient {
    http: reqwest::Client,
    settings: HttpBackendSettings,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: Vec<QueryGroup>,
}

#[derive(Debug, Deserialize)]
struct QueryGroup {
    group: String,
    value: f64,
}

impl HttpAnalyticsClient {
    pub fn new(settings: HttpBackendSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| BackendError::Transient(format!("failed to build http client: {e}")))?;
        Ok(Self { http, settings })
    }

    fn events_url(&self, event_type: &str) -> String {
        format!(
            "{}/projects/{}/events/{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.project_id,
            event_type
        )
    }

    fn query_url(&self, function: &str) -> String {
        format!(
            "{}/projects/{}/queries/{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.project_id,
            function
        )
    }
}

fn classify_status(status: StatusCode, body: String) -> BackendError {
    if status.is_client_error() {
        BackendError::Rejected(format!("{status}: {body}"))
    } else {
        BackendError::Transient(format!("{status}: {body}"))
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    // reqwest surfaces timeouts and connection failures here; both are
    // retryable by the normal claim cycle.
    BackendError::Transient(err.to_string())
}

#[async_trait]
impl AnalyticsBackend for HttpAnalyticsClient {
    async fn record_event(&self, event_type: &str, payload: &serde_json::Value) -> Result<()> {
        let response = self
            .http
            .post(self.events_url(event_type))
            .header(AUTH_HEADER, &self.settings.write_key)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }
        debug!(event_type, "event recorded");
        Ok(())
    }

    async fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<GroupValue>> {
        let body = serde_json::json!({
            "event_collection": query.event_type,
            "target_property": query.target_field,
            "group_by": query.group_by,
            "timeframe": {
                "start": query.window.start.to_rfc3339_opts(SecondsFormat::Millis, true),
                "end": query.window.end.to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        });

        let response = self
            .http
            .post(self.query_url(query.function.as_str()))
            .header(AUTH_HEADER, &self.settings.read_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Rejected(format!("malformed query response: {e}")))?;

        Ok(parsed
            .result
            .into_iter()
            .map(|g| GroupValue::new(g.group, g.value))
            .collect())
    }
}
