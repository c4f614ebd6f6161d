use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::result::{QueryResult, RestResponse};
use super::QueryService;
use crate::auth::Credential;
use crate::error::{ExportError, Result};

pub const PROBE_QUERY: &str = "print('hi')";

const APP_NAME: &str = "kqlget";
const MAX_DIAGNOSTIC_LEN: usize = 1024;

#[derive(Debug, Clone, Copy)]
enum Plane {
    Query,
    Mgmt,
}

impl Plane {
    fn path(self) -> &'static str {
        match self {
            Plane::Query => "v1/rest/query",
            Plane::Mgmt => "v1/rest/mgmt",
        }
    }
}

/// Kusto v1 REST client.
#[derive(Clone)]
pub struct KustoClient {
    http: reqwest::Client,
}

impl KustoClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn post(&self, credential: &Credential, plane: Plane, csl: &str) -> Result<QueryResult> {
        let url = format!(
            "{}/{}",
            credential.endpoint().trim_end_matches('/'),
            plane.path()
        );
        let request_id = format!("{};{}", APP_NAME, Uuid::new_v4());
        debug!(%url, %request_id, "Posting to query service");

        let response = self
            .http
            .post(&url)
            .bearer_auth(credential.token().secret())
            .header("x-ms-client-request-id", &request_id)
            .header("x-ms-app", APP_NAME)
            .json(&json!({ "db": credential.database(), "csl": csl }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ExportError::auth(
                credential.mode(),
                format!("HTTP {}: {}", status.as_u16(), service_diagnostic(&body)),
            ));
        }
        if !status.is_success() {
            return Err(ExportError::Service(format!(
                "HTTP {} (request {}): {}",
                status.as_u16(),
                request_id,
                service_diagnostic(&body)
            )));
        }

        // No tables means no rows.
        let payload: RestResponse = serde_json::from_str(&body)?;
        Ok(payload.into_primary().unwrap_or_default())
    }
}

#[async_trait]
impl QueryService for KustoClient {
    async fn probe(&self, credential: &Credential) -> Result<()> {
        self.post(credential, Plane::Query, PROBE_QUERY).await?;
        Ok(())
    }

    async fn execute_mgmt(&self, credential: &Credential, command: &str) -> Result<QueryResult> {
        self.post(credential, Plane::Mgmt, command).await
    }
}

/// Pulls the human-readable message out of a Kusto error body, falling back to
/// the raw text.
pub(crate) fn service_diagnostic(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        let error = v.get("error")?;
        error
            .get("@message")
            .or_else(|| error.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    let mut text = message.unwrap_or_else(|| body.trim().to_string());
    if text.len() > MAX_DIAGNOSTIC_LEN {
        let mut cut = MAX_DIAGNOSTIC_LEN;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}
