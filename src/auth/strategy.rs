use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::credential::{AccessToken, AuthMode};
use crate::error::{ExportError, Result};

/// One way of obtaining a bearer token for a query-service endpoint.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn mode(&self) -> AuthMode;

    async fn acquire_token(&self, resource: &str) -> Result<AccessToken>;
}

/// A pre-issued bearer token, e.g. from `KQLGET_ACCESS_TOKEN`.
pub struct StaticTokenStrategy {
    token: String,
}

impl StaticTokenStrategy {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for StaticTokenStrategy {
    fn mode(&self) -> AuthMode {
        AuthMode::StaticToken
    }

    async fn acquire_token(&self, _resource: &str) -> Result<AccessToken> {
        if self.token.trim().is_empty() {
            return Err(ExportError::auth(self.mode(), "access token is empty"));
        }
        Ok(AccessToken::new(self.token.clone()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzCliToken {
    access_token: String,
}

/// Reuses the credential cached by a prior `az login`.
pub struct AzCliStrategy {
    program: String,
}

impl AzCliStrategy {
    pub fn new() -> Self {
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        Self {
            program: program.to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl Default for AzCliStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthStrategy for AzCliStrategy {
    fn mode(&self) -> AuthMode {
        AuthMode::AzCli
    }

    async fn acquire_token(&self, resource: &str) -> Result<AccessToken> {
        debug!(program = %self.program, %resource, "Requesting token from Azure CLI");
        let output = Command::new(&self.program)
            .args([
                "account",
                "get-access-token",
                "--resource",
                resource,
                "--output",
                "json",
            ])
            .output()
            .await
            .map_err(|e| {
                ExportError::auth(
                    self.mode(),
                    format!("could not run '{}': {}", self.program, e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::auth(self.mode(), stderr.trim().to_string()));
        }

        let token: AzCliToken = serde_json::from_slice(&output.stdout).map_err(|e| {
            ExportError::auth(self.mode(), format!("unexpected az output: {}", e))
        })?;
        Ok(AccessToken::new(token.access_token))
    }
}
