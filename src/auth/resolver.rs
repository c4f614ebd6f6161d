use std::sync::Arc;
use tracing::{info, warn};

use super::credential::{endpoint_uri, Credential};
use super::strategy::AuthStrategy;
use crate::error::{ExportError, Result};
use crate::kusto::QueryService;

/// Tries each authentication strategy in order until one yields a token that
/// survives a probe against the target catalog.
pub struct CredentialResolver {
    service: Arc<dyn QueryService>,
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl CredentialResolver {
    pub fn new(service: Arc<dyn QueryService>) -> Self {
        Self {
            service,
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl AuthStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub async fn resolve(&self, cluster: &str, database: &str) -> Result<Credential> {
        self.resolve_endpoint(&endpoint_uri(cluster), database)
            .await
    }

    pub async fn resolve_endpoint(&self, endpoint: &str, database: &str) -> Result<Credential> {
        if self.strategies.is_empty() {
            return Err(ExportError::Config(
                "no authentication strategies configured".to_string(),
            ));
        }

        let mut last_auth_error = None;
        for strategy in &self.strategies {
            let mode = strategy.mode();
            info!(%endpoint, %database, %mode, "Authenticating");

            match self.attempt(strategy.as_ref(), endpoint, database).await {
                Ok(credential) => {
                    info!(%endpoint, %mode, "Authenticated");
                    return Ok(credential);
                }
                Err(e) if e.is_auth() => {
                    warn!(%mode, error = %e, "Authentication mode failed");
                    last_auth_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_auth_error
            .unwrap_or_else(|| ExportError::Config("no authentication strategy ran".to_string())))
    }

    async fn attempt(
        &self,
        strategy: &dyn AuthStrategy,
        endpoint: &str,
        database: &str,
    ) -> Result<Credential> {
        let token = strategy.acquire_token(endpoint).await?;
        let credential = Credential::unverified(endpoint, database, strategy.mode(), token);
        self.service.probe(&credential).await?;
        Ok(credential.mark_verified())
    }
}
