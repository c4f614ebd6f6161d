use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::orchestrator::ExportOrchestrator;
use super::params::ExportParameters;
use super::template::render;
use crate::auth::{endpoint_uri, CredentialResolver};
use crate::error::{ExportError, Result};
use crate::kusto::QueryService;
use crate::storage::BlobFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authenticate,
    Submit,
    Download,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Authenticate => "authenticate",
            Stage::Submit => "submit",
            Stage::Download => "download",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct ExportRequest {
    pub cluster: String,
    /// Full endpoint URI; derived from `cluster` when absent.
    pub endpoint: Option<String>,
    pub database: String,
    /// Where the query text came from, for logs.
    pub query_source: String,
    pub query: String,
    pub params: ExportParameters,
    pub destination: PathBuf,
}

impl ExportRequest {
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| endpoint_uri(&self.cluster))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub object_path: String,
    pub destination: PathBuf,
    pub bytes_written: u64,
}

/// authenticate -> render -> submit -> extract -> download, strictly in order.
pub struct ExportJob {
    resolver: CredentialResolver,
    orchestrator: ExportOrchestrator,
    fetcher: BlobFetcher,
    stage_timeout: Option<Duration>,
}

impl ExportJob {
    pub fn new(
        resolver: CredentialResolver,
        service: Arc<dyn QueryService>,
        fetcher: BlobFetcher,
    ) -> Self {
        Self {
            resolver,
            orchestrator: ExportOrchestrator::new(service),
            fetcher,
            stage_timeout: None,
        }
    }

    /// Bounds every blocking stage. An expired stage is abandoned and reported
    /// as [`ExportError::Cancelled`].
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    pub async fn run(&self, request: &ExportRequest) -> Result<ExportOutcome> {
        let storage_uri = request.params.storage_uri();
        let endpoint = request.endpoint();

        let credential = self
            .stage(request, Stage::Authenticate, async {
                self.resolver
                    .resolve_endpoint(&endpoint, &request.database)
                    .await
            })
            .await?;

        let command = render(&request.query, &request.params);
        info!(
            query = %request.query_source,
            %storage_uri,
            compress = request.params.compress(),
            "Exporting query"
        );

        let exported = self
            .stage(request, Stage::Submit, async {
                self.orchestrator.export(&credential, &command).await
            })
            .await?;
        drop(credential);
        info!(
            query = %request.query_source,
            object = %exported.object_path,
            "Exported query"
        );

        info!(
            object = %exported.object_path,
            dest = %request.destination.display(),
            "Downloading export"
        );
        let bytes_written = self
            .stage(request, Stage::Download, async {
                self.fetcher
                    .fetch(
                        &exported.object_path,
                        request.params.access_key(),
                        &request.destination,
                    )
                    .await
            })
            .await?;

        Ok(ExportOutcome {
            object_path: exported.object_path,
            destination: request.destination.clone(),
            bytes_written,
        })
    }

    async fn stage<T>(
        &self,
        request: &ExportRequest,
        stage: Stage,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let result = match self.stage_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(ExportError::Cancelled { stage }),
            },
            None => fut.await,
        };

        result.inspect_err(|e| {
            error!(
                %stage,
                kind = e.kind(),
                query = %request.query_source,
                storage_uri = %request.params.storage_uri(),
                error = %e,
                "Stage failed"
            )
        })
    }
}
