mod client;
mod mock;
mod result;

use async_trait::async_trait;

use crate::auth::Credential;
use crate::error::Result;

pub use client::{KustoClient, PROBE_QUERY};
pub use mock::MockQueryService;
pub use result::{ColumnInfo, QueryResult, RestResponse};

#[async_trait]
pub trait QueryService: Send + Sync {
    /// Runs a no-op query so that a bad credential fails now rather than on
    /// the first real command.
    async fn probe(&self, credential: &Credential) -> Result<()>;

    async fn execute_mgmt(&self, credential: &Credential, command: &str) -> Result<QueryResult>;
}
