pub mod auth;
pub mod error;
pub mod export;
pub mod kusto;
pub mod logging;
pub mod split;
pub mod storage;

pub use auth::{
    endpoint_uri, AccessToken, AuthMode, AuthStrategy, AzCliStrategy, Credential,
    CredentialResolver, DeviceCodeConfig, DeviceCodeStrategy, StaticTokenStrategy,
};
pub use error::{ExportError, Result};
pub use export::{
    extract_object_path, render, ExportCommand, ExportJob, ExportOrchestrator, ExportOutcome,
    ExportParameters, ExportRequest, ExportResult, Stage, SIZE_LIMIT_BYTES,
};
pub use kusto::{ColumnInfo, KustoClient, MockQueryService, QueryResult, QueryService};
pub use split::{split_csv, SplitStats};
pub use storage::{container_uri, BlobFetcher, StorageKey};
