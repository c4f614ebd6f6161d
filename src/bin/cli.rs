use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use kqlget::auth::{DEFAULT_AUTHORITY, DEFAULT_TENANT, KUSTO_CLIENT_APP_ID};
use kqlget::logging::init_tracing;
use kqlget::{
    container_uri, AzCliStrategy, BlobFetcher, CredentialResolver, DeviceCodeConfig,
    DeviceCodeStrategy, ExportError, ExportJob, ExportParameters, ExportRequest, KustoClient,
    QueryService, Result, StaticTokenStrategy, StorageKey,
};

/// Run QUERY_PATH on CLUSTER/DATABASE, export to blob ACCOUNT/CONTAINER/FOLDER
/// and download to local file DEST.
#[derive(Parser, Debug)]
#[command(name = "kqlget", version, about, long_about = None)]
struct Cli {
    /// Short cluster name, e.g. `help` for https://help.kusto.windows.net
    cluster: String,
    database: String,
    /// File holding the KQL query
    query_path: PathBuf,
    /// Storage account name
    account: String,
    container: String,
    /// Storage account key or SAS token
    key: String,
    folder: String,
    /// Name prefix for exported blobs
    prefix: String,
    /// Local file to download the export to
    dest: PathBuf,

    /// Compress the file with gzip
    #[arg(long, overrides_with = "no_gzip")]
    gzip: bool,

    #[arg(long = "no-gzip", overrides_with = "gzip", hide = true)]
    no_gzip: bool,

    /// Full query-service endpoint, overriding the one derived from CLUSTER
    #[arg(long, env = "KQLGET_ENDPOINT")]
    endpoint: Option<String>,

    /// Pre-issued bearer token, tried before Azure CLI and device-code sign-in
    #[arg(long, env = "KQLGET_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[arg(long, env = "KQLGET_TENANT", default_value = DEFAULT_TENANT)]
    tenant: String,

    #[arg(long, env = "KQLGET_AUTHORITY", default_value = DEFAULT_AUTHORITY)]
    authority: String,

    #[arg(long, env = "KQLGET_CLIENT_ID", default_value = KUSTO_CLIENT_APP_ID)]
    client_id: String,

    /// Abort any single stage that runs longer than this many seconds
    #[arg(long, env = "KQLGET_STAGE_TIMEOUT")]
    stage_timeout: Option<u64>,
}

async fn run(cli: Cli) -> Result<()> {
    let query = tokio::fs::read_to_string(&cli.query_path).await.map_err(|e| {
        ExportError::Config(format!(
            "cannot read query file {}: {}",
            cli.query_path.display(),
            e
        ))
    })?;

    let storage_uri = container_uri(&cli.account, &cli.container, &cli.folder);
    let params = ExportParameters::new(
        storage_uri,
        StorageKey::parse(&cli.key)?,
        cli.prefix.clone(),
        cli.gzip,
    )?;

    let http = reqwest::Client::new();
    let service: Arc<dyn QueryService> = Arc::new(KustoClient::new(http.clone()));

    let mut resolver = CredentialResolver::new(Arc::clone(&service));
    if let Some(token) = &cli.access_token {
        resolver = resolver.with_strategy(StaticTokenStrategy::new(token.clone()));
    }
    let resolver = resolver.with_strategy(AzCliStrategy::new()).with_strategy(
        DeviceCodeStrategy::new(
            http.clone(),
            DeviceCodeConfig {
                authority: cli.authority.clone(),
                tenant: cli.tenant.clone(),
                client_id: cli.client_id.clone(),
            },
        ),
    );

    let fetcher = BlobFetcher::new(http).with_account(cli.account.clone());
    let mut job = ExportJob::new(resolver, service, fetcher);
    if let Some(secs) = cli.stage_timeout {
        job = job.with_stage_timeout(Duration::from_secs(secs));
    }

    let request = ExportRequest {
        cluster: cli.cluster,
        endpoint: cli.endpoint,
        database: cli.database,
        query_source: cli.query_path.display().to_string(),
        query,
        params,
        destination: cli.dest,
    };

    let outcome = job.run(&request).await?;
    info!(
        object = %outcome.object_path,
        dest = %outcome.destination.display(),
        bytes = outcome.bytes_written,
        "Finished downloading export"
    );
    Ok(())
}

/// Exit code for command-line usage errors, kept apart from the pipeline's
/// error kinds.
const USAGE_EXIT_CODE: i32 = 1;

fn usage_exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        USAGE_EXIT_CODE
    } else {
        0
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(usage_exit_code(&e));
        }
    };

    if let Err(e) = run(cli).await {
        error!(kind = e.kind(), error = %e, "kqlget failed");
        std::process::exit(e.exit_code());
    }
}
