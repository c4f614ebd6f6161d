use chrono::Utc;
use futures::StreamExt;
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use super::key::StorageKey;
use super::shared_key::{authorization, string_to_sign, STORAGE_API_VERSION};
use crate::error::{ExportError, Result};

const KEY_AUTH_MODE: &str = "storage-key";

/// Downloads single blobs to local files.
#[derive(Clone)]
pub struct BlobFetcher {
    http: reqwest::Client,
    account: Option<String>,
}

impl BlobFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            account: None,
        }
    }

    /// Overrides the account name used for SharedKey signing, which otherwise
    /// comes from the first label of the blob host.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Streams `object_url` into `local_path` and returns the number of bytes
    /// written. Missing parent directories are created. The content lands in a
    /// temporary file next to the destination and is renamed over it only
    /// once the whole body has arrived, so a failed transfer never leaves a
    /// truncated destination behind.
    pub async fn fetch(
        &self,
        object_url: &str,
        key: &StorageKey,
        local_path: &Path,
    ) -> Result<u64> {
        let mut url = Url::parse(object_url).map_err(|e| {
            ExportError::Config(format!("invalid object URL '{}': {}", object_url, e))
        })?;

        let request = match key {
            StorageKey::Sas(_) => {
                let query = match url.query() {
                    Some(existing) if !existing.is_empty() => {
                        format!("{}&{}", existing, key.secret())
                    }
                    _ => key.secret().to_string(),
                };
                url.set_query(Some(&query));
                self.http.get(url.clone())
            }
            StorageKey::AccountKey(_) => {
                let account = self.account_for(&url)?;
                let mut ms_headers = BTreeMap::new();
                ms_headers.insert(
                    "x-ms-date".to_string(),
                    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
                );
                ms_headers.insert("x-ms-version".to_string(), STORAGE_API_VERSION.to_string());

                let signed = string_to_sign("GET", &url, &account, &ms_headers);
                let auth = authorization(&account, key.secret(), &signed)?;

                let mut request = self.http.get(url.clone()).header("Authorization", auth);
                for (name, value) in &ms_headers {
                    request = request.header(name.as_str(), value.as_str());
                }
                request
            }
        };

        debug!(
            host = url.host_str().unwrap_or(""),
            path = url.path(),
            "Opening blob stream"
        );
        let response = request.send().await.map_err(io_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ExportError::auth(
                KEY_AUTH_MODE,
                format!("HTTP {}: {}", status.as_u16(), storage_error_code(&response)),
            ));
        }
        if !status.is_success() {
            return Err(ExportError::Storage {
                status: status.as_u16(),
                message: storage_error_code(&response),
            });
        }

        let dir = parent_dir(local_path);
        tokio::fs::create_dir_all(dir).await?;

        let staging = NamedTempFile::new_in(dir)?;
        let mut file = tokio::fs::File::from_std(staging.reopen()?);
        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(io_error)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        staging
            .persist(local_path)
            .map_err(|e| ExportError::Io(e.error))?;

        info!(dest = %local_path.display(), bytes = written, "Blob downloaded");
        Ok(written)
    }

    fn account_for(&self, url: &Url) -> Result<String> {
        if let Some(account) = &self.account {
            return Ok(account.clone());
        }
        url.host_str()
            .and_then(|host| host.split('.').next())
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ExportError::Config(format!("cannot derive storage account from '{}'", url))
            })
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn io_error(e: reqwest::Error) -> ExportError {
    ExportError::Io(std::io::Error::other(e))
}

fn storage_error_code(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| {
            response
                .status()
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        })
}
