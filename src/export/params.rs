use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::{ExportError, Result};
use crate::storage::StorageKey;

static NAME_PREFIX_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("name prefix regex is valid"));

#[derive(Debug)]
pub struct ExportParameters {
    storage_uri: String,
    access_key: StorageKey,
    name_prefix: String,
    compress: bool,
}

impl ExportParameters {
    pub fn new(
        storage_uri: impl Into<String>,
        access_key: StorageKey,
        name_prefix: impl Into<String>,
        compress: bool,
    ) -> Result<Self> {
        let storage_uri = storage_uri.into();
        let name_prefix = name_prefix.into();
        validate_storage_uri(&storage_uri)?;
        validate_name_prefix(&name_prefix)?;
        Ok(Self {
            storage_uri: storage_uri.trim_end_matches('/').to_string(),
            access_key,
            name_prefix,
            compress,
        })
    }

    pub fn storage_uri(&self) -> &str {
        &self.storage_uri
    }

    pub fn access_key(&self) -> &StorageKey {
        &self.access_key
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    pub fn compress(&self) -> bool {
        self.compress
    }
}

/// The prefix ends up both in blob names and in local file names, and is
/// written into the command unquoted.
pub fn validate_name_prefix(prefix: &str) -> Result<()> {
    if NAME_PREFIX_PATTERN.is_match(prefix) {
        Ok(())
    } else {
        Err(ExportError::Config(format!(
            "name prefix '{}' must start with a letter or digit and contain only letters, digits, '.', '_' or '-'",
            prefix
        )))
    }
}

pub fn validate_storage_uri(uri: &str) -> Result<()> {
    let parsed = Url::parse(uri)
        .map_err(|e| ExportError::Config(format!("invalid storage URI '{}': {}", uri, e)))?;

    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(ExportError::Config(format!(
            "storage URI '{}' must use https",
            uri
        )));
    }
    if parsed.host_str().is_none() || parsed.path().trim_matches('/').is_empty() {
        return Err(ExportError::Config(format!(
            "storage URI '{}' must name a container",
            uri
        )));
    }
    if parsed.query().is_some() || uri.contains(';') || uri.contains('"') {
        return Err(ExportError::Config(format!(
            "storage URI '{}' must not carry credentials; pass the key separately",
            uri
        )));
    }
    Ok(())
}
