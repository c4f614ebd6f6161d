use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::error::{ExportError, Result};

/// Credential for the blob container: either the storage account key or a
/// shared access signature.
pub enum StorageKey {
    AccountKey(SecretString),
    Sas(SecretString),
}

impl StorageKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ExportError::Config("storage key is empty".to_string()));
        }
        if raw.contains('"') {
            return Err(ExportError::Config(
                "storage key must not contain '\"'".to_string(),
            ));
        }

        if let Some(sas) = raw.strip_prefix('?') {
            return Ok(StorageKey::Sas(SecretString::new(sas.to_string())));
        }
        if raw.split('&').any(|part| part.starts_with("sig=")) {
            return Ok(StorageKey::Sas(SecretString::new(raw.to_string())));
        }
        Ok(StorageKey::AccountKey(SecretString::new(raw.to_string())))
    }

    pub fn is_sas(&self) -> bool {
        matches!(self, StorageKey::Sas(_))
    }

    /// Text appended to a container URI inside a Kusto storage connection string.
    pub(crate) fn connection_suffix(&self) -> String {
        match self {
            StorageKey::AccountKey(key) => format!(";{}", key.expose_secret()),
            StorageKey::Sas(sas) => format!("?{}", sas.expose_secret()),
        }
    }

    pub(crate) fn redacted_suffix(&self) -> &'static str {
        match self {
            StorageKey::AccountKey(_) => ";****",
            StorageKey::Sas(_) => "?****",
        }
    }

    pub(crate) fn secret(&self) -> &str {
        match self {
            StorageKey::AccountKey(s) | StorageKey::Sas(s) => s.expose_secret(),
        }
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKey::AccountKey(_) => f.write_str("AccountKey(****)"),
            StorageKey::Sas(_) => f.write_str("Sas(****)"),
        }
    }
}
