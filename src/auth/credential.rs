use secrecy::{ExposeSecret, SecretString};
use std::fmt;

pub const SERVICE_DOMAIN: &str = "kusto.windows.net";

pub fn endpoint_uri(cluster: &str) -> String {
    format!("https://{}.{}", cluster, SERVICE_DOMAIN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMode {
    StaticToken,
    AzCli,
    DeviceCode,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthMode::StaticToken => "static-token",
            AuthMode::AzCli => "az-cli",
            AuthMode::DeviceCode => "device-code",
        };
        f.write_str(name)
    }
}

pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::new(token.into()))
    }

    pub fn secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(****)")
    }
}

/// An authenticated session against one query-service endpoint and catalog.
///
/// Only [`CredentialResolver`](super::CredentialResolver) hands out verified
/// credentials; a credential built with [`Credential::unverified`] is rejected
/// by the export orchestrator until a probe has succeeded with it.
#[derive(Debug)]
pub struct Credential {
    endpoint: String,
    database: String,
    mode: AuthMode,
    token: AccessToken,
    verified: bool,
}

impl Credential {
    pub fn unverified(
        endpoint: impl Into<String>,
        database: impl Into<String>,
        mode: AuthMode,
        token: AccessToken,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: database.into(),
            mode,
            token,
            verified: false,
        }
    }

    pub(crate) fn mark_verified(mut self) -> Self {
        self.verified = true;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }
}
