mod credential;
mod device_code;
mod resolver;
mod strategy;

pub use credential::{endpoint_uri, AccessToken, AuthMode, Credential, SERVICE_DOMAIN};
pub use device_code::{
    DeviceCodeConfig, DeviceCodePrompt, DeviceCodeStrategy, DEFAULT_AUTHORITY, DEFAULT_TENANT,
    KUSTO_CLIENT_APP_ID,
};
pub use resolver::CredentialResolver;
pub use strategy::{AuthStrategy, AzCliStrategy, StaticTokenStrategy};
