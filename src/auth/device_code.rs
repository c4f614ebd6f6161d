//! OAuth2 device-code flow against Microsoft Entra ID.
//!
//! Used as the interactive fallback when no cached CLI credential works: the
//! user is shown a code and a URL, and the strategy polls the token endpoint
//! until the sign-in completes, is declined, or the code expires.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::credential::{AccessToken, AuthMode};
use super::strategy::AuthStrategy;
use crate::error::{ExportError, Result};

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
pub const DEFAULT_TENANT: &str = "organizations";
/// Public client application registered for Kusto tooling.
pub const KUSTO_CLIENT_APP_ID: &str = "db662dc1-0cfe-4e1c-a843-19a68e65be58";

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const SLOW_DOWN_INCREMENT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct DeviceCodeConfig {
    pub authority: String,
    pub tenant: String,
    pub client_id: String,
}

impl Default for DeviceCodeConfig {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            tenant: DEFAULT_TENANT.to_string(),
            client_id: KUSTO_CLIENT_APP_ID.to_string(),
        }
    }
}

impl DeviceCodeConfig {
    fn endpoint(&self, leaf: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/{}",
            self.authority.trim_end_matches('/'),
            self.tenant,
            leaf
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodePrompt {
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    #[serde(flatten)]
    prompt: DeviceCodePrompt,
    expires_in: u64,
    #[serde(default)]
    interval: Option<u64>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

type PromptSink = Arc<dyn Fn(&DeviceCodePrompt) + Send + Sync>;

fn print_prompt(prompt: &DeviceCodePrompt) {
    match &prompt.message {
        Some(message) => eprintln!("{}", message),
        None => eprintln!(
            "To sign in, open {} and enter the code {}",
            prompt.verification_uri, prompt.user_code
        ),
    }
}

pub struct DeviceCodeStrategy {
    http: reqwest::Client,
    config: DeviceCodeConfig,
    prompt: PromptSink,
}

impl DeviceCodeStrategy {
    pub fn new(http: reqwest::Client, config: DeviceCodeConfig) -> Self {
        Self {
            http,
            config,
            prompt: Arc::new(print_prompt),
        }
    }

    pub fn with_prompt(
        mut self,
        prompt: impl Fn(&DeviceCodePrompt) + Send + Sync + 'static,
    ) -> Self {
        self.prompt = Arc::new(prompt);
        self
    }

    async fn request_device_code(&self, scope: &str) -> Result<DeviceCodeResponse> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("scope", scope),
        ];
        let response = self
            .http
            .post(self.config.endpoint("devicecode"))
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                ExportError::auth(self.mode(), format!("device code request failed: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ExportError::auth(
                self.mode(),
                format!(
                    "device code request rejected (HTTP {}): {}",
                    status.as_u16(),
                    describe_error(&body)
                ),
            ));
        }
        serde_json::from_str(&body).map_err(|e| {
            ExportError::auth(self.mode(), format!("invalid device code response: {}", e))
        })
    }

    async fn poll_token(&self, device: &DeviceCodeResponse) -> Result<AccessToken> {
        let deadline = Instant::now() + Duration::from_secs(device.expires_in);
        let mut interval = device.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        let params = [
            ("grant_type", DEVICE_CODE_GRANT),
            ("client_id", self.config.client_id.as_str()),
            ("device_code", device.device_code.as_str()),
        ];

        loop {
            if Instant::now() >= deadline {
                return Err(ExportError::auth(
                    self.mode(),
                    "device code expired before sign-in completed",
                ));
            }

            let response = self
                .http
                .post(self.config.endpoint("token"))
                .form(&params)
                .send()
                .await
                .map_err(|e| {
                    ExportError::auth(self.mode(), format!("token request failed: {}", e))
                })?;

            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if status.is_success() {
                let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
                    ExportError::auth(self.mode(), format!("invalid token response: {}", e))
                })?;
                return Ok(AccessToken::new(token.access_token));
            }

            let error: Option<TokenErrorResponse> = serde_json::from_str(&body).ok();
            match error.as_ref().map(|e| e.error.as_str()) {
                Some("authorization_pending") => {}
                Some("slow_down") => interval += SLOW_DOWN_INCREMENT_SECS,
                _ => {
                    return Err(ExportError::auth(
                        self.mode(),
                        format!(
                            "sign-in failed (HTTP {}): {}",
                            status.as_u16(),
                            describe_error(&body)
                        ),
                    ));
                }
            }

            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }
}

fn describe_error(body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(TokenErrorResponse {
            error,
            error_description: Some(description),
        }) => format!("{}: {}", error, description),
        Ok(TokenErrorResponse { error, .. }) => error,
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl AuthStrategy for DeviceCodeStrategy {
    fn mode(&self) -> AuthMode {
        AuthMode::DeviceCode
    }

    async fn acquire_token(&self, resource: &str) -> Result<AccessToken> {
        let scope = format!("{}/.default", resource.trim_end_matches('/'));
        let device = self.request_device_code(&scope).await?;

        warn!(
            verification_uri = %device.prompt.verification_uri,
            "Interactive sign-in required"
        );
        (self.prompt)(&device.prompt);

        let token = self.poll_token(&device).await?;
        info!("Device code sign-in completed");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> DeviceCodeConfig {
        DeviceCodeConfig {
            authority: server.uri(),
            tenant: "contoso".to_string(),
            client_id: "client-123".to_string(),
        }
    }

    async fn mount_device_code(server: &MockServer, expires_in: u64) {
        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/devicecode"))
            .and(body_string_contains("client_id=client-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "device_code": "dev-code",
                "user_code": "ABCD-EFGH",
                "verification_uri": "https://microsoft.com/devicelogin",
                "expires_in": expires_in,
                "interval": 0,
                "message": "Enter ABCD-EFGH"
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_default_config_targets_public_cloud() {
        let config = DeviceCodeConfig::default();
        assert_eq!(
            config.endpoint("token"),
            "https://login.microsoftonline.com/organizations/oauth2/v2.0/token"
        );
    }

    #[tokio::test]
    async fn test_device_code_flow_polls_until_token() {
        let server = MockServer::start().await;
        mount_device_code(&server, 900).await;

        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "authorization_pending"
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/token"))
            .and(body_string_contains("device_code=dev-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "device-token",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let shown = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&shown);
        let strategy = DeviceCodeStrategy::new(reqwest::Client::new(), config_for(&server))
            .with_prompt(move |p| sink.lock().unwrap().push(p.user_code.clone()));

        let token = strategy
            .acquire_token("https://help.kusto.windows.net")
            .await
            .unwrap();

        assert_eq!(token.secret(), "device-token");
        assert_eq!(*shown.lock().unwrap(), vec!["ABCD-EFGH".to_string()]);
    }

    #[tokio::test]
    async fn test_declined_sign_in_is_auth_error() {
        let server = MockServer::start().await;
        mount_device_code(&server, 900).await;

        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "authorization_declined",
                "error_description": "user said no"
            })))
            .mount(&server)
            .await;

        let strategy = DeviceCodeStrategy::new(reqwest::Client::new(), config_for(&server))
            .with_prompt(|_| {});
        let err = strategy
            .acquire_token("https://help.kusto.windows.net")
            .await
            .unwrap_err();

        assert!(err.is_auth());
        assert!(err.to_string().contains("authorization_declined"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_down_backs_off_then_succeeds() {
        let server = MockServer::start().await;
        mount_device_code(&server, 900).await;

        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "slow_down"
            })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "slow-token"
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let strategy = DeviceCodeStrategy::new(reqwest::Client::new(), config_for(&server))
            .with_prompt(|_| {});
        let started = Instant::now();
        let token = strategy
            .acquire_token("https://help.kusto.windows.net")
            .await
            .unwrap();

        assert_eq!(token.secret(), "slow-token");
        assert!(started.elapsed() >= Duration::from_secs(SLOW_DOWN_INCREMENT_SECS));
    }

    #[tokio::test]
    async fn test_expired_code_stops_polling() {
        let server = MockServer::start().await;
        mount_device_code(&server, 0).await;

        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "authorization_pending"
            })))
            .mount(&server)
            .await;

        let strategy = DeviceCodeStrategy::new(reqwest::Client::new(), config_for(&server))
            .with_prompt(|_| {});
        let err = strategy
            .acquire_token("https://help.kusto.windows.net")
            .await
            .unwrap_err();

        assert!(err.is_auth());
        assert!(err.to_string().contains("expired"));
    }
}
