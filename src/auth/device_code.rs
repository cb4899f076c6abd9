//! Device code credential for the Microsoft identity platform.
//!
//! The user signs in on a second device with a short code while this process
//! polls the token endpoint. The resulting token is kept in memory and renewed
//! with its refresh token when it nears expiry.

use crate::auth::token::{AccessToken, CachedToken, OAuthErrorResponse, TokenResponse};
use crate::config::Config;
use crate::error::AuthError;
use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tokens this close to expiry are renewed before use.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

/// Added to the polling interval when the server answers `slow_down`.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Response from the device authorization endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeInfo {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Ready-made sign-in instructions for the user.
    pub message: Option<String>,
}

const fn default_interval() -> u64 {
    5
}

impl DeviceCodeInfo {
    /// Text shown to the user while polling.
    pub fn instructions(&self) -> String {
        self.message.clone().unwrap_or_else(|| {
            format!(
                "To sign in, use a web browser to open the page {} and enter the code {} to authenticate.",
                self.verification_uri, self.user_code
            )
        })
    }
}

/// Callback that shows device code instructions to the user.
type PromptCallback = Box<dyn Fn(&DeviceCodeInfo) + Send + Sync>;

/// Credential that signs the user in with the device code flow.
pub struct DeviceCodeCredential {
    client_id: String,
    device_code_url: String,
    token_url: String,
    http_client: reqwest::Client,
    prompt: PromptCallback,
    cache: Mutex<Option<CachedToken>>,
}

impl DeviceCodeCredential {
    /// Create a new credential from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client_id: config.azure.client_id.clone(),
            device_code_url: config.device_code_url(),
            token_url: config.token_url(),
            http_client,
            prompt: Box::new(|info| println!("{}", info.instructions())),
            cache: Mutex::new(None),
        })
    }

    /// Replace the callback that shows sign-in instructions.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn with_prompt(mut self, prompt: impl Fn(&DeviceCodeInfo) + Send + Sync + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    /// Get a token for `scopes`, signing in only when no usable token is cached.
    pub async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if !cached
                .access
                .expires_within(ChronoDuration::minutes(EXPIRY_MARGIN_MINUTES))
            {
                debug!("Using cached access token");
                return Ok(cached.access.clone());
            }
        }

        let refresh_token = cache.as_ref().and_then(|c| c.refresh_token.clone());
        let cached = match refresh_token {
            Some(refresh_token) => match self.refresh(&refresh_token, scopes).await {
                Ok(response) => CachedToken::from_response(&response).or_refresh_token(refresh_token),
                Err(e) => {
                    warn!("Refresh failed, signing in again: {}", e);
                    CachedToken::from_response(&self.sign_in(scopes).await?)
                }
            },
            None => CachedToken::from_response(&self.sign_in(scopes).await?),
        };

        let token = cached.access.clone();
        *cache = Some(cached);

        info!("Access token acquired, expires at {}", token.expires_on());
        Ok(token)
    }

    /// Run the interactive device code flow.
    async fn sign_in(&self, scopes: &[String]) -> Result<TokenResponse, AuthError> {
        let device_code = self.request_device_code(scopes).await?;
        (self.prompt)(&device_code);
        self.poll_for_token(&device_code).await
    }

    async fn request_device_code(&self, scopes: &[String]) -> Result<DeviceCodeInfo, AuthError> {
        let scope = scope_param(scopes);
        let params = [("client_id", self.client_id.as_str()), ("scope", scope.as_str())];

        debug!("Requesting device code from {}", self.device_code_url);

        let response = self
            .http_client
            .post(&self.device_code_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::DeviceCodeRequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!("Device code request failed: HTTP {} - {}", status, error_body);
            return Err(AuthError::DeviceCodeRequestFailed(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::DeviceCodeRequestFailed(e.to_string()))
    }

    /// Poll the token endpoint until the user finishes signing in or the code expires.
    async fn poll_for_token(&self, device_code: &DeviceCodeInfo) -> Result<TokenResponse, AuthError> {
        let deadline = Instant::now() + Duration::from_secs(device_code.expires_in);
        let mut interval = Duration::from_secs(device_code.interval);

        let params = [
            ("grant_type", DEVICE_CODE_GRANT),
            ("client_id", self.client_id.as_str()),
            ("device_code", device_code.device_code.as_str()),
        ];

        loop {
            tokio::time::sleep(interval).await;

            if Instant::now() >= deadline {
                return Err(AuthError::PollingTimedOut);
            }

            let response = self
                .http_client
                .post(&self.token_url)
                .form(&params)
                .send()
                .await
                .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

            if response.status().is_success() {
                return response
                    .json()
                    .await
                    .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()));
            }

            let status = response.status();
            let error: OAuthErrorResponse = response
                .json()
                .await
                .map_err(|_| AuthError::TokenExchangeFailed(format!("HTTP {}", status.as_u16())))?;

            match error.error.as_str() {
                "authorization_pending" => {
                    debug!("Waiting for user to complete sign-in");
                }
                "slow_down" => {
                    interval += SLOW_DOWN_STEP;
                    debug!("Server asked to slow down, polling every {:?}", interval);
                }
                "authorization_declined" | "access_denied" => {
                    return Err(AuthError::AuthorizationDeclined)
                }
                "expired_token" | "code_expired" => return Err(AuthError::CodeExpired),
                other => {
                    tracing::error!(
                        "Token request failed: HTTP {} - {}: {}",
                        status,
                        other,
                        error.error_description
                    );
                    return Err(AuthError::TokenExchangeFailed(other.to_string()));
                }
            }
        }
    }

    /// Redeem a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str, scopes: &[String]) -> Result<TokenResponse, AuthError> {
        let scope = scope_param(scopes);
        let params = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!("Token refresh failed: HTTP {} - {}", status, error_body);
            return Err(AuthError::TokenRefreshFailed(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))
    }
}

/// Scopes as sent to the identity platform, always including `offline_access`
/// so a refresh token is issued.
fn scope_param(scopes: &[String]) -> String {
    let mut scope = scopes.join(" ");
    if !scopes.iter().any(|s| s == "offline_access") {
        if !scope.is_empty() {
            scope.push(' ');
        }
        scope.push_str("offline_access");
    }
    scope
}
