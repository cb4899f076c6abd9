//! Microsoft Graph client for the signed-in user's profile and mailbox.

pub mod models;

use crate::auth::DeviceCodeCredential;
use crate::config::Config;
use crate::error::{ApiError, AppError, GraphError};
use anyhow::{Context, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

use models::{MessagePage, OutgoingMessage, SendMailRequest, User};

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Most messages fetched by [`GraphApi::get_inbox`].
pub const INBOX_PAGE_SIZE: usize = 25;

const USER_FIELDS: &str = "displayName,mail,userPrincipalName";
const MESSAGE_FIELDS: &str = "from,isRead,receivedDateTime,subject";

/// Operations the interactive menu performs against Graph.
pub trait GraphApi {
    /// Get a bearer token for the configured scopes.
    async fn get_user_token(&self) -> Result<String, AppError>;

    /// Fetch the signed-in user, or `None` if Graph returned no body.
    async fn get_user(&self) -> Result<Option<User>, AppError>;

    /// Fetch the newest page of inbox messages.
    async fn get_inbox(&self) -> Result<MessagePage, AppError>;

    /// Send a plain-text message to a single recipient.
    async fn send_mail(&self, subject: &str, body: &str, recipient: &str) -> Result<(), AppError>;

    /// Placeholder for trying out other Graph endpoints.
    async fn make_graph_call(&self) -> Result<(), AppError>;
}

/// Microsoft Graph API client.
pub struct GraphClient {
    credential: DeviceCodeCredential,
    scopes: Vec<String>,
    base_url: String,
    http_client: reqwest::Client,
}

impl GraphClient {
    /// Create a new Graph client.
    pub fn new(config: &Config) -> Result<Self> {
        Url::parse(&config.api.graph_base_url).map_err(|e| {
            AppError::Config(format!(
                "invalid graph_base_url '{}': {}",
                config.api.graph_base_url, e
            ))
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            credential: DeviceCodeCredential::new(config)?,
            scopes: config.scopes(),
            base_url: config.api.graph_base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    #[cfg(test)]
    fn with_credential(mut self, credential: DeviceCodeCredential) -> Self {
        self.credential = credential;
        self
    }

    /// Build an endpoint URL with query parameters.
    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, AppError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| AppError::Config(format!("invalid Graph URL: {}", e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Authorize and send a request, turning non-success statuses into [`GraphError`].
    async fn execute(&self, request: RequestBuilder) -> Result<Response, AppError> {
        let token = self.credential.get_token(&self.scopes).await?;
        let response = request.bearer_auth(token.secret()).send().await?;

        let status = response.status();
        debug!("Graph responded with HTTP {}", status.as_u16());

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!("Graph request failed: HTTP {} - {}", status, body);
        Err(GraphError::from_body(status.as_u16(), &body).into())
    }
}

impl GraphApi for GraphClient {
    async fn get_user_token(&self) -> Result<String, AppError> {
        let token = self.credential.get_token(&self.scopes).await?;
        Ok(token.secret().to_string())
    }

    async fn get_user(&self) -> Result<Option<User>, AppError> {
        let url = self.endpoint("me", &[("$select", USER_FIELDS)])?;
        debug!("Fetching signed-in user from {}", url);

        let response = self.execute(self.http_client.get(url)).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(None);
        }

        let user = serde_json::from_slice(&body).map_err(|e| ApiError::ParseFailed(e.to_string()))?;
        Ok(Some(user))
    }

    async fn get_inbox(&self) -> Result<MessagePage, AppError> {
        let top = INBOX_PAGE_SIZE.to_string();
        let url = self.endpoint(
            "me/mailFolders/inbox/messages",
            &[
                ("$select", MESSAGE_FIELDS),
                ("$top", top.as_str()),
                ("$orderby", "receivedDateTime DESC"),
            ],
        )?;
        debug!("Fetching inbox from {}", url);

        let response = self.execute(self.http_client.get(url)).await?;
        let mut page: MessagePage = response
            .json()
            .await
            .map_err(|e| ApiError::ParseFailed(e.to_string()))?;

        page.value.truncate(INBOX_PAGE_SIZE);
        Ok(page)
    }

    async fn send_mail(&self, subject: &str, body: &str, recipient: &str) -> Result<(), AppError> {
        let url = self.endpoint("me/sendMail", &[])?;
        let request = SendMailRequest {
            message: OutgoingMessage::plain_text(subject, body, recipient),
        };

        debug!("Sending mail to {}", recipient);
        self.execute(self.http_client.post(url).json(&request)).await?;
        Ok(())
    }

    async fn make_graph_call(&self) -> Result<(), AppError> {
        // Intentionally empty: a place to experiment with other Graph calls.
        Ok(())
    }
}
