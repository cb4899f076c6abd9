//! Access tokens and token endpoint responses, zeroized on drop.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A bearer token and the instant it stops being valid.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessToken {
    token: String,
    #[zeroize(skip)]
    expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: String, expires_on: DateTime<Utc>) -> Self {
        Self { token, expires_on }
    }

    /// The raw bearer token.
    pub fn secret(&self) -> &str {
        &self.token
    }

    pub fn expires_on(&self) -> DateTime<Utc> {
        self.expires_on
    }

    /// True if the token expires within `margin` from now.
    pub fn expires_within(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_on
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Successful response from the token endpoint.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[allow(dead_code)]
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
}

impl Zeroize for TokenResponse {
    fn zeroize(&mut self) {
        self.access_token.zeroize();
        if let Some(ref mut rt) = self.refresh_token {
            rt.zeroize();
        }
    }
}

impl Drop for TokenResponse {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Error response from the token or device code endpoints.
#[derive(Debug, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: String,
}

/// Token state held in memory between calls.
pub struct CachedToken {
    pub access: AccessToken,
    pub refresh_token: Option<String>,
}

/// Upper bound on the lifetime taken from `expires_in`.
const MAX_LIFETIME_SECS: i64 = 24 * 60 * 60;

impl CachedToken {
    pub fn from_response(response: &TokenResponse) -> Self {
        let lifetime = i64::try_from(response.expires_in)
            .unwrap_or(i64::MAX)
            .min(MAX_LIFETIME_SECS);
        let expires_on = Utc::now() + Duration::seconds(lifetime);
        Self {
            access: AccessToken::new(response.access_token.clone(), expires_on),
            refresh_token: response.refresh_token.clone(),
        }
    }

    /// Keep `previous` as the refresh token when the response did not issue a new one.
    pub fn or_refresh_token(mut self, mut previous: String) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = Some(previous);
        } else {
            previous.zeroize();
        }
        self
    }
}

impl Drop for CachedToken {
    fn drop(&mut self) {
        if let Some(ref mut rt) = self.refresh_token {
            rt.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("super_secret_token".into(), Utc::now());
        let debug_output = format!("{:?}", token);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret"));
    }

    #[test]
    fn test_expires_within() {
        let token = AccessToken::new("t".into(), Utc::now() + Duration::minutes(3));
        assert!(token.expires_within(Duration::minutes(5)));
        assert!(!token.expires_within(Duration::minutes(1)));
    }

    #[test]
    fn test_cached_token_from_response() {
        let response: TokenResponse = serde_json::from_str(
            r#"{
                "token_type": "Bearer",
                "scope": "user.read mail.read",
                "expires_in": 3600,
                "access_token": "eyJ0eXAi",
                "refresh_token": "0.ARwA"
            }"#,
        )
        .unwrap();

        let cached = CachedToken::from_response(&response);
        assert_eq!(cached.access.secret(), "eyJ0eXAi");
        assert_eq!(cached.refresh_token.as_deref(), Some("0.ARwA"));
        assert!(!cached.access.expires_within(Duration::minutes(55)));
    }

    #[test]
    fn test_huge_expires_in_is_capped() {
        let response: TokenResponse = serde_json::from_str(&format!(
            r#"{{"token_type": "Bearer", "expires_in": {}, "access_token": "t"}}"#,
            u64::MAX
        ))
        .unwrap();

        let cached = CachedToken::from_response(&response);
        assert!(!cached.access.expires_within(Duration::hours(23)));
        assert!(cached.access.expires_within(Duration::hours(25)));
    }

    #[test]
    fn test_previous_refresh_token_is_kept() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"token_type": "Bearer", "expires_in": 3600, "access_token": "t"}"#,
        )
        .unwrap();
        let cached = CachedToken::from_response(&response).or_refresh_token("old".into());
        assert_eq!(cached.refresh_token.as_deref(), Some("old"));

        let response: TokenResponse = serde_json::from_str(
            r#"{"token_type": "Bearer", "expires_in": 3600, "access_token": "t", "refresh_token": "new"}"#,
        )
        .unwrap();
        let cached = CachedToken::from_response(&response).or_refresh_token("old".into());
        assert_eq!(cached.refresh_token.as_deref(), Some("new"));
    }
}
