//! Google sign-in.
//!
//! The storefront obtains an ID token from Google Identity Services and posts
//! it to `/api/auth/google`. We validate it with Google's `tokeninfo`
//! endpoint, then check that it was issued for our client id and that the
//! email is verified.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Errors from Google sign-in.
#[derive(Debug, Error)]
pub enum GoogleError {
    /// `GOOGLE_CLIENT_ID` is not set.
    #[error("Google sign-in is not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("Google request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("Google response error: {0}")]
    Response(String),

    /// Token was rejected.
    #[error("invalid Google token: {0}")]
    InvalidToken(String),
}

/// A verified Google account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub email: String,
    /// Google's stable account id (`sub`).
    pub subject: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    /// Google returns this as the string `"true"` or `"false"`.
    #[serde(default)]
    email_verified: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Validates Google ID tokens.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    client: Client,
    client_id: Option<String>,
}

impl GoogleClient {
    #[must_use]
    pub const fn new(client: Client, client_id: Option<String>) -> Self {
        Self { client, client_id }
    }

    /// Whether a client id is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.client_id.is_some()
    }

    /// Verify an ID token and return the account it belongs to.
    ///
    /// # Errors
    ///
    /// Returns `GoogleError::NotConfigured` without a client id,
    /// `GoogleError::InvalidToken` if Google rejects the token or it fails our
    /// checks, and `Request`/`Response` for transport failures.
    #[instrument(skip_all)]
    pub async fn verify_id_token(&self, id_token: &str) -> Result<GoogleIdentity, GoogleError> {
        let client_id = self.client_id.as_deref().ok_or(GoogleError::NotConfigured)?;
        if id_token.trim().is_empty() {
            return Err(GoogleError::InvalidToken("empty token".to_string()));
        }

        let response = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| GoogleError::Request(e.to_string()))?;

        if response.status().is_client_error() {
            warn!(status = %response.status(), "Google rejected ID token");
            return Err(GoogleError::InvalidToken("token rejected by Google".to_string()));
        }
        if !response.status().is_success() {
            return Err(GoogleError::Response(response.status().to_string()));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| GoogleError::Response(e.to_string()))?;

        let identity = check_token_info(info, client_id)?;
        debug!("Google ID token verified");
        Ok(identity)
    }
}

fn check_token_info(info: TokenInfo, client_id: &str) -> Result<GoogleIdentity, GoogleError> {
    if info.aud != client_id {
        return Err(GoogleError::InvalidToken("audience mismatch".to_string()));
    }
    if info.email_verified.as_deref() != Some("true") {
        return Err(GoogleError::InvalidToken("email not verified".to_string()));
    }
    let email = info
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| GoogleError::InvalidToken("token has no email".to_string()))?;

    Ok(GoogleIdentity {
        email,
        subject: info.sub,
        name: info.name.filter(|n| !n.trim().is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_ID: &str = "1234.apps.googleusercontent.com";

    fn info(aud: &str, verified: Option<&str>) -> TokenInfo {
        TokenInfo {
            aud: aud.to_string(),
            sub: "10769150350006150715113082367".to_string(),
            email: Some("asha@example.com".to_string()),
            email_verified: verified.map(str::to_string),
            name: Some("Asha Rao".to_string()),
        }
    }

    #[test]
    fn test_accepts_matching_verified_token() {
        let identity = check_token_info(info(CLIENT_ID, Some("true")), CLIENT_ID);
        assert!(matches!(
            identity,
            Ok(GoogleIdentity { ref email, .. }) if email == "asha@example.com"
        ));
    }

    #[test]
    fn test_rejects_other_audience() {
        let result = check_token_info(info("other.apps.googleusercontent.com", Some("true")), CLIENT_ID);
        assert!(matches!(result, Err(GoogleError::InvalidToken(_))));
    }

    #[test]
    fn test_rejects_unverified_email() {
        assert!(check_token_info(info(CLIENT_ID, Some("false")), CLIENT_ID).is_err());
        assert!(check_token_info(info(CLIENT_ID, None), CLIENT_ID).is_err());
    }

    #[tokio::test]
    async fn test_not_configured() {
        let client = GoogleClient::new(Client::new(), None);
        assert!(!client.is_configured());
        assert!(matches!(
            client.verify_id_token("token").await,
            Err(GoogleError::NotConfigured)
        ));
    }
}
