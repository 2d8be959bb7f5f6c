//! Back channel client for the authorization server's token endpoint
//!
//! The agent is a public client: requests carry `client_id` but no secret.
//! Each call is a single attempt bounded by the configured timeout.

use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::errors::OAuthAgentError;
use crate::models::TokenSet;
use crate::settings::OAuthSettings;

/// Error code used when the failure has no OAuth error body, such as a timeout
const SERVER_ERROR: &str = "server_error";

/// Standard OAuth error body from the token endpoint
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Clone)]
pub struct TokenClient {
    http_client: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    redirect_uri: String,
}

impl TokenClient {
    /// Create a token client from OAuth settings
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the HTTP client cannot be built
    pub fn new(oauth: &OAuthSettings) -> Result<Self, OAuthAgentError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(oauth.http_timeout_seconds))
            .build()
            .map_err(|e| OAuthAgentError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            token_endpoint: oauth.token_endpoint.clone(),
            client_id: oauth.client_id.clone(),
            redirect_uri: oauth.redirect_uri.clone(),
        })
    }

    /// Redeem an authorization code together with its PKCE verifier
    ///
    /// # Errors
    ///
    /// Returns `TokenRequest` for any non-2xx response, transport failure or
    /// unreadable token response
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, OAuthAgentError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
            ("code_verifier", code_verifier),
        ];
        self.post_token_request("authorization_code", &params).await
    }

    /// Use a refresh token to obtain a new token set
    ///
    /// # Errors
    ///
    /// Returns `TokenRequest` for any non-2xx response, transport failure or
    /// unreadable token response. An expired or revoked refresh token yields
    /// an error for which `is_invalid_grant()` is true.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, OAuthAgentError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        self.post_token_request("refresh_token", &params).await
    }

    async fn post_token_request(
        &self,
        grant_type: &str,
        params: &[(&str, &str)],
    ) -> Result<TokenSet, OAuthAgentError> {
        debug!("Sending {grant_type} grant to {}", self.token_endpoint);

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(params)
            .send()
            .await
            .map_err(|e| OAuthAgentError::TokenRequest {
                http_status: None,
                oauth_error_code: SERVER_ERROR.to_string(),
                description: format!("Connectivity problem during {grant_type} grant: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| OAuthAgentError::TokenRequest {
            http_status: None,
            oauth_error_code: SERVER_ERROR.to_string(),
            description: format!("Failed to read token response: {e}"),
        })?;

        if !status.is_success() {
            let error_body: Option<TokenErrorResponse> = serde_json::from_str(&body).ok();
            let (error_code, description) = error_body
                .map(|b| (b.error, b.error_description))
                .unwrap_or_default();
            let error_code = error_code.unwrap_or_else(|| SERVER_ERROR.to_string());

            warn!(
                "Token endpoint rejected {grant_type} grant with status {status}: {error_code}"
            );
            return Err(OAuthAgentError::TokenRequest {
                http_status: Some(status.as_u16()),
                oauth_error_code: error_code,
                description: description.unwrap_or_default(),
            });
        }

        let tokens: TokenSet =
            serde_json::from_str(&body).map_err(|e| OAuthAgentError::TokenRequest {
                http_status: None,
                oauth_error_code: SERVER_ERROR.to_string(),
                description: format!("Token endpoint returned an unexpected body: {e}"),
            })?;

        info!(
            "✅ Token endpoint completed {grant_type} grant (refresh token: {}, id token: {})",
            tokens.refresh_token.is_some(),
            tokens.id_token.is_some()
        );
        Ok(tokens)
    }
}
