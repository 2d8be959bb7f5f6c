//! Error taxonomy for the OAuth agent
//!
//! Every failure a controller can produce is an [`OAuthAgentError`]. The
//! `ResponseError` implementation turns it into the JSON body `{code, message}`
//! with a 4xx status (or 5xx for infrastructure failures). Detailed causes are
//! logged and never echoed back to the browser.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::{error, warn};

use crate::oauth::jwt_validation::JwtValidationError;
use crate::utils::responses::ResponseBuilder;

/// OAuth error code returned by the token endpoint when a grant is no longer valid
pub const INVALID_GRANT: &str = "invalid_grant";

/// Why a cookie could not be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieFault {
    /// The request did not carry the cookie at all
    Missing,
    /// The cookie was present but failed authenticated decryption or parsing
    Undecryptable,
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthAgentError {
    #[error("cookie '{name}' is unusable ({fault:?}): {detail}")]
    InvalidCookie {
        name: String,
        fault: CookieFault,
        detail: String,
    },

    #[error("the state returned in the authorization response does not match the login cookie")]
    InvalidState,

    #[error("ID token validation failed: {0}")]
    InvalidIdToken(#[source] JwtValidationError),

    #[error("authorization server returned '{code}': {description}")]
    AuthorizationResponse { code: String, description: String },

    #[error("token request failed (status {http_status:?}, error {oauth_error_code}): {description}")]
    TokenRequest {
        http_status: Option<u16>,
        oauth_error_code: String,
        description: String,
    },

    #[error("request rejected: {0}")]
    UnauthorizedRequest(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OAuthAgentError {
    /// Build an `InvalidCookie` error for a cookie that was not sent
    #[must_use]
    pub fn missing_cookie(name: &str, detail: &str) -> Self {
        Self::InvalidCookie {
            name: name.to_string(),
            fault: CookieFault::Missing,
            detail: detail.to_string(),
        }
    }

    /// Build an `InvalidCookie` error for a cookie whose payload could not be decrypted
    #[must_use]
    pub fn undecryptable_cookie(name: &str, detail: impl std::fmt::Display) -> Self {
        Self::InvalidCookie {
            name: name.to_string(),
            fault: CookieFault::Undecryptable,
            detail: detail.to_string(),
        }
    }

    /// True when the authorization server rejected a grant as expired or revoked,
    /// meaning the user has to authenticate again
    #[must_use]
    pub fn is_invalid_grant(&self) -> bool {
        matches!(self, Self::TokenRequest { oauth_error_code, .. } if oauth_error_code == INVALID_GRANT)
    }

    /// Error code sent to the browser
    #[must_use]
    pub fn error_code(&self) -> String {
        match self {
            Self::InvalidCookie { .. } => "invalid_cookie".to_string(),
            Self::InvalidState => "invalid_state".to_string(),
            Self::InvalidIdToken(_) => "invalid_id_token".to_string(),
            Self::AuthorizationResponse { code, .. } => code.clone(),
            Self::TokenRequest { http_status, .. } => {
                if self.is_invalid_grant() {
                    "session_expired"
                } else if matches!(http_status, Some(status) if (400..500).contains(status)) {
                    "authorization_error"
                } else {
                    "authorization_server_error"
                }
                .to_string()
            }
            Self::UnauthorizedRequest(_) => "unauthorized_request".to_string(),
            Self::InvalidRequest(_) => "invalid_request".to_string(),
            Self::Internal(_) => "server_error".to_string(),
        }
    }

    /// Client-safe message sent to the browser
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::InvalidCookie { .. } => "A required cookie was missing or invalid".to_string(),
            Self::InvalidState => "The login state did not match the login in progress".to_string(),
            Self::InvalidIdToken(_) => "The ID token could not be validated".to_string(),
            Self::AuthorizationResponse { description, .. } => {
                if description.is_empty() {
                    "The login was rejected by the authorization server".to_string()
                } else {
                    description.clone()
                }
            }
            Self::TokenRequest { .. } => {
                if self.is_invalid_grant() {
                    "The session has expired and the user must sign in again".to_string()
                } else {
                    "A token request to the authorization server failed".to_string()
                }
            }
            Self::UnauthorizedRequest(_) => {
                "Access denied due to invalid request details".to_string()
            }
            Self::InvalidRequest(_) => "The request is malformed or invalid".to_string(),
            Self::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl ResponseError for OAuthAgentError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCookie {
                fault: CookieFault::Missing,
                ..
            }
            | Self::InvalidState
            | Self::InvalidIdToken(_)
            | Self::AuthorizationResponse { .. }
            | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCookie {
                fault: CookieFault::Undecryptable,
                ..
            }
            | Self::UnauthorizedRequest(_) => StatusCode::UNAUTHORIZED,
            Self::TokenRequest { http_status, .. } => {
                if self.is_invalid_grant() {
                    StatusCode::UNAUTHORIZED
                } else if matches!(http_status, Some(status) if (400..500).contains(status)) {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("OAuth agent error ({status}): {self}");
        } else {
            warn!("OAuth agent request failed ({status}): {self}");
        }

        ResponseBuilder::error(status)
            .with_error_code(&self.error_code())
            .with_message(&self.client_message())
            .build()
    }
}
