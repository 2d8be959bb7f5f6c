//! HTTP response handling system
//!
//! A unified interface for the JSON responses the agent returns. Error bodies
//! always have the shape `{code, message}`; success bodies are serialized
//! models carrying any `Set-Cookie` headers the controller produced.

use actix_web::{cookie::Cookie, http::header, http::StatusCode, HttpResponse, HttpResponseBuilder};
use serde_json::{json, Value};

/// Unified response builder that handles all types of HTTP responses
pub struct ResponseBuilder;

impl ResponseBuilder {
    // ===============================
    // ERROR RESPONSE METHODS
    // ===============================

    /// Create an error response for an arbitrary status
    #[must_use]
    pub fn error(status: StatusCode) -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(status)
    }

    /// Create a `NotFound` (404) error response with optional customization
    #[must_use]
    pub fn not_found() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(StatusCode::NOT_FOUND)
    }

    // ===============================
    // SUCCESS RESPONSE METHODS
    // ===============================

    /// Create an OK response (200) with JSON content
    #[must_use]
    pub fn ok() -> JsonResponseBuilder {
        JsonResponseBuilder::new(StatusCode::OK)
    }

    /// Create a `NoContent` (204) response carrying only cookies
    #[must_use]
    pub fn no_content_with_cookies(cookies: Vec<Cookie<'static>>) -> HttpResponse {
        let mut builder = HttpResponse::NoContent();
        for cookie in cookies {
            builder.cookie(cookie);
        }
        builder.finish()
    }
}

// ===============================
// BUILDER TYPES
// ===============================

/// Builder for error responses with fluent interface
pub struct ErrorResponseBuilder {
    status: StatusCode,
    error_code: Option<String>,
    message: Option<String>,
}

/// Builder for JSON responses
pub struct JsonResponseBuilder {
    status: StatusCode,
    cookies: Vec<Cookie<'static>>,
}

impl ErrorResponseBuilder {
    fn new(status: StatusCode) -> Self {
        Self {
            status,
            error_code: None,
            message: None,
        }
    }

    /// Set a custom error code (e.g., "`invalid_cookie`", "`session_expired`")
    #[must_use]
    pub fn with_error_code(mut self, code: &str) -> Self {
        self.error_code = Some(code.to_string());
        self
    }

    /// Set a custom error message
    #[must_use]
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    /// Build the final `HttpResponse`
    #[must_use]
    pub fn build(self) -> HttpResponse {
        let code = self
            .error_code
            .unwrap_or_else(|| default_error_code(self.status).to_string());
        let message = self
            .message
            .unwrap_or_else(|| default_message(self.status).to_string());

        let body: Value = json!({
            "code": code,
            "message": message,
        });

        HttpResponseBuilder::new(self.status)
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .json(body)
    }
}

fn default_error_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "invalid_request",
        StatusCode::UNAUTHORIZED => "unauthorized_request",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::BAD_GATEWAY => "authorization_server_error",
        _ => "server_error",
    }
}

fn default_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "The request is malformed or invalid",
        StatusCode::UNAUTHORIZED => "Access denied due to invalid request details",
        StatusCode::NOT_FOUND => "The requested resource was not found",
        StatusCode::BAD_GATEWAY => "Failed to communicate with the authorization server",
        _ => "An internal server error occurred",
    }
}

impl JsonResponseBuilder {
    fn new(status: StatusCode) -> Self {
        Self {
            status,
            cookies: Vec::new(),
        }
    }

    /// Add cookies to the response
    #[must_use]
    pub fn with_cookies(mut self, mut cookies: Vec<Cookie<'static>>) -> Self {
        self.cookies.append(&mut cookies);
        self
    }

    /// Build the response with JSON content
    #[must_use]
    pub fn json<T: serde::Serialize>(self, data: &T) -> HttpResponse {
        let mut builder = HttpResponseBuilder::new(self.status);
        for cookie in self.cookies {
            builder.cookie(cookie);
        }
        builder.json(data)
    }
}
