//! HTTP request builders for testing handlers
//!
//! Every agent endpoint expects the `token-handler-version` header and a trusted
//! `Origin`, so [`AgentRequestBuilder`] adds both unless a test removes them.

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::Method;
use actix_web::test;
use serde_json::Value;

use super::constants::TEST_WEB_ORIGIN;
use crate::handlers::request_validation::TOKEN_HANDLER_VERSION_HEADER;

/// Builder for requests a single page application would send to the agent
pub struct AgentRequestBuilder {
    method: Method,
    uri: String,
    version_header: Option<String>,
    origin: Option<String>,
    cookies: Vec<Cookie<'static>>,
    body: Option<Value>,
}

impl AgentRequestBuilder {
    #[must_use]
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            version_header: Some("1".to_string()),
            origin: Some(TEST_WEB_ORIGIN.to_string()),
            cookies: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    #[must_use]
    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Send a different `Origin` header
    #[must_use]
    pub fn origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    #[must_use]
    pub fn without_origin(mut self) -> Self {
        self.origin = None;
        self
    }

    #[must_use]
    pub fn without_version_header(mut self) -> Self {
        self.version_header = None;
        self
    }

    /// Add a cookie
    #[must_use]
    pub fn cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Add several cookies, typically the ones a previous response set
    #[must_use]
    pub fn cookies(mut self, cookies: impl IntoIterator<Item = Cookie<'static>>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    /// Set a JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Build the actix test request
    #[must_use]
    pub fn build(self) -> test::TestRequest {
        let mut request = test::TestRequest::default()
            .method(self.method)
            .uri(&self.uri);

        if let Some(version) = self.version_header {
            request = request.insert_header((TOKEN_HANDLER_VERSION_HEADER, version));
        }
        if let Some(origin) = self.origin {
            request = request.insert_header(("Origin", origin));
        }
        for cookie in self.cookies {
            request = request.cookie(cookie);
        }
        if let Some(body) = self.body {
            request = request.set_json(body);
        }

        request
    }
}

/// Cookies set by a response, with removal cookies included
#[must_use]
pub fn response_cookies<B>(response: &ServiceResponse<B>) -> Vec<Cookie<'static>> {
    response
        .response()
        .cookies()
        .map(Cookie::into_owned)
        .collect()
}

/// Cookies set by a response that still carry a value, ready to send back
#[must_use]
pub fn live_cookies<B>(response: &ServiceResponse<B>) -> Vec<Cookie<'static>> {
    response_cookies(response)
        .into_iter()
        .filter(|cookie| !cookie.value().is_empty())
        .map(|cookie| Cookie::new(cookie.name().to_string(), cookie.value().to_string()))
        .collect()
}
