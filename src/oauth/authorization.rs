//! Front channel of the code flow: building the authorization request URL and
//! reading the authorization response out of the SPA's page URL.

use log::{debug, warn};
use url::Url;

use crate::errors::OAuthAgentError;
use crate::models::ExtraParam;
use crate::oauth::pkce::{PkceParameters, CODE_CHALLENGE_METHOD};
use crate::settings::OAuthSettings;

/// Parameters the agent always sets itself; extension params cannot replace them
pub const RESERVED_AUTHORIZATION_PARAMS: [&str; 8] = [
    "client_id",
    "redirect_uri",
    "response_type",
    "scope",
    "state",
    "code_challenge",
    "code_challenge_method",
    "prompt",
];

/// Result of starting a login
#[derive(Debug, Clone)]
pub struct AuthorizationRequestData {
    pub authorization_request_url: String,
    pub state: String,
    pub code_verifier: String,
}

/// Code and state taken from a successful authorization response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResponse {
    pub code: String,
    pub state: String,
}

/// Build the authorization request URL with freshly generated PKCE values
///
/// # Errors
///
/// Returns `Internal` if the configured authorize endpoint is not a URL
pub fn create_authorization_request(
    oauth: &OAuthSettings,
    extra_params: &[ExtraParam],
) -> Result<AuthorizationRequestData, OAuthAgentError> {
    create_authorization_request_with(oauth, PkceParameters::generate(), extra_params)
}

/// Build the authorization request URL from the given PKCE values
///
/// # Errors
///
/// Returns `Internal` if the configured authorize endpoint is not a URL
pub fn create_authorization_request_with(
    oauth: &OAuthSettings,
    pkce: PkceParameters,
    extra_params: &[ExtraParam],
) -> Result<AuthorizationRequestData, OAuthAgentError> {
    let mut url = Url::parse(&oauth.authorize_endpoint).map_err(|e| {
        OAuthAgentError::Internal(format!(
            "Invalid authorize endpoint '{}': {e}",
            oauth.authorize_endpoint
        ))
    })?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", &oauth.client_id)
            .append_pair("redirect_uri", &oauth.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &oauth.scope)
            .append_pair("state", &pkce.state)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD)
            .append_pair("prompt", "login");

        for param in extra_params {
            if RESERVED_AUTHORIZATION_PARAMS.contains(&param.key.as_str()) {
                warn!(
                    "Ignoring extra authorization parameter '{}' that would override a built-in value",
                    param.key
                );
                continue;
            }
            query.append_pair(&param.key, &param.value);
        }
    }

    debug!(
        "Built authorization request URL for client '{}' with {} extra parameter(s)",
        oauth.client_id,
        extra_params.len()
    );

    Ok(AuthorizationRequestData {
        authorization_request_url: url.to_string(),
        state: pkce.state,
        code_verifier: pkce.code_verifier,
    })
}

/// Inspect the SPA's current page URL for an authorization response
///
/// Returns `Ok(None)` when the URL carries neither a response nor an error,
/// which is the case on an ordinary page load.
///
/// # Errors
///
/// - `AuthorizationResponse` when the authorization server returned `error`
/// - `InvalidRequest` when the page URL is not an absolute URL
pub fn handle_authorization_response(
    page_url: Option<&str>,
) -> Result<Option<AuthorizationResponse>, OAuthAgentError> {
    let Some(page_url) = page_url.filter(|url| !url.trim().is_empty()) else {
        return Ok(None);
    };

    let url = Url::parse(page_url)
        .map_err(|e| OAuthAgentError::InvalidRequest(format!("pageUrl is not a valid URL: {e}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(OAuthAgentError::AuthorizationResponse {
            code: error,
            description: error_description.unwrap_or_default(),
        });
    }

    match (code, state) {
        (Some(code), Some(state)) => Ok(Some(AuthorizationResponse { code, state })),
        _ => Ok(None),
    }
}

/// Build the end session URL the SPA navigates to after logout
///
/// # Errors
///
/// Returns `Internal` if no usable end session endpoint is configured
pub fn create_end_session_url(oauth: &OAuthSettings) -> Result<String, OAuthAgentError> {
    let mut url = Url::parse(&oauth.end_session_endpoint).map_err(|e| {
        OAuthAgentError::Internal(format!(
            "Invalid end session endpoint '{}': {e}",
            oauth.end_session_endpoint
        ))
    })?;

    url.query_pairs_mut()
        .append_pair("client_id", &oauth.client_id)
        .append_pair("post_logout_redirect_uri", &oauth.post_logout_redirect_uri);

    Ok(url.to_string())
}
