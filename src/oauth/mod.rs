//! OAuth client module
//!
//! This module provides the agent's OAuth functionality: PKCE generation, the
//! authorization request and response, token endpoint calls and ID token
//! validation.

pub mod authorization;
pub mod jwt_validation;
pub mod pkce;
pub mod token_client;

pub use authorization::{
    create_authorization_request, create_end_session_url, handle_authorization_response,
    AuthorizationRequestData, AuthorizationResponse,
};
pub use jwt_validation::{
    IdTokenValidationConfig, IdTokenValidator, JsonWebKey, JsonWebKeySet, JwksCache,
    JwtValidationError, KeyResolver,
};
pub use pkce::PkceParameters;
pub use token_client::TokenClient;

/// Fetch JWKS (JSON Web Key Set) from the given URL
///
/// # Errors
///
/// Returns an error if:
/// - Network request fails
/// - Response status is not successful
/// - Response doesn't contain valid JWKS format
pub async fn fetch_jwks(
    client: &reqwest::Client,
    jwks_uri: &str,
) -> Result<JsonWebKeySet, String> {
    log::debug!("Fetching JWKS from: {jwks_uri}");

    let response = client
        .get(jwks_uri)
        .send()
        .await
        .map_err(|e| format!("Failed to fetch JWKS: {e}"))?;

    if !response.status().is_success() {
        return Err(format!(
            "JWKS request failed with status: {}",
            response.status()
        ));
    }

    let jwks: JsonWebKeySet = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse JWKS JSON: {e}"))?;

    log::debug!("Successfully fetched JWKS with {} key(s)", jwks.keys.len());
    Ok(jwks)
}
