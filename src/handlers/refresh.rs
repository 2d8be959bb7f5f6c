// Token refresh handler
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, info};

use super::request_validation::validate_request;
use crate::errors::OAuthAgentError;
use crate::oauth::{IdTokenValidator, TokenClient};
use crate::session::CookieFactory;
use crate::settings::OAuthAgentSettings;
use crate::utils::responses::ResponseBuilder;

/// Refresh the access token with the refresh token cookie
///
/// Replies 204 with a new AT cookie, plus RT and ID cookies when the
/// authorization server rotated them. A rotated ID token is validated first.
///
/// # Errors
///
/// - `InvalidCookie` if the RT cookie is missing or cannot be decrypted
/// - `TokenRequest` if the refresh fails; `invalid_grant` means the session expired
/// - `InvalidIdToken` if a rotated ID token does not validate
pub async fn refresh_token(
    req: HttpRequest,
    settings: web::Data<OAuthAgentSettings>,
    cookie_factory: web::Data<CookieFactory>,
    token_client: web::Data<TokenClient>,
    validator: web::Data<IdTokenValidator>,
) -> Result<HttpResponse, OAuthAgentError> {
    validate_request(&req, &settings)?;

    let refresh_token = cookie_factory.read_refresh_token(&req)?;
    let tokens = token_client
        .refresh(&refresh_token)
        .await
        .inspect_err(|e| {
            if e.is_invalid_grant() {
                info!("Refresh token was rejected, the session has expired");
            }
        })?;

    if let Some(id_token) = &tokens.id_token {
        validator
            .validate(id_token)
            .await
            .map_err(OAuthAgentError::InvalidIdToken)?;
        debug!("Validated rotated ID token");
    }

    let cookies = cookie_factory.create_token_cookies(&tokens)?;
    debug!("Refreshed tokens, writing {} cookie(s)", cookies.len());
    Ok(ResponseBuilder::no_content_with_cookies(cookies))
}
