// Logout handler
use actix_web::{web, HttpRequest, HttpResponse};
use log::info;

use super::request_validation::validate_request;
use crate::errors::OAuthAgentError;
use crate::models::LogoutResponse;
use crate::oauth::create_end_session_url;
use crate::session::CookieFactory;
use crate::settings::OAuthAgentSettings;
use crate::utils::responses::ResponseBuilder;

/// Unset the token cookies and return the end-session URL
///
/// # Errors
///
/// - `InvalidCookie` if the ID cookie is missing or cannot be decrypted
/// - `Internal` if the end-session endpoint is misconfigured
pub async fn logout(
    req: HttpRequest,
    settings: web::Data<OAuthAgentSettings>,
    cookie_factory: web::Data<CookieFactory>,
) -> Result<HttpResponse, OAuthAgentError> {
    validate_request(&req, &settings)?;

    let claims = cookie_factory.read_id_claims(&req)?;
    let url = create_end_session_url(&settings.oauth)?;

    info!(
        "Logging out subject {}",
        claims.subject().unwrap_or("<unknown>")
    );
    Ok(ResponseBuilder::ok()
        .with_cookies(cookie_factory.create_token_removal_cookies())
        .json(&LogoutResponse { url }))
}
