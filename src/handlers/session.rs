// Session query handler
use actix_web::{web, HttpRequest, HttpResponse};

use super::request_validation::validate_request;
use crate::errors::OAuthAgentError;
use crate::models::SessionResponse;
use crate::session::CookieFactory;
use crate::settings::OAuthAgentSettings;
use crate::utils::responses::ResponseBuilder;

/// Report whether the browser holds a session, with the ID token claims if so
///
/// Never sets cookies. An ID cookie that cannot be read counts as logged out.
///
/// # Errors
///
/// Returns `UnauthorizedRequest` for a bad version header or origin
pub async fn get_session(
    req: HttpRequest,
    settings: web::Data<OAuthAgentSettings>,
    cookie_factory: web::Data<CookieFactory>,
) -> Result<HttpResponse, OAuthAgentError> {
    validate_request(&req, &settings)?;
    let state = cookie_factory.session_state(&req);
    Ok(ResponseBuilder::ok().json(&SessionResponse::from(state)))
}
