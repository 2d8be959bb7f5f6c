// Login handlers: start and end of the authorization code flow
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, info, warn};

use super::request_validation::validate_request;
use crate::errors::OAuthAgentError;
use crate::models::{
    EndLoginRequest, SessionResponse, SessionState, StartLoginRequest, StartLoginResponse,
    TempLoginData,
};
use crate::oauth::jwt_validation::JwtValidationError;
use crate::oauth::{
    create_authorization_request, handle_authorization_response, AuthorizationResponse,
    IdTokenValidator, TokenClient,
};
use crate::session::{CookieFactory, CookieType};
use crate::settings::OAuthAgentSettings;
use crate::utils::responses::ResponseBuilder;

/// Start a login
///
/// Builds the authorization request URL and stores state and code verifier in
/// the temporary login cookie.
///
/// # Errors
///
/// Returns `UnauthorizedRequest` for a bad version header or origin, or
/// `Internal` if the request URL or cookie cannot be built
pub async fn start_login(
    req: HttpRequest,
    body: Option<web::Json<StartLoginRequest>>,
    settings: web::Data<OAuthAgentSettings>,
    cookie_factory: web::Data<CookieFactory>,
) -> Result<HttpResponse, OAuthAgentError> {
    validate_request(&req, &settings)?;

    let extra_params = body
        .and_then(|body| body.into_inner().extra_params)
        .unwrap_or_default();
    let request = create_authorization_request(&settings.oauth, &extra_params)?;

    let login_cookie = cookie_factory.create_temp_login_cookie(&TempLoginData {
        state: request.state,
        code_verifier: request.code_verifier,
    })?;

    debug!(
        "Started login with {} extra parameter(s)",
        extra_params.len()
    );
    Ok(ResponseBuilder::ok()
        .with_cookies(vec![login_cookie])
        .json(&StartLoginResponse {
            authorization_request_url: request.authorization_request_url,
        }))
}

/// Finish a login, or report the session on a plain page load
///
/// When `pageUrl` carries a code and state the code is redeemed, the ID token
/// validated and the token cookies written. Otherwise the current session is
/// reported from the ID cookie.
///
/// # Errors
///
/// - `AuthorizationResponse` if the authorization server returned an error
/// - `InvalidCookie` if the login cookie is missing or cannot be decrypted
/// - `InvalidState` if the returned state does not match the login cookie
/// - `TokenRequest` if the code exchange fails
/// - `InvalidIdToken` if no valid ID token was issued
pub async fn end_login(
    req: HttpRequest,
    body: Option<web::Json<EndLoginRequest>>,
    settings: web::Data<OAuthAgentSettings>,
    cookie_factory: web::Data<CookieFactory>,
    token_client: web::Data<TokenClient>,
    validator: web::Data<IdTokenValidator>,
) -> Result<HttpResponse, OAuthAgentError> {
    validate_request(&req, &settings)?;

    let page_url = body.and_then(|body| body.into_inner().page_url);
    match handle_authorization_response(page_url.as_deref())? {
        Some(response) => {
            complete_login(&req, response, &cookie_factory, &token_client, &validator).await
        }
        None => {
            let state = cookie_factory.session_state(&req);
            debug!("Login end without an authorization response, logged in: {}", state.is_logged_in());
            Ok(ResponseBuilder::ok().json(&SessionResponse::from(state)))
        }
    }
}

async fn complete_login(
    req: &HttpRequest,
    response: AuthorizationResponse,
    cookie_factory: &CookieFactory,
    token_client: &TokenClient,
    validator: &IdTokenValidator,
) -> Result<HttpResponse, OAuthAgentError> {
    let login_data = cookie_factory.read_temp_login_data(req)?;
    if login_data.state != response.state {
        warn!("Authorization response state does not match the login cookie");
        return Err(OAuthAgentError::InvalidState);
    }

    let tokens = token_client
        .exchange_code(&response.code, &login_data.code_verifier)
        .await?;

    let id_token = tokens.id_token.as_deref().ok_or_else(|| {
        OAuthAgentError::InvalidIdToken(JwtValidationError::InvalidToken(
            "token response did not include an ID token".to_string(),
        ))
    })?;
    let claims = validator
        .validate(id_token)
        .await
        .map_err(OAuthAgentError::InvalidIdToken)?;

    let mut cookies = cookie_factory.create_token_cookies(&tokens)?;
    cookies.push(cookie_factory.create_removal_cookie(CookieType::TempLogin));

    info!(
        "Login completed for subject {}",
        claims.subject().unwrap_or("<unknown>")
    );
    Ok(ResponseBuilder::ok()
        .with_cookies(cookies)
        .json(&SessionResponse::from(SessionState::Authenticated(claims))))
}
