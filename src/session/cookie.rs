use actix_web::cookie::{time::Duration, time::OffsetDateTime, Cookie, SameSite};
use actix_web::HttpRequest;
use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::OAuthAgentError;
use crate::models::{IdTokenClaims, SessionState, TempLoginData, TokenSet};
use crate::oauth::jwt_validation::JwtValidationError;
use crate::settings::{OAuthAgentSettings, MAX_COOKIE_MAX_AGE_HOURS};
use crate::utils::crypto::{
    decode_jwt_payload, decrypt_data, encrypt_data, resolve_encryption_key, ENCRYPTION_KEY_SIZE,
};

/// Lifetime of the cookie that carries state and code verifier between login start and end
pub const TEMP_LOGIN_COOKIE_MINUTES: i64 = 10;

/// The cookies the agent issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieType {
    AccessToken,
    RefreshToken,
    IdToken,
    TempLogin,
}

impl CookieType {
    fn suffix(self) -> &'static str {
        match self {
            Self::AccessToken => "at",
            Self::RefreshToken => "rt",
            Self::IdToken => "id",
            Self::TempLogin => "login",
        }
    }
}

/// Options for cookie creation
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: Duration,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            secure: true,
            same_site: SameSite::Strict,
            path: "/".to_string(),
            max_age: Duration::hours(24),
        }
    }
}

/// Cookie factory for creating and reading the agent's encrypted cookies
///
/// All attributes are fixed at construction; every cookie is HttpOnly and
/// SameSite=Strict, and Secure unless the agent is served over plain HTTP.
#[derive(Clone)]
pub struct CookieFactory {
    encryption_key: [u8; ENCRYPTION_KEY_SIZE],
    name_prefix: String,
    endpoints_prefix: String,
    api_cookie_base_path: String,
    cookie_secure: bool,
    token_max_age_hours: u64,
}

impl CookieFactory {
    /// Create a new cookie factory with the specified configuration
    #[must_use]
    pub fn new(
        encryption_key: [u8; ENCRYPTION_KEY_SIZE],
        name_prefix: &str,
        endpoints_prefix: &str,
        api_cookie_base_path: &str,
        cookie_secure: bool,
        token_max_age_hours: u64,
    ) -> Self {
        Self {
            encryption_key,
            name_prefix: name_prefix.to_string(),
            endpoints_prefix: endpoints_prefix.trim_end_matches('/').to_string(),
            api_cookie_base_path: api_cookie_base_path.to_string(),
            cookie_secure,
            token_max_age_hours,
        }
    }

    /// Create a cookie factory from loaded settings
    #[must_use]
    pub fn from_settings(settings: &OAuthAgentSettings) -> Self {
        let (encryption_key, derived) = resolve_encryption_key(&settings.cookies.encryption_key);
        if derived {
            warn!("⚠️  cookies.encryption_key is not a base64 encoded 32 byte key, deriving one from it");
        }

        Self::new(
            encryption_key,
            &settings.cookies.name_prefix,
            settings.endpoints_prefix(),
            &settings.cookies.api_cookie_base_path,
            settings.cookie_secure(),
            settings.cookies.max_age_hours,
        )
    }

    #[must_use]
    pub fn cookie_name(&self, cookie_type: CookieType) -> String {
        format!("{}-{}", self.name_prefix, cookie_type.suffix())
    }

    /// Path each cookie is scoped to, so the browser only sends it where it is needed
    #[must_use]
    pub fn cookie_path(&self, cookie_type: CookieType) -> String {
        match cookie_type {
            CookieType::AccessToken => self.api_cookie_base_path.clone(),
            CookieType::RefreshToken => format!("{}/refresh", self.endpoints_prefix),
            CookieType::IdToken | CookieType::TempLogin => format!("{}/", self.endpoints_prefix),
        }
    }

    fn options(&self, cookie_type: CookieType) -> CookieOptions {
        let max_age = match cookie_type {
            CookieType::TempLogin => Duration::minutes(TEMP_LOGIN_COOKIE_MINUTES),
            _ => Duration::hours(
                i64::try_from(self.token_max_age_hours.min(MAX_COOKIE_MAX_AGE_HOURS)).unwrap_or(24),
            ),
        };

        CookieOptions {
            secure: self.cookie_secure,
            path: self.cookie_path(cookie_type),
            max_age,
            ..Default::default()
        }
    }

    /// Generic method to create a cookie with encrypted data
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_cookie<T: Serialize>(
        &self,
        cookie_type: CookieType,
        data: &T,
    ) -> anyhow::Result<Cookie<'static>> {
        let options = self.options(cookie_type);
        let value = encrypt_data(data, &self.encryption_key)?;

        Ok(Cookie::build(self.cookie_name(cookie_type), value)
            .http_only(options.http_only)
            .secure(options.secure)
            .same_site(options.same_site)
            .path(options.path)
            .max_age(options.max_age)
            .finish())
    }

    /// Create the short-lived cookie holding state and code verifier
    ///
    /// # Errors
    ///
    /// Returns `Internal` if encryption fails
    pub fn create_temp_login_cookie(
        &self,
        login_data: &TempLoginData,
    ) -> Result<Cookie<'static>, OAuthAgentError> {
        self.create_cookie(CookieType::TempLogin, login_data)
            .map_err(|e| OAuthAgentError::Internal(format!("Failed to encrypt login cookie: {e}")))
    }

    /// Create the AT cookie plus RT and ID cookies for whichever tokens are present
    ///
    /// The ID cookie stores only the payload segment of the ID token.
    ///
    /// # Errors
    ///
    /// - `InvalidIdToken` if the ID token is not a three part JWT
    /// - `Internal` if encryption fails
    pub fn create_token_cookies(
        &self,
        tokens: &TokenSet,
    ) -> Result<Vec<Cookie<'static>>, OAuthAgentError> {
        let encryption_failed =
            |e: anyhow::Error| OAuthAgentError::Internal(format!("Failed to encrypt token cookie: {e}"));

        let mut cookies = vec![self
            .create_cookie(CookieType::AccessToken, &tokens.access_token)
            .map_err(encryption_failed)?];

        if let Some(refresh_token) = &tokens.refresh_token {
            cookies.push(
                self.create_cookie(CookieType::RefreshToken, refresh_token)
                    .map_err(encryption_failed)?,
            );
        }

        if let Some(id_token) = &tokens.id_token {
            let payload = id_token_payload_segment(id_token)?;
            cookies.push(
                self.create_cookie(CookieType::IdToken, &payload)
                    .map_err(encryption_failed)?,
            );
        }

        debug!(
            "Created {} token cookie(s), secure={}",
            cookies.len(),
            self.cookie_secure
        );
        Ok(cookies)
    }

    /// Create a cookie that makes the browser drop the given cookie
    #[must_use]
    pub fn create_removal_cookie(&self, cookie_type: CookieType) -> Cookie<'static> {
        create_expired_cookie(
            &self.cookie_name(cookie_type),
            &self.cookie_path(cookie_type),
            self.cookie_secure,
        )
    }

    /// Removal cookies for the AT, RT and ID cookies
    #[must_use]
    pub fn create_token_removal_cookies(&self) -> Vec<Cookie<'static>> {
        [
            CookieType::AccessToken,
            CookieType::RefreshToken,
            CookieType::IdToken,
        ]
        .into_iter()
        .map(|cookie_type| self.create_removal_cookie(cookie_type))
        .collect()
    }

    fn read_cookie<T: DeserializeOwned>(
        &self,
        req: &HttpRequest,
        cookie_type: CookieType,
    ) -> Result<T, OAuthAgentError> {
        let name = self.cookie_name(cookie_type);
        let cookie = req
            .cookie(&name)
            .filter(|cookie| !cookie.value().is_empty())
            .ok_or_else(|| OAuthAgentError::missing_cookie(&name, "cookie not sent"))?;

        decrypt_data::<T>(cookie.value(), &self.encryption_key)
            .map_err(|e| OAuthAgentError::undecryptable_cookie(&name, e))
    }

    /// Read the login-in-progress data
    ///
    /// # Errors
    ///
    /// Returns `InvalidCookie` if the cookie is missing or cannot be decrypted
    pub fn read_temp_login_data(&self, req: &HttpRequest) -> Result<TempLoginData, OAuthAgentError> {
        self.read_cookie(req, CookieType::TempLogin)
    }

    /// Read the refresh token
    ///
    /// # Errors
    ///
    /// Returns `InvalidCookie` if the cookie is missing or cannot be decrypted
    pub fn read_refresh_token(&self, req: &HttpRequest) -> Result<String, OAuthAgentError> {
        self.read_cookie(req, CookieType::RefreshToken)
    }

    /// Read the ID token claims stored at login
    ///
    /// # Errors
    ///
    /// Returns `InvalidCookie` if the cookie is missing, cannot be decrypted
    /// or does not hold a JSON claims object
    pub fn read_id_claims(&self, req: &HttpRequest) -> Result<IdTokenClaims, OAuthAgentError> {
        let name = self.cookie_name(CookieType::IdToken);
        let payload: String = self.read_cookie(req, CookieType::IdToken)?;

        match decode_jwt_payload(&payload) {
            Ok(serde_json::Value::Object(claims)) => Ok(IdTokenClaims(claims)),
            Ok(_) => Err(OAuthAgentError::undecryptable_cookie(
                &name,
                "ID token payload is not a JSON object",
            )),
            Err(e) => Err(OAuthAgentError::undecryptable_cookie(&name, e)),
        }
    }

    /// Session as seen from the ID cookie; unusable cookies count as anonymous
    #[must_use]
    pub fn session_state(&self, req: &HttpRequest) -> SessionState {
        match self.read_id_claims(req) {
            Ok(claims) => SessionState::Authenticated(claims),
            Err(OAuthAgentError::InvalidCookie { fault, name, .. }) => {
                debug!("No usable ID cookie '{name}' ({fault:?}), session is anonymous");
                SessionState::Anonymous
            }
            Err(e) => {
                warn!("Unexpected failure reading the ID cookie: {e}");
                SessionState::Anonymous
            }
        }
    }
}

/// Middle segment of a compact JWT
///
/// # Errors
///
/// Returns `InvalidIdToken` if the token does not have three segments
pub fn id_token_payload_segment(id_token: &str) -> Result<String, OAuthAgentError> {
    let parts: Vec<&str> = id_token.split('.').collect();
    match parts.as_slice() {
        [_, payload, _] if !payload.is_empty() => Ok((*payload).to_string()),
        _ => Err(OAuthAgentError::InvalidIdToken(JwtValidationError::InvalidToken(
            "ID token is not a compact JWT".to_string(),
        ))),
    }
}

/// Create an expired cookie to clear a specific cookie on a specific path
#[must_use]
pub fn create_expired_cookie(name: &str, path: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(name.to_owned(), "")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path(path.to_owned())
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{constants::TEST_COOKIE_PREFIX, TestFixtures};
    use actix_web::test::TestRequest;
    use base64::{engine::general_purpose, Engine as _};
    use serde_json::json;

    fn id_token_with_payload(claims: &serde_json::Value) -> String {
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("eyJhbGciOiJSUzI1NiJ9.{payload}.c2lnbmF0dXJl")
    }

    fn tokens() -> TokenSet {
        TokenSet {
            access_token: "at-value".to_string(),
            refresh_token: Some("rt-value".to_string()),
            id_token: Some(id_token_with_payload(&json!({"sub": "alice"}))),
        }
    }

    #[test]
    fn test_cookie_names_and_paths() {
        let factory = TestFixtures::cookie_factory();

        assert_eq!(
            factory.cookie_name(CookieType::AccessToken),
            format!("{TEST_COOKIE_PREFIX}-at")
        );
        assert_eq!(
            factory.cookie_name(CookieType::TempLogin),
            format!("{TEST_COOKIE_PREFIX}-login")
        );
        assert_eq!(factory.cookie_path(CookieType::AccessToken), "/api");
        assert_eq!(
            factory.cookie_path(CookieType::RefreshToken),
            "/oauth-agent/refresh"
        );
        assert_eq!(factory.cookie_path(CookieType::IdToken), "/oauth-agent/");
        assert_eq!(factory.cookie_path(CookieType::TempLogin), "/oauth-agent/");
    }

    #[test]
    fn test_token_cookie_attributes() {
        let factory = TestFixtures::cookie_factory();
        let cookies = factory.create_token_cookies(&tokens()).unwrap();

        assert_eq!(cookies.len(), 3);
        for cookie in &cookies {
            assert_eq!(cookie.http_only(), Some(true));
            assert_eq!(cookie.same_site(), Some(SameSite::Strict));
            assert_eq!(cookie.secure(), Some(false)); // Fixture agent runs on http://
            assert_eq!(cookie.max_age(), Some(Duration::hours(24)));
            assert_ne!(cookie.value(), "at-value");
            assert_ne!(cookie.value(), "rt-value");
        }
        assert_eq!(cookies[0].path(), Some("/api"));
        assert_eq!(cookies[1].path(), Some("/oauth-agent/refresh"));
        assert_eq!(cookies[2].path(), Some("/oauth-agent/"));
    }

    #[test]
    fn test_secure_flag_for_https_agent() {
        let factory = CookieFactory::new(
            [1u8; 32],
            "example",
            "/oauth-agent",
            "/api",
            true,
            24,
        );
        let cookie = factory
            .create_temp_login_cookie(&TempLoginData {
                state: "s".to_string(),
                code_verifier: "v".to_string(),
            })
            .unwrap();

        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(
            cookie.max_age(),
            Some(Duration::minutes(TEMP_LOGIN_COOKIE_MINUTES))
        );
    }

    #[test]
    fn test_oversized_max_age_is_capped() {
        let factory = CookieFactory::new([1u8; 32], "example", "/oauth-agent", "/api", false, u64::MAX);
        let cookies = factory.create_token_cookies(&tokens()).unwrap();

        let capped = i64::try_from(MAX_COOKIE_MAX_AGE_HOURS).unwrap();
        assert!(cookies
            .iter()
            .all(|cookie| cookie.max_age() == Some(Duration::hours(capped))));
    }

    #[test]
    fn test_token_cookies_without_optional_tokens() {
        let factory = TestFixtures::cookie_factory();
        let cookies = factory
            .create_token_cookies(&TokenSet {
                access_token: "at".to_string(),
                refresh_token: None,
                id_token: None,
            })
            .unwrap();

        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name(), factory.cookie_name(CookieType::AccessToken));
    }

    #[test]
    fn test_malformed_id_token_is_rejected() {
        let factory = TestFixtures::cookie_factory();
        let err = factory
            .create_token_cookies(&TokenSet {
                access_token: "at".to_string(),
                refresh_token: None,
                id_token: Some("not-a-jwt".to_string()),
            })
            .unwrap_err();

        assert!(matches!(err, OAuthAgentError::InvalidIdToken(_)));
    }

    #[test]
    fn test_removal_cookies_match_paths() {
        let factory = TestFixtures::cookie_factory();
        let removals = factory.create_token_removal_cookies();

        assert_eq!(removals.len(), 3);
        for (removal, cookie_type) in removals.iter().zip([
            CookieType::AccessToken,
            CookieType::RefreshToken,
            CookieType::IdToken,
        ]) {
            assert_eq!(removal.name(), factory.cookie_name(cookie_type));
            assert_eq!(removal.value(), "");
            assert_eq!(removal.path(), Some(factory.cookie_path(cookie_type).as_str()));
            assert_eq!(removal.max_age(), Some(Duration::ZERO));
        }
    }

    #[test]
    fn test_read_cookies_round_trip() {
        let factory = TestFixtures::cookie_factory();
        let cookies = factory.create_token_cookies(&tokens()).unwrap();
        let login = factory
            .create_temp_login_cookie(&TempLoginData {
                state: "state-1".to_string(),
                code_verifier: "verifier-1".to_string(),
            })
            .unwrap();

        let mut request = TestRequest::default().cookie(login);
        for cookie in cookies {
            request = request.cookie(cookie);
        }
        let req = request.to_http_request();

        assert_eq!(factory.read_refresh_token(&req).unwrap(), "rt-value");
        assert_eq!(factory.read_temp_login_data(&req).unwrap().state, "state-1");
        let claims = factory.read_id_claims(&req).unwrap();
        assert_eq!(claims.subject(), Some("alice"));
        assert!(factory.session_state(&req).is_logged_in());
    }

    #[test]
    fn test_missing_and_undecryptable_cookies() {
        let factory = TestFixtures::cookie_factory();
        let name = factory.cookie_name(CookieType::RefreshToken);

        let req = TestRequest::default().to_http_request();
        match factory.read_refresh_token(&req).unwrap_err() {
            OAuthAgentError::InvalidCookie { fault, .. } => {
                assert_eq!(fault, crate::errors::CookieFault::Missing);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(factory.session_state(&req), SessionState::Anonymous);

        let other_key = CookieFactory::new([9u8; 32], TEST_COOKIE_PREFIX, "/oauth-agent", "/api", false, 24);
        let foreign = other_key
            .create_cookie(CookieType::RefreshToken, &"rt")
            .unwrap();
        let req = TestRequest::default()
            .cookie(Cookie::new(name.clone(), foreign.value().to_string()))
            .to_http_request();
        match factory.read_refresh_token(&req).unwrap_err() {
            OAuthAgentError::InvalidCookie { fault, .. } => {
                assert_eq!(fault, crate::errors::CookieFault::Undecryptable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_id_cookie_is_anonymous() {
        let factory = TestFixtures::cookie_factory();
        let req = TestRequest::default()
            .cookie(Cookie::new(factory.cookie_name(CookieType::IdToken), "garbage"))
            .to_http_request();

        assert_eq!(factory.session_state(&req), SessionState::Anonymous);
        assert!(factory.read_id_claims(&req).is_err());
    }
}
