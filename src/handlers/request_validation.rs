// Checks applied to every request before a controller runs
use actix_web::HttpRequest;
use log::warn;

use crate::errors::OAuthAgentError;
use crate::settings::OAuthAgentSettings;

/// Header every call from the SPA must carry
pub const TOKEN_HANDLER_VERSION_HEADER: &str = "token-handler-version";

/// The only supported value of [`TOKEN_HANDLER_VERSION_HEADER`]
pub const TOKEN_HANDLER_VERSION: &str = "1";

/// Validate the version header and, when present, the `Origin` header
///
/// # Errors
///
/// Returns `UnauthorizedRequest` if the version header is missing or has another
/// value, or if the origin is not a trusted web origin
pub fn validate_request(
    req: &HttpRequest,
    settings: &OAuthAgentSettings,
) -> Result<(), OAuthAgentError> {
    let version = req
        .headers()
        .get(TOKEN_HANDLER_VERSION_HEADER)
        .and_then(|value| value.to_str().ok());
    if version != Some(TOKEN_HANDLER_VERSION) {
        warn!(
            "Rejected {} {}: {TOKEN_HANDLER_VERSION_HEADER} header is {version:?}",
            req.method(),
            req.path()
        );
        return Err(OAuthAgentError::UnauthorizedRequest(format!(
            "missing or unsupported {TOKEN_HANDLER_VERSION_HEADER} header"
        )));
    }

    if let Some(origin) = req.headers().get("Origin") {
        let origin = origin
            .to_str()
            .map_err(|_| OAuthAgentError::UnauthorizedRequest("unreadable Origin header".to_string()))?;
        let origin = origin.trim_end_matches('/');
        if !settings
            .get_trusted_web_origins()
            .iter()
            .any(|trusted| trusted == origin)
        {
            warn!("Rejected {} {} from untrusted origin {origin}", req.method(), req.path());
            return Err(OAuthAgentError::UnauthorizedRequest(format!(
                "origin {origin} is not trusted"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{constants::TEST_WEB_ORIGIN, TestFixtures};
    use actix_web::test::TestRequest;

    fn settings() -> OAuthAgentSettings {
        TestFixtures::settings("http://login.example.local")
    }

    #[test]
    fn test_accepts_version_header_and_trusted_origin() {
        let req = TestRequest::default()
            .insert_header((TOKEN_HANDLER_VERSION_HEADER, "1"))
            .insert_header(("Origin", TEST_WEB_ORIGIN))
            .to_http_request();

        assert!(validate_request(&req, &settings()).is_ok());
    }

    #[test]
    fn test_accepts_missing_origin() {
        let req = TestRequest::default()
            .insert_header((TOKEN_HANDLER_VERSION_HEADER, "1"))
            .to_http_request();

        assert!(validate_request(&req, &settings()).is_ok());
    }

    #[test]
    fn test_rejects_missing_or_wrong_version() {
        let missing = TestRequest::default()
            .insert_header(("Origin", TEST_WEB_ORIGIN))
            .to_http_request();
        let wrong = TestRequest::default()
            .insert_header((TOKEN_HANDLER_VERSION_HEADER, "2"))
            .to_http_request();

        for req in [missing, wrong] {
            let err = validate_request(&req, &settings()).unwrap_err();
            assert_eq!(err.error_code(), "unauthorized_request");
        }
    }

    #[test]
    fn test_rejects_untrusted_origin() {
        let req = TestRequest::default()
            .insert_header((TOKEN_HANDLER_VERSION_HEADER, "1"))
            .insert_header(("Origin", "https://evil.example"))
            .to_http_request();

        let err = validate_request(&req, &settings()).unwrap_err();
        assert!(matches!(err, OAuthAgentError::UnauthorizedRequest(_)));
    }

    #[test]
    fn test_origin_with_trailing_slash_matches() {
        let req = TestRequest::default()
            .insert_header((TOKEN_HANDLER_VERSION_HEADER, "1"))
            .insert_header(("Origin", format!("{TEST_WEB_ORIGIN}/")))
            .to_http_request();

        assert!(validate_request(&req, &settings()).is_ok());
    }
}
