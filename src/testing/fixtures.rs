//! Test fixtures providing pre-built test objects
//!
//! This module provides commonly used test data and configurations as static fixtures,
//! eliminating the need to recreate the same settings and key sets in every test.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};

use crate::oauth::jwt_validation::{
    JsonWebKey, JsonWebKeySet, JwtValidationError, KeyIndex, KeyResolver,
};
use crate::session::CookieFactory;
use crate::settings::{
    ApplicationSettings, CookieSettings, LoggingSettings, OAuthAgentSettings, OAuthSettings,
};

use super::constants::{
    EC_PUBLIC_X, EC_PUBLIC_Y, RSA_PRIVATE_KEY_PEM, TEST_CLIENT_ID, TEST_COOKIE_PREFIX,
    TEST_EC_KID, TEST_ENCRYPTION_KEY, TEST_KID, TEST_WEB_ORIGIN,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Issuer used by [`TestFixtures::settings`] for a given authorization server
    #[must_use]
    pub fn issuer(authorization_server_uri: &str) -> String {
        format!("{authorization_server_uri}/oauth/v2")
    }

    /// Agent settings pointing every OAuth endpoint at `authorization_server_uri`
    #[must_use]
    pub fn settings(authorization_server_uri: &str) -> OAuthAgentSettings {
        let base = Self::issuer(authorization_server_uri);
        OAuthAgentSettings {
            application: ApplicationSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
                endpoints_prefix: "/oauth-agent".to_string(),
                trusted_web_origins: TEST_WEB_ORIGIN.to_string(),
            },
            oauth: OAuthSettings {
                client_id: TEST_CLIENT_ID.to_string(),
                redirect_uri: format!("{TEST_WEB_ORIGIN}/"),
                post_logout_redirect_uri: format!("{TEST_WEB_ORIGIN}/"),
                scope: "openid profile".to_string(),
                authorize_endpoint: format!("{base}/authorize"),
                token_endpoint: format!("{base}/token"),
                jwks_uri: format!("{base}/jwks"),
                end_session_endpoint: format!("{base}/logout"),
                issuer: base.clone(),
                id_token_algorithm: "RS256".to_string(),
                clock_skew_seconds: 10,
                jwks_cache_duration_seconds: 3600,
                http_timeout_seconds: 2,
            },
            cookies: CookieSettings {
                name_prefix: TEST_COOKIE_PREFIX.to_string(),
                encryption_key: general_purpose::STANDARD.encode(TEST_ENCRYPTION_KEY),
                api_cookie_base_path: "/api".to_string(),
                max_age_hours: 24,
            },
            logging: LoggingSettings::default(),
        }
    }

    /// Cookie factory matching [`TestFixtures::settings`]
    #[must_use]
    pub fn cookie_factory() -> CookieFactory {
        CookieFactory::new(
            TEST_ENCRYPTION_KEY,
            TEST_COOKIE_PREFIX,
            "/oauth-agent",
            "/api",
            false,
            24,
        )
    }

    /// Public JWK for a PKCS#8 RSA private key
    ///
    /// # Panics
    ///
    /// Panics if `private_key_pem` is not a valid key
    #[must_use]
    pub fn rsa_jwk(kid: &str, private_key_pem: &str, alg: Option<&str>) -> Value {
        use rsa::pkcs8::DecodePrivateKey;
        use rsa::traits::PublicKeyParts;

        let private_key = rsa::RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .expect("test RSA key should parse");
        let public_key = private_key.to_public_key();

        let mut jwk = json!({
            "kty": "RSA",
            "kid": kid,
            "use": "sig",
            "n": general_purpose::URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            "e": general_purpose::URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        });
        if let Some(alg) = alg {
            jwk["alg"] = json!(alg);
        }
        jwk
    }

    /// Public JWK for the P-256 test key
    #[must_use]
    pub fn ec_jwk(kid: &str) -> Value {
        json!({
            "kty": "EC",
            "kid": kid,
            "use": "sig",
            "alg": "ES256",
            "crv": "P-256",
            "x": EC_PUBLIC_X,
            "y": EC_PUBLIC_Y,
        })
    }

    /// Key set with the primary RSA key and the P-256 key
    #[must_use]
    pub fn jwks() -> Value {
        json!({
            "keys": [
                Self::rsa_jwk(TEST_KID, RSA_PRIVATE_KEY_PEM, Some("RS256")),
                Self::ec_jwk(TEST_EC_KID),
            ]
        })
    }
}

/// Key resolver over a fixed key set, never touching the network
pub struct StaticKeyResolver {
    index: KeyIndex,
}

impl StaticKeyResolver {
    #[must_use]
    pub fn new(keys: Vec<JsonWebKey>) -> Self {
        Self {
            index: KeyIndex::new(keys),
        }
    }

    /// # Panics
    ///
    /// Panics if `jwks` is not a valid key set document
    #[must_use]
    pub fn from_jwks(jwks: &Value) -> Self {
        let jwks: JsonWebKeySet =
            serde_json::from_value(jwks.clone()).expect("test JWKS should deserialize");
        Self::new(jwks.keys)
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve_key(
        &self,
        kid: Option<&str>,
        algorithm: &str,
    ) -> Result<JsonWebKey, JwtValidationError> {
        self.index
            .find(kid, algorithm)
            .cloned()
            .ok_or_else(|| JwtValidationError::KeyNotFound(kid.unwrap_or("<none>").to_string()))
    }
}
