// ID token validation with a JWKS cache
// Verifies RS256/RS384/RS512/ES256 signatures, then iss, aud, exp and nbf

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

// Cryptographic imports
use p256::{
    ecdsa::{Signature as EcdsaSignature, VerifyingKey as EcdsaVerifyingKey},
    EncodedPoint,
};
use rsa::{pkcs1v15::VerifyingKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};

use crate::models::IdTokenClaims;
use crate::oauth::fetch_jwks;
use crate::settings::OAuthSettings;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug)]
pub enum JwtValidationError {
    KeyNotFound(String),
    SignatureInvalid,
    ClaimValidationFailed {
        claim: String,
        expected: String,
        actual: String,
    },
    AlgorithmMismatch {
        expected: String,
        actual: String,
    },
    JwksFetchFailed(String),
    UnsupportedAlgorithm(String),
    TokenExpired,
    TokenNotYetValid,
    InvalidToken(String),
    KeyDecodingFailed(String),
    CryptographicError(String),
}

impl std::fmt::Display for JwtValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyNotFound(kid) => write!(f, "Key not found: {kid}"),
            Self::SignatureInvalid => write!(f, "JWT signature verification failed"),
            Self::ClaimValidationFailed {
                claim,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Claim '{claim}' validation failed: expected '{expected}', got '{actual}'"
                )
            }
            Self::AlgorithmMismatch { expected, actual } => {
                write!(f, "Token algorithm '{actual}' does not match configured '{expected}'")
            }
            Self::JwksFetchFailed(msg) => write!(f, "Failed to fetch JWKS: {msg}"),
            Self::UnsupportedAlgorithm(alg) => write!(f, "Unsupported algorithm: {alg}"),
            Self::TokenExpired => write!(f, "Token has expired"),
            Self::TokenNotYetValid => write!(f, "Token is not yet valid"),
            Self::InvalidToken(msg) => write!(f, "Invalid token: {msg}"),
            Self::KeyDecodingFailed(msg) => write!(f, "Failed to decode key: {msg}"),
            Self::CryptographicError(msg) => write!(f, "Cryptographic error: {msg}"),
        }
    }
}

impl std::error::Error for JwtValidationError {}

// ============================================================================
// JWT Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: Option<String>,
    pub kid: Option<String>,
}

// ============================================================================
// JWKS Structures
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonWebKey {
    pub kty: String,         // Key type (RSA, EC, etc.)
    pub kid: Option<String>, // Key ID
    pub alg: Option<String>, // Algorithm (RS256, ES256, etc.)
    #[serde(rename = "use")]
    pub key_use: Option<String>, // "sig" for signing

    // RSA keys
    pub n: Option<String>, // Modulus
    pub e: Option<String>, // Exponent

    // EC keys
    pub crv: Option<String>, // Curve
    pub x: Option<String>,   // X coordinate
    pub y: Option<String>,   // Y coordinate
}

impl JsonWebKey {
    /// Whether this key can verify a token signed with `algorithm`
    #[must_use]
    pub fn supports_algorithm(&self, algorithm: &str) -> bool {
        if self.key_use.as_deref().is_some_and(|key_use| key_use != "sig") {
            return false;
        }
        if self.alg.as_deref().is_some_and(|alg| alg != algorithm) {
            return false;
        }
        match algorithm {
            "RS256" | "RS384" | "RS512" => self.kty == "RSA",
            "ES256" => self.kty == "EC" && !matches!(self.crv.as_deref(), Some(crv) if crv != "P-256"),
            _ => false,
        }
    }
}

// ============================================================================
// Key resolution
// ============================================================================

/// Source of verification keys for the validator
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Find the key for a token header's `kid` and `alg`
    async fn resolve_key(
        &self,
        kid: Option<&str>,
        algorithm: &str,
    ) -> Result<JsonWebKey, JwtValidationError>;
}

/// Keys from one key set, indexed by key ID
#[derive(Debug, Default)]
pub struct KeyIndex {
    keys: HashMap<String, JsonWebKey>,
    unnamed: Vec<JsonWebKey>,
}

impl KeyIndex {
    #[must_use]
    pub fn new(keys: Vec<JsonWebKey>) -> Self {
        let mut index = Self::default();
        for key in keys {
            match key.kid.clone() {
                Some(kid) => {
                    index.keys.insert(kid, key);
                }
                None => index.unnamed.push(key),
            }
        }
        index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len() + self.unnamed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a key by ID; without an ID the single compatible key is used
    #[must_use]
    pub fn find(&self, kid: Option<&str>, algorithm: &str) -> Option<&JsonWebKey> {
        if let Some(kid) = kid {
            return self.keys.get(kid);
        }

        let mut candidates = self
            .keys
            .values()
            .chain(self.unnamed.iter())
            .filter(|key| key.supports_algorithm(algorithm));
        match (candidates.next(), candidates.next()) {
            (Some(key), None) => Some(key),
            _ => None,
        }
    }
}

struct CachedKeys {
    index: KeyIndex,
    last_updated: Option<DateTime<Utc>>,
}

/// Cache of the authorization server's signing keys
///
/// Created once at startup and shared between requests. A lookup that misses
/// or finds the cache stale triggers one refetch of the key set.
pub struct JwksCache {
    jwks_uri: String,
    http_client: reqwest::Client,
    cache_duration: Duration,
    cache: RwLock<CachedKeys>,
}

impl JwksCache {
    /// Create an empty cache for the given key set URI
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(
        jwks_uri: &str,
        cache_duration: Duration,
        http_timeout: Duration,
    ) -> Result<Self, JwtValidationError> {
        let http_client = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| JwtValidationError::JwksFetchFailed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            jwks_uri: jwks_uri.to_string(),
            http_client,
            cache_duration,
            cache: RwLock::new(CachedKeys {
                index: KeyIndex::default(),
                last_updated: None,
            }),
        })
    }

    /// Create a cache from OAuth settings
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn from_settings(oauth: &OAuthSettings) -> Result<Self, JwtValidationError> {
        Self::new(
            &oauth.jwks_uri,
            Duration::from_secs(oauth.jwks_cache_duration_seconds),
            Duration::from_secs(oauth.http_timeout_seconds),
        )
    }

    fn is_fresh(&self, last_updated: Option<DateTime<Utc>>) -> bool {
        last_updated.is_some_and(|last_updated| {
            let elapsed = Utc::now().signed_duration_since(last_updated);
            elapsed.to_std().unwrap_or(Duration::MAX) < self.cache_duration
        })
    }

    /// Fetch the key set and replace the cached keys
    ///
    /// # Errors
    ///
    /// Returns `JwksFetchFailed` if the key set cannot be fetched or parsed
    pub async fn refresh_keys(&self) -> Result<(), JwtValidationError> {
        debug!("🔑 Fetching JWKS from {}", self.jwks_uri);

        let jwks = fetch_jwks(&self.http_client, &self.jwks_uri)
            .await
            .map_err(JwtValidationError::JwksFetchFailed)?;

        let index = KeyIndex::new(jwks.keys);
        info!("💾 Cached {} signing key(s) from {}", index.len(), self.jwks_uri);

        let mut cache = self.cache.write().await;
        cache.index = index;
        cache.last_updated = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl KeyResolver for JwksCache {
    async fn resolve_key(
        &self,
        kid: Option<&str>,
        algorithm: &str,
    ) -> Result<JsonWebKey, JwtValidationError> {
        {
            let cache = self.cache.read().await;
            if self.is_fresh(cache.last_updated) {
                if let Some(key) = cache.index.find(kid, algorithm) {
                    debug!("🎯 Found cached key {kid:?}");
                    return Ok(key.clone());
                }
            }
        }

        // Cache miss or expired - refetch once
        self.refresh_keys().await?;

        let cache = self.cache.read().await;
        cache.index.find(kid, algorithm).cloned().ok_or_else(|| {
            warn!("Key {kid:?} not present in the key set after refresh");
            JwtValidationError::KeyNotFound(kid.unwrap_or("<none>").to_string())
        })
    }
}

// ============================================================================
// ID Token Validator
// ============================================================================

/// Expected values for ID token validation
#[derive(Debug, Clone)]
pub struct IdTokenValidationConfig {
    pub issuer: String,
    pub audience: String,
    pub algorithm: String,
    pub clock_skew_seconds: u64,
}

impl IdTokenValidationConfig {
    #[must_use]
    pub fn from_settings(oauth: &OAuthSettings) -> Self {
        Self {
            issuer: oauth.issuer.clone(),
            audience: oauth.client_id.clone(),
            algorithm: oauth.id_token_algorithm.clone(),
            clock_skew_seconds: oauth.clock_skew_seconds,
        }
    }
}

#[derive(Clone)]
pub struct IdTokenValidator {
    config: IdTokenValidationConfig,
    resolver: Arc<dyn KeyResolver>,
}

impl IdTokenValidator {
    #[must_use]
    pub fn new(config: IdTokenValidationConfig, resolver: Arc<dyn KeyResolver>) -> Self {
        Self { config, resolver }
    }

    /// Validate an ID token and return its claims
    ///
    /// Checks run in order: algorithm, signature, issuer, audience, expiry,
    /// not-before. The first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the [`JwtValidationError`] of the first failed check
    pub async fn validate(&self, id_token: &str) -> Result<IdTokenClaims, JwtValidationError> {
        let parts: Vec<&str> = id_token.split('.').collect();
        let &[header_b64, claims_b64, signature_b64] = parts.as_slice() else {
            return Err(JwtValidationError::InvalidToken(
                "Invalid JWT format".to_string(),
            ));
        };

        let header = decode_jwt_header(header_b64)?;
        debug!("📋 ID token header: alg={}, kid={:?}", header.alg, header.kid);

        if header.alg != self.config.algorithm {
            return Err(JwtValidationError::AlgorithmMismatch {
                expected: self.config.algorithm.clone(),
                actual: header.alg,
            });
        }

        let public_key = self
            .resolver
            .resolve_key(header.kid.as_deref(), &header.alg)
            .await?;
        if !public_key.supports_algorithm(&header.alg) {
            return Err(JwtValidationError::KeyDecodingFailed(format!(
                "Key {:?} of type {} cannot verify {}",
                public_key.kid, public_key.kty, header.alg
            )));
        }

        let signature = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| {
                JwtValidationError::InvalidToken(format!("Invalid signature encoding: {e}"))
            })?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        verify_signature(signing_input.as_bytes(), &signature, &header.alg, &public_key)?;
        debug!("✅ ID token signature verified");

        let claims = decode_jwt_claims(claims_b64)?;
        self.validate_claims(&claims, Utc::now().timestamp())?;
        debug!("✅ ID token claims validated for subject {:?}", claims.subject());

        Ok(claims)
    }

    /// Validate iss, aud, exp and nbf against `now` (seconds since the epoch)
    ///
    /// # Errors
    ///
    /// Returns the first failed claim check
    pub fn validate_claims(&self, claims: &IdTokenClaims, now: i64) -> Result<(), JwtValidationError> {
        let clock_skew = i64::try_from(self.config.clock_skew_seconds).unwrap_or(0);

        let issuer = claims.get_str("iss");
        if issuer != Some(self.config.issuer.as_str()) {
            return Err(JwtValidationError::ClaimValidationFailed {
                claim: "iss".to_string(),
                expected: self.config.issuer.clone(),
                actual: issuer.unwrap_or("<missing>").to_string(),
            });
        }

        let audiences = claims.audiences();
        if !audiences.contains(&self.config.audience.as_str()) {
            return Err(JwtValidationError::ClaimValidationFailed {
                claim: "aud".to_string(),
                expected: self.config.audience.clone(),
                actual: format!("{audiences:?}"),
            });
        }

        let Some(exp) = claims.get_i64("exp") else {
            return Err(JwtValidationError::ClaimValidationFailed {
                claim: "exp".to_string(),
                expected: "a numeric expiry time".to_string(),
                actual: "<missing>".to_string(),
            });
        };
        if now > exp.saturating_add(clock_skew) {
            return Err(JwtValidationError::TokenExpired);
        }

        if let Some(nbf) = claims.get_i64("nbf") {
            if now < nbf.saturating_sub(clock_skew) {
                return Err(JwtValidationError::TokenNotYetValid);
            }
        }

        Ok(())
    }
}

/// Decode JWT header from base64
fn decode_jwt_header(header_b64: &str) -> Result<JwtHeader, JwtValidationError> {
    let header_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|e| JwtValidationError::InvalidToken(format!("Invalid header encoding: {e}")))?;

    serde_json::from_slice(&header_bytes)
        .map_err(|e| JwtValidationError::InvalidToken(format!("Invalid header JSON: {e}")))
}

/// Decode JWT claims from base64
fn decode_jwt_claims(claims_b64: &str) -> Result<IdTokenClaims, JwtValidationError> {
    let claims_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|e| JwtValidationError::InvalidToken(format!("Invalid claims encoding: {e}")))?;

    serde_json::from_slice(&claims_bytes)
        .map_err(|e| JwtValidationError::InvalidToken(format!("Invalid claims JSON: {e}")))
}

/// Verify a JWS signature over `signing_input`
fn verify_signature(
    signing_input: &[u8],
    signature: &[u8],
    algorithm: &str,
    public_key: &JsonWebKey,
) -> Result<(), JwtValidationError> {
    match algorithm {
        "RS256" | "RS384" | "RS512" => {
            verify_rsa_signature(signing_input, signature, algorithm, public_key)
        }
        "ES256" => verify_ecdsa_signature(signing_input, signature, public_key),
        alg => Err(JwtValidationError::UnsupportedAlgorithm(alg.to_string())),
    }
}

fn decode_key_component(value: Option<&String>, name: &str) -> Result<Vec<u8>, JwtValidationError> {
    let value = value.ok_or_else(|| JwtValidationError::KeyDecodingFailed(format!("Missing {name}")))?;
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| JwtValidationError::KeyDecodingFailed(format!("Invalid {name} encoding: {e}")))
}

/// Verify RSA PKCS#1 v1.5 signature (RS256, RS384, RS512)
fn verify_rsa_signature(
    signing_input: &[u8],
    signature: &[u8],
    algorithm: &str,
    public_key: &JsonWebKey,
) -> Result<(), JwtValidationError> {
    use rsa::signature::Verifier;

    let n_bytes = decode_key_component(public_key.n.as_ref(), "RSA modulus (n)")?;
    let e_bytes = decode_key_component(public_key.e.as_ref(), "RSA exponent (e)")?;

    let rsa_key = RsaPublicKey::new(
        rsa::BigUint::from_bytes_be(&n_bytes),
        rsa::BigUint::from_bytes_be(&e_bytes),
    )
    .map_err(|e| JwtValidationError::KeyDecodingFailed(format!("Invalid RSA key: {e}")))?;

    let signature = rsa::pkcs1v15::Signature::try_from(signature).map_err(|e| {
        JwtValidationError::CryptographicError(format!("Invalid signature format: {e}"))
    })?;

    let result = match algorithm {
        "RS256" => VerifyingKey::<Sha256>::new(rsa_key).verify(signing_input, &signature),
        "RS384" => VerifyingKey::<Sha384>::new(rsa_key).verify(signing_input, &signature),
        "RS512" => VerifyingKey::<Sha512>::new(rsa_key).verify(signing_input, &signature),
        alg => return Err(JwtValidationError::UnsupportedAlgorithm(alg.to_string())),
    };

    result.map_err(|_| JwtValidationError::SignatureInvalid)
}

/// Verify ECDSA P-256 signature (ES256)
///
/// JWS carries the signature as the raw 64 byte `r || s` concatenation.
fn verify_ecdsa_signature(
    signing_input: &[u8],
    signature: &[u8],
    public_key: &JsonWebKey,
) -> Result<(), JwtValidationError> {
    use p256::ecdsa::signature::Verifier;

    let x_bytes = decode_key_component(public_key.x.as_ref(), "ECDSA x coordinate")?;
    let y_bytes = decode_key_component(public_key.y.as_ref(), "ECDSA y coordinate")?;

    // Uncompressed point format: 0x04 + x + y
    let mut point_bytes = vec![0x04];
    point_bytes.extend_from_slice(&x_bytes);
    point_bytes.extend_from_slice(&y_bytes);

    let encoded_point = EncodedPoint::from_bytes(&point_bytes)
        .map_err(|e| JwtValidationError::KeyDecodingFailed(format!("Invalid EC point: {e}")))?;
    let verifying_key = EcdsaVerifyingKey::from_encoded_point(&encoded_point)
        .map_err(|e| JwtValidationError::KeyDecodingFailed(format!("Invalid ECDSA key: {e}")))?;

    let signature = EcdsaSignature::from_slice(signature).map_err(|e| {
        JwtValidationError::CryptographicError(format!("Invalid signature format: {e}"))
    })?;

    verifying_key
        .verify(signing_input, &signature)
        .map_err(|_| JwtValidationError::SignatureInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::constants::{
        RSA_PRIVATE_KEY_PEM, RSA_SECONDARY_PRIVATE_KEY_PEM, TEST_CLIENT_ID, TEST_KID,
        TEST_ROTATED_KID,
    };
    use crate::testing::{StaticKeyResolver, TestFixtures, TestIdTokenBuilder};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ISSUER: &str = "http://login.example.local/oauth/v2";

    fn validator_with(resolver: Arc<dyn KeyResolver>, algorithm: &str) -> IdTokenValidator {
        IdTokenValidator::new(
            IdTokenValidationConfig {
                issuer: ISSUER.to_string(),
                audience: TEST_CLIENT_ID.to_string(),
                algorithm: algorithm.to_string(),
                clock_skew_seconds: 10,
            },
            resolver,
        )
    }

    fn rsa_validator() -> IdTokenValidator {
        validator_with(Arc::new(StaticKeyResolver::from_jwks(&TestFixtures::jwks())), "RS256")
    }

    fn jwks_cache(server: &MockServer) -> Arc<JwksCache> {
        Arc::new(
            JwksCache::new(
                &format!("{}/oauth/v2/jwks", server.uri()),
                Duration::from_secs(3600),
                Duration::from_secs(2),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_valid_rs256_token() {
        let token = TestIdTokenBuilder::new(ISSUER).build();
        let claims = rsa_validator().validate(&token).await.unwrap();

        assert_eq!(claims.subject(), Some("test-user"));
        assert_eq!(claims.get_str("iss"), Some(ISSUER));
    }

    #[tokio::test]
    async fn test_audience_array_is_accepted() {
        let token = TestIdTokenBuilder::new(ISSUER)
            .with_claim("aud", json!(["api.example.local", TEST_CLIENT_ID]))
            .build();
        assert!(rsa_validator().validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_audience_mismatch() {
        let token = TestIdTokenBuilder::new(ISSUER)
            .with_claim("aud", json!("another-client"))
            .build();
        let err = rsa_validator().validate(&token).await.unwrap_err();

        assert!(matches!(
            err,
            JwtValidationError::ClaimValidationFailed { ref claim, .. } if claim == "aud"
        ));
    }

    #[tokio::test]
    async fn test_wrong_issuer() {
        let token = TestIdTokenBuilder::new("http://evil.example.local").build();
        let err = rsa_validator().validate(&token).await.unwrap_err();

        assert!(matches!(
            err,
            JwtValidationError::ClaimValidationFailed { ref claim, .. } if claim == "iss"
        ));
    }

    #[tokio::test]
    async fn test_expired_beyond_skew() {
        let token = TestIdTokenBuilder::new(ISSUER).expires_in_seconds(-60).build();
        let err = rsa_validator().validate(&token).await.unwrap_err();
        assert!(matches!(err, JwtValidationError::TokenExpired));
    }

    #[test]
    fn test_clock_skew_window() {
        let validator = rsa_validator();
        let claims: IdTokenClaims = serde_json::from_value(json!({
            "iss": ISSUER,
            "aud": TEST_CLIENT_ID,
            "exp": 1_000,
            "nbf": 900
        }))
        .unwrap();

        assert!(validator.validate_claims(&claims, 1_010).is_ok());
        assert!(matches!(
            validator.validate_claims(&claims, 1_011),
            Err(JwtValidationError::TokenExpired)
        ));
        assert!(validator.validate_claims(&claims, 890).is_ok());
        assert!(matches!(
            validator.validate_claims(&claims, 889),
            Err(JwtValidationError::TokenNotYetValid)
        ));
    }

    #[tokio::test]
    async fn test_missing_exp_is_rejected() {
        let token = TestIdTokenBuilder::new(ISSUER).without_claim("exp").build();
        let err = rsa_validator().validate(&token).await.unwrap_err();
        assert!(matches!(
            err,
            JwtValidationError::ClaimValidationFailed { ref claim, .. } if claim == "exp"
        ));
    }

    #[tokio::test]
    async fn test_algorithm_mismatch() {
        let token = TestIdTokenBuilder::new(ISSUER).es256().build();
        let err = rsa_validator().validate(&token).await.unwrap_err();
        assert!(matches!(err, JwtValidationError::AlgorithmMismatch { .. }));
    }

    #[tokio::test]
    async fn test_signature_from_wrong_key() {
        let token = TestIdTokenBuilder::new(ISSUER)
            .signed_with(RSA_SECONDARY_PRIVATE_KEY_PEM)
            .build();
        let err = rsa_validator().validate(&token).await.unwrap_err();
        assert!(matches!(err, JwtValidationError::SignatureInvalid));
    }

    #[tokio::test]
    async fn test_tampered_payload() {
        let token = TestIdTokenBuilder::new(ISSUER).build();
        let other = TestIdTokenBuilder::new(ISSUER)
            .with_claim("sub", json!("mallory"))
            .build();
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        let err = rsa_validator().validate(&tampered).await.unwrap_err();
        assert!(matches!(err, JwtValidationError::SignatureInvalid));
    }

    #[tokio::test]
    async fn test_malformed_tokens() {
        let validator = rsa_validator();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(validator.validate(token).await.is_err(), "accepted {token:?}");
        }
    }

    #[tokio::test]
    async fn test_valid_es256_token() {
        let resolver = StaticKeyResolver::from_jwks(&TestFixtures::jwks());
        let validator = validator_with(Arc::new(resolver), "ES256");
        let token = TestIdTokenBuilder::new(ISSUER).es256().build();

        let claims = validator.validate(&token).await.unwrap();
        assert_eq!(claims.subject(), Some("test-user"));
    }

    #[tokio::test]
    async fn test_rs512_token() {
        let resolver = StaticKeyResolver::from_jwks(&json!({
            "keys": [TestFixtures::rsa_jwk(TEST_KID, RSA_PRIVATE_KEY_PEM, Some("RS512"))]
        }));
        let validator = validator_with(Arc::new(resolver), "RS512");
        let token = TestIdTokenBuilder::new(ISSUER).rs512().build();

        assert!(validator.validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_key_with_other_algorithm_is_rejected() {
        let resolver = StaticKeyResolver::from_jwks(&json!({
            "keys": [TestFixtures::rsa_jwk(TEST_KID, RSA_PRIVATE_KEY_PEM, Some("RS512"))]
        }));
        let validator = validator_with(Arc::new(resolver), "RS256");
        let token = TestIdTokenBuilder::new(ISSUER).build();

        let err = validator.validate(&token).await.unwrap_err();
        assert!(matches!(err, JwtValidationError::KeyDecodingFailed(_)));
    }

    #[test]
    fn test_key_index_without_kid_uses_single_compatible_key() {
        let jwks: JsonWebKeySet = serde_json::from_value(TestFixtures::jwks()).unwrap();
        let index = KeyIndex::new(jwks.keys);

        assert_eq!(index.find(Some(TEST_KID), "RS256").map(|k| k.kty.as_str()), Some("RSA"));
        assert_eq!(index.find(None, "ES256").map(|k| k.kty.as_str()), Some("EC"));
        assert!(index.find(None, "RS256").is_some());
        assert!(index.find(Some("unknown"), "RS256").is_none());
    }

    #[tokio::test]
    async fn test_jwks_cache_fetches_once_while_fresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/v2/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestFixtures::jwks()))
            .expect(1)
            .mount(&server)
            .await;

        let validator = validator_with(jwks_cache(&server), "RS256");
        let token = TestIdTokenBuilder::new(ISSUER).build();

        assert!(validator.validate(&token).await.is_ok());
        assert!(validator.validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_jwks_cache_refetches_on_unknown_kid() {
        let server = MockServer::start().await;
        let initial = json!({
            "keys": [TestFixtures::rsa_jwk(TEST_KID, RSA_PRIVATE_KEY_PEM, Some("RS256"))]
        });
        let rotated = json!({
            "keys": [
                TestFixtures::rsa_jwk(TEST_KID, RSA_PRIVATE_KEY_PEM, Some("RS256")),
                TestFixtures::rsa_jwk(TEST_ROTATED_KID, RSA_SECONDARY_PRIVATE_KEY_PEM, Some("RS256"))
            ]
        });
        Mock::given(method("GET"))
            .and(path("/oauth/v2/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(initial))
            .up_to_n_times(1)
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oauth/v2/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rotated))
            .expect(1)
            .mount(&server)
            .await;

        let validator = validator_with(jwks_cache(&server), "RS256");
        let first = TestIdTokenBuilder::new(ISSUER).build();
        let rotated_token = TestIdTokenBuilder::new(ISSUER)
            .with_kid(TEST_ROTATED_KID)
            .signed_with(RSA_SECONDARY_PRIVATE_KEY_PEM)
            .build();

        assert!(validator.validate(&first).await.is_ok());
        assert!(validator.validate(&rotated_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_jwks_cache_unknown_kid_after_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/v2/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestFixtures::jwks()))
            .expect(1)
            .mount(&server)
            .await;

        let validator = validator_with(jwks_cache(&server), "RS256");
        let token = TestIdTokenBuilder::new(ISSUER).with_kid("retired-key").build();

        let err = validator.validate(&token).await.unwrap_err();
        assert!(matches!(err, JwtValidationError::KeyNotFound(ref kid) if kid == "retired-key"));
    }

    #[tokio::test]
    async fn test_jwks_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let validator = validator_with(jwks_cache(&server), "RS256");
        let token = TestIdTokenBuilder::new(ISSUER).build();

        let err = validator.validate(&token).await.unwrap_err();
        assert!(matches!(err, JwtValidationError::JwksFetchFailed(_)));
    }
}
