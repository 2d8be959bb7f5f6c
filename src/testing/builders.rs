//! Fluent builder for signed test ID tokens
//!
//! Tokens are signed with the fixed keys in [`super::constants`], so they verify
//! against [`super::TestFixtures::jwks`] unless a test deliberately changes that.

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde_json::{json, Map, Value};

use super::constants::{
    EC_PRIVATE_KEY_PEM, RSA_PRIVATE_KEY_PEM, TEST_CLIENT_ID, TEST_EC_KID, TEST_KID,
};

enum TestSigningKey {
    Rsa(&'static str),
    Ec,
}

/// Builder for creating customized ID tokens
pub struct TestIdTokenBuilder {
    algorithm: String,
    kid: Option<String>,
    key: TestSigningKey,
    claims: Map<String, Value>,
}

impl TestIdTokenBuilder {
    /// Create an RS256 token for `issuer` and the test client, valid for five minutes
    #[must_use]
    pub fn new(issuer: &str) -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(issuer));
        claims.insert("aud".to_string(), json!(TEST_CLIENT_ID));
        claims.insert("sub".to_string(), json!("test-user"));
        claims.insert("iat".to_string(), json!(now));
        claims.insert("auth_time".to_string(), json!(now));
        claims.insert("exp".to_string(), json!(now + 300));

        Self {
            algorithm: "RS256".to_string(),
            kid: Some(TEST_KID.to_string()),
            key: TestSigningKey::Rsa(RSA_PRIVATE_KEY_PEM),
            claims,
        }
    }

    /// Set or replace a claim
    #[must_use]
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    #[must_use]
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Set `exp` relative to now; negative values produce an expired token
    #[must_use]
    pub fn expires_in_seconds(self, seconds: i64) -> Self {
        let exp = Utc::now().timestamp() + seconds;
        self.with_claim("exp", json!(exp))
    }

    #[must_use]
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    #[must_use]
    pub fn without_kid(mut self) -> Self {
        self.kid = None;
        self
    }

    /// Sign with another RSA key, keeping the current header
    #[must_use]
    pub fn signed_with(mut self, rsa_private_key_pem: &'static str) -> Self {
        self.key = TestSigningKey::Rsa(rsa_private_key_pem);
        self
    }

    /// Sign as RS512 with the primary RSA key
    #[must_use]
    pub fn rs512(mut self) -> Self {
        self.algorithm = "RS512".to_string();
        self
    }

    /// Sign as ES256 with the P-256 key
    #[must_use]
    pub fn es256(mut self) -> Self {
        self.algorithm = "ES256".to_string();
        self.kid = Some(TEST_EC_KID.to_string());
        self.key = TestSigningKey::Ec;
        self
    }

    /// Build the compact JWT
    ///
    /// # Panics
    ///
    /// Panics if the configured key cannot sign for the configured algorithm
    #[must_use]
    pub fn build(self) -> String {
        let mut header = json!({"alg": self.algorithm, "typ": "JWT"});
        if let Some(kid) = &self.kid {
            header["kid"] = json!(kid);
        }

        let header_b64 = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_b64 =
            general_purpose::URL_SAFE_NO_PAD.encode(Value::Object(self.claims).to_string());
        let message = format!("{header_b64}.{payload_b64}");

        let signature = match self.key {
            TestSigningKey::Rsa(pem) => sign_rsa(&self.algorithm, pem, message.as_bytes()),
            TestSigningKey::Ec => sign_es256(message.as_bytes()),
        };

        format!(
            "{message}.{}",
            general_purpose::URL_SAFE_NO_PAD.encode(signature)
        )
    }
}

fn sign_rsa(algorithm: &str, pem: &str, message: &[u8]) -> Vec<u8> {
    use rsa::pkcs1v15::SigningKey;
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::signature::{SignatureEncoding, Signer};
    use sha2::{Sha256, Sha384, Sha512};

    let private_key = rsa::RsaPrivateKey::from_pkcs8_pem(pem).expect("test RSA key should parse");
    match algorithm {
        "RS256" => SigningKey::<Sha256>::new(private_key).sign(message).to_vec(),
        "RS384" => SigningKey::<Sha384>::new(private_key).sign(message).to_vec(),
        "RS512" => SigningKey::<Sha512>::new(private_key).sign(message).to_vec(),
        other => panic!("RSA key cannot sign {other}"),
    }
}

fn sign_es256(message: &[u8]) -> Vec<u8> {
    use p256::ecdsa::{signature::Signer, Signature, SigningKey};
    use p256::pkcs8::DecodePrivateKey;

    let signing_key =
        SigningKey::from_pkcs8_pem(EC_PRIVATE_KEY_PEM).expect("test EC key should parse");
    let signature: Signature = signing_key.sign(message);
    signature.to_bytes().to_vec()
}
