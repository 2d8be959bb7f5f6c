use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Login-in-progress data carried in the encrypted temporary login cookie
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TempLoginData {
    pub state: String,
    pub code_verifier: String,
}

/// Tokens returned by the authorization server's token endpoint
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// Claim name to JSON value mapping taken from a validated ID token
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct IdTokenClaims(pub Map<String, Value>);

impl IdTokenClaims {
    #[must_use]
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.0.get(claim)
    }

    /// String value of a claim, if present and a string
    #[must_use]
    pub fn get_str(&self, claim: &str) -> Option<&str> {
        self.0.get(claim).and_then(Value::as_str)
    }

    /// Integer value of a claim, if present and numeric
    #[must_use]
    pub fn get_i64(&self, claim: &str) -> Option<i64> {
        self.0.get(claim).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// Audience values, whether the claim is a single string or an array
    #[must_use]
    pub fn audiences(&self) -> Vec<&str> {
        match self.0.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Map<String, Value>> for IdTokenClaims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// What the agent knows about the caller from its cookies
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    Anonymous,
    Authenticated(IdTokenClaims),
}

impl SessionState {
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Extension parameter appended to the authorization request URL
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExtraParam {
    pub key: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartLoginRequest {
    #[serde(default)]
    pub extra_params: Option<Vec<ExtraParam>>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StartLoginResponse {
    pub authorization_request_url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct EndLoginRequest {
    #[serde(default)]
    pub page_url: Option<String>,
}

/// Body returned by the session query and by login end
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub is_logged_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<IdTokenClaims>,
}

impl From<SessionState> for SessionResponse {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Anonymous => Self {
                is_logged_in: false,
                claims: None,
            },
            SessionState::Authenticated(claims) => Self {
                is_logged_in: true,
                claims: Some(claims),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LogoutResponse {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_login_request_accepts_missing_params() {
        let request: StartLoginRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.extra_params.is_none());

        let request: StartLoginRequest = serde_json::from_value(json!({
            "extraParams": [{"key": "ui_locales", "value": "sv"}]
        }))
        .unwrap();
        let params = request.extra_params.unwrap();
        assert_eq!(params[0].key, "ui_locales");
        assert_eq!(params[0].value, "sv");
    }

    #[test]
    fn test_session_response_shape() {
        let anonymous = serde_json::to_value(SessionResponse::from(SessionState::Anonymous)).unwrap();
        assert_eq!(anonymous, json!({"isLoggedIn": false}));

        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!("alice"));
        let state = SessionState::Authenticated(IdTokenClaims(claims));
        assert!(state.is_logged_in());

        let value = serde_json::to_value(SessionResponse::from(state)).unwrap();
        assert_eq!(value["isLoggedIn"], true);
        assert_eq!(value["claims"]["sub"], "alice");
    }

    #[test]
    fn test_claims_audiences() {
        let single: IdTokenClaims = serde_json::from_value(json!({"aud": "spa"})).unwrap();
        let many: IdTokenClaims = serde_json::from_value(json!({"aud": ["api", "spa"]})).unwrap();
        let none = IdTokenClaims::default();

        assert_eq!(single.audiences(), vec!["spa"]);
        assert_eq!(many.audiences(), vec!["api", "spa"]);
        assert!(none.audiences().is_empty());
    }

    #[test]
    fn test_token_set_optional_fields() {
        let tokens: TokenSet = serde_json::from_value(json!({
            "access_token": "at",
            "token_type": "bearer",
            "expires_in": 300
        }))
        .unwrap();
        assert_eq!(tokens.access_token, "at");
        assert!(tokens.refresh_token.is_none());
        assert!(tokens.id_token.is_none());
    }
}
