//! Platform assertions: signature verification and the claims the fuel
//! middleware reads from them.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Verify `assertion` against a stack's shared secret and return its raw
/// claims.
///
/// Only the signature is checked. The platform carries token lifetimes inside
/// the claims, so `exp`/`aud` are not enforced here.
pub fn verify_with_secret(
    assertion: &str,
    secret: &str,
) -> Result<Value, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = jsonwebtoken::decode::<Value>(
        assertion,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Issuer of a decoded assertion, if it has one.
pub fn issuer(claims: &Value) -> Option<&str> {
    claims.get("iss").and_then(Value::as_str)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub request: AssertionRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssertionRequest {
    pub user: AssertionUser,
    pub organization: AssertionOrganization,
    #[serde(default)]
    pub application: Option<AssertionApplication>,
    #[serde(default)]
    pub query: Option<AssertionQuery>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionUser {
    pub oauth_token: String,
    pub internal_oauth_token: String,
    pub refresh_token: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
    #[serde(default)]
    pub culture: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionOrganization {
    pub stack_key: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub enterprise_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssertionApplication {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionQuery {
    #[serde(default)]
    pub deep_link: Option<String>,
}

impl AssertionClaims {
    pub fn from_value(claims: Value) -> serde_json::Result<Self> {
        serde_json::from_value(claims)
    }

    pub fn deep_link(&self) -> Option<&str> {
        self.request.query.as_ref()?.deep_link.as_deref()
    }
}

// Organization ids arrive as numbers from some platform versions.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
