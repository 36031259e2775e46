use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smol_str::SmolStr;

/// Token endpoint response as returned by the provider.
///
/// Nothing here is required: error responses decode into the same shape,
/// with `error` and `error_description` set. Members we do not model are
/// kept in `extra`.
// https://datatracker.ietf.org/doc/html/rfc6749#section-5.1
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TokenResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<SmolStr>,
    /// Kept as sent; some providers send a string or a float here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<SmolStr>,
    // https://datatracker.ietf.org/doc/html/rfc6749#section-5.2
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<SmolStr>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// `expires_in` in whole seconds, whether it came as a number or a
    /// numeric string.
    pub fn expires_in_secs(&self) -> Option<i64> {
        match self.expires_in.as_ref()? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
            _ => None,
        }
    }
}
