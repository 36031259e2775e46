use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use smol_str::SmolStr;

/// Access mode named by a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    Write,
    Append,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "Read",
            AccessMode::Write => "Write",
            AccessMode::Append => "Append",
        }
    }
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A consent credential as returned by the access-grant service.
///
/// Only the members the checks read are typed. The rest of the credential
/// (`@context`, `proof`, ...) is carried in `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub id: SmolStr,
    #[serde(rename = "type", default, deserialize_with = "one_or_many")]
    pub types: Vec<SmolStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<SmolStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<SmolStr>,
    /// ISO 8601 timestamp or bare date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<SmolStr>,
    pub credential_subject: CredentialSubject,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessGrant {
    pub fn consent(&self) -> &ProvidedConsent {
        &self.credential_subject.provided_consent
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSubject {
    /// WebID of the resource owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SmolStr>,
    pub provided_consent: ProvidedConsent,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidedConsent {
    pub has_status: SmolStr,
    /// Resource IRIs, or container IRIs covering everything below them
    #[serde(default, deserialize_with = "one_or_many")]
    pub for_personal_data: Vec<SmolStr>,
    /// Permitted modes. Kept as strings so unknown modes survive a round
    /// trip; they simply never match an [`AccessMode`].
    #[serde(default, deserialize_with = "one_or_many")]
    pub mode: Vec<SmolStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_provided_to: Option<SmolStr>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub for_purpose: Vec<SmolStr>,
}

impl ProvidedConsent {
    pub fn permits(&self, mode: AccessMode) -> bool {
        self.mode.iter().any(|m| m == mode.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(SmolStr),
    Many(Vec<SmolStr>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SmolStr>, D::Error> {
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(one)) => vec![one],
        Some(OneOrMany::Many(many)) => many,
        None => Vec::new(),
    })
}
