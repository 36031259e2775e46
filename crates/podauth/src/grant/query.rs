use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use smol_str::SmolStr;

use super::{AccessMode, CONSENT_STATUS_EXPLICITLY_GIVEN, SOLID_ACCESS_GRANT};

/// Criteria for looking up grants through the derive endpoint.
///
/// Every field is optional; an empty query matches every explicitly given
/// grant visible to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
#[builder(start_fn = new)]
pub struct GrantQuery {
    /// WebID of the resource owner
    #[builder(into)]
    pub owner_web_id: Option<SmolStr>,
    #[builder(into)]
    pub issuer: Option<SmolStr>,
    #[builder(into)]
    pub purpose: Option<SmolStr>,
    /// Only the first IRI is sent; the derive endpoint matches one resource
    #[builder(default)]
    pub data_iris: Vec<SmolStr>,
    #[builder(default)]
    pub modes: Vec<AccessMode>,
}

impl GrantQuery {
    /// The credential shape posted to the derive endpoint.
    ///
    /// `type` and `hasStatus` are always present. Optional members appear
    /// only when the corresponding criterion is set.
    pub fn to_shape(&self) -> Value {
        let mut consent = json!({ "hasStatus": CONSENT_STATUS_EXPLICITLY_GIVEN });
        if let Some(purpose) = &self.purpose {
            consent["forPurpose"] = json!(purpose);
        }
        if let Some(first) = self.data_iris.first() {
            consent["forPersonalData"] = json!(first);
        }
        if !self.modes.is_empty() {
            consent["mode"] = json!(self.modes);
        }

        let mut subject = json!({ "providedConsent": consent });
        if let Some(owner) = &self.owner_web_id {
            subject["id"] = json!(owner);
        }

        let mut shape = json!({
            "type": [SOLID_ACCESS_GRANT],
            "credentialSubject": subject,
        });
        if let Some(issuer) = &self.issuer {
            shape["issuer"] = json!(issuer);
        }
        shape
    }
}

/// Filter for the grant query endpoint, sent as query parameters.
///
/// Unset members are left out of the query string. `type` is always
/// `SolidAccessGrant`, whatever the caller puts there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(start_fn = new)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrantFilter {
    #[builder(into)]
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<SmolStr>,
    /// `Active`, `Pending`, `Denied`, `Revoked`, ...
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SmolStr>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_agent: Option<SmolStr>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_agent: Option<SmolStr>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<SmolStr>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<SmolStr>,
    /// Duration window such as `P1D`
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_within: Option<SmolStr>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_within: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<SmolStr>,
}

impl AccessGrantFilter {
    /// Merge over the defaults: explicit members win, and `type` is forced.
    pub fn with_defaults(self) -> Self {
        Self {
            credential_type: Some(SOLID_ACCESS_GRANT.into()),
            ..self
        }
    }

    pub fn to_query_string(&self) -> Result<String, serde_html_form::ser::Error> {
        serde_html_form::to_string(self)
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct CredentialResult<T = Value> {
    #[serde(default)]
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<SmolStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<SmolStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<SmolStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<SmolStr>,
}
