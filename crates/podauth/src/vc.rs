//! Client for the access-grant (verifiable credential) service.

use bon::Builder;
use chrono::{DateTime, SecondsFormat, Utc};
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, Request, StatusCode};
use podauth_common::HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Value, json};
use smol_str::SmolStr;
use url::Url;

use crate::config::{OidcConfig, VcConfig};
use crate::error::ConfigError;
use crate::fetch::{
    BearerAuth, CorrelationStamp, FetchError, FetchExt, RequestContext, access_token_fetch,
};
use crate::grant::{
    AccessGrant, AccessGrantFilter, AccessMode, CredentialResult, GrantQuery, SOLID_ACCESS_REQUEST,
};

const JSON: &str = "application/json";

const CREDENTIAL_CONTEXT: [&str; 2] = [
    "https://www.w3.org/2018/credentials/v1",
    "https://schema.inrupt.com/credentials/v1.jsonld",
];

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum VcError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to build request: {0}")]
    #[diagnostic(code(podauth::vc::http_build))]
    HttpBuild(#[from] http::Error),
    #[error("failed to encode query: {0}")]
    #[diagnostic(code(podauth::vc::serde_form))]
    Form(#[from] serde_html_form::ser::Error),
    #[error("invalid credential JSON: {0}")]
    #[diagnostic(code(podauth::vc::serde_json))]
    Json(#[from] serde_json::Error),
    #[error("access-grant service returned {status}: {body}")]
    #[diagnostic(
        code(podauth::vc::http_status),
        help("see the service response for details")
    )]
    HttpStatus { status: StatusCode, body: String },
}

pub type Result<T> = core::result::Result<T, VcError>;

/// A request for access to be sent to a resource owner.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(start_fn = new)]
pub struct AccessRequest {
    pub resources: Vec<SmolStr>,
    /// WebID of the resource owner
    #[builder(into)]
    pub resource_owner: SmolStr,
    pub purpose: Vec<SmolStr>,
    pub expiration_date: Option<DateTime<Utc>>,
    #[builder(default = vec![AccessMode::Read, AccessMode::Write, AccessMode::Append])]
    pub access: Vec<AccessMode>,
}

impl AccessRequest {
    /// The unsigned `SolidAccessRequest` credential posted to the issuer.
    pub fn to_credential(&self) -> Value {
        let mut credential = json!({
            "@context": CREDENTIAL_CONTEXT,
            "type": [SOLID_ACCESS_REQUEST],
            "credentialSubject": {
                "hasConsent": {
                    "mode": self.access,
                    "hasStatus": "ConsentStatusRequested",
                    "forPersonalData": self.resources,
                    "forPurpose": self.purpose,
                    "isConsentForDataSubject": self.resource_owner,
                }
            },
        });
        if let Some(expiration) = self.expiration_date {
            credential["expirationDate"] =
                json!(expiration.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        credential
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DerivedCredentials {
    #[serde(default)]
    verifiable_credential: Vec<AccessGrant>,
}

/// Issues, fetches and queries access grants.
///
/// Calls authenticate with a client-credentials access token from the
/// OIDC provider, except [`VcService::query_access_grants_with`], which
/// sends through a caller-supplied client.
#[derive(Debug, Clone)]
pub struct VcService<C> {
    client: C,
    oidc: Option<OidcConfig>,
    vc: VcConfig,
}

impl<C> VcService<C>
where
    C: HttpClient + Clone + Sync,
{
    pub fn new(client: C, oidc: Option<OidcConfig>, vc: VcConfig) -> Self {
        Self { client, oidc, vc }
    }

    pub fn vc_config(&self) -> &VcConfig {
        &self.vc
    }

    pub fn oidc_config(&self) -> Option<&OidcConfig> {
        self.oidc.as_ref()
    }

    fn authenticated(
        &self,
        operation: &'static str,
        purpose: &'static str,
        correlation_id: Option<&str>,
    ) -> Result<CorrelationStamp<BearerAuth<C, C>>> {
        let oidc = self
            .oidc
            .clone()
            .ok_or(ConfigError::missing("OIDC", operation, purpose))?;
        Ok(access_token_fetch(
            self.client.clone(),
            oidc,
            RequestContext::new(correlation_id.map(SmolStr::new)),
        ))
    }

    /// Ask `request.resource_owner` for access. Returns the issued request
    /// credential.
    #[tracing::instrument(level = "debug", skip_all, fields(resources = request.resources.len()))]
    pub async fn issue_access_request(
        &self,
        request: &AccessRequest,
        correlation_id: Option<&str>,
    ) -> Result<Value> {
        let operation = "VcService::issue_access_request";
        let fetch = self.authenticated(operation, "issue access requests", correlation_id)?;
        let endpoint = required(self.vc.issue_endpoint(), "issue", operation)?;
        let body = serde_json::to_vec(&json!({ "credential": request.to_credential() }))?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(endpoint.as_str())
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, JSON)
            .body(body)?;
        send_json(&fetch, request).await
    }

    /// Fetch one grant by its id, which is also its URL.
    #[tracing::instrument(level = "debug", skip_all, fields(id = %id))]
    pub async fn fetch_access_grant(
        &self,
        id: &str,
        correlation_id: Option<&str>,
    ) -> Result<AccessGrant> {
        let fetch = self.authenticated(
            "VcService::fetch_access_grant",
            "fetch access grant by ID",
            correlation_id,
        )?;
        let request = Request::builder()
            .uri(id)
            .header(ACCEPT, JSON)
            .body(Vec::new())?;
        send_json(&fetch, request).await
    }

    /// Fetch every explicitly given grant matching `query` through the derive
    /// endpoint.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn fetch_access_grants(
        &self,
        correlation_id: Option<&str>,
        query: &GrantQuery,
    ) -> Result<Vec<AccessGrant>> {
        let operation = "VcService::fetch_access_grants";
        let fetch = self.authenticated(operation, "fetch access grants", correlation_id)?;
        let endpoint = required(self.vc.derive_endpoint(), "derive", operation)?;
        let shape = query.to_shape();
        tracing::debug!(%shape, "deriving access grants");
        let body = serde_json::to_vec(&json!({ "verifiableCredential": shape }))?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(endpoint.as_str())
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, JSON)
            .body(body)?;
        let derived: DerivedCredentials = send_json(&fetch, request).await?;
        Ok(derived.verifiable_credential)
    }

    /// Query grants using the service's own client credentials.
    pub async fn query_access_grants(
        &self,
        correlation_id: Option<&str>,
        filter: AccessGrantFilter,
    ) -> Result<CredentialResult<AccessGrant>> {
        let fetch = self.authenticated(
            "VcService::query_access_grants",
            "query access grants without a caller-supplied client",
            correlation_id,
        )?;
        self.query(fetch, filter).await
    }

    /// Query grants through `client`, typically one carrying the end user's
    /// session. Requests are still correlation-stamped.
    pub async fn query_access_grants_with<F>(
        &self,
        client: F,
        correlation_id: Option<&str>,
        filter: AccessGrantFilter,
    ) -> Result<CredentialResult<AccessGrant>>
    where
        F: HttpClient + Sync,
    {
        let fetch =
            client.with_correlation(RequestContext::new(correlation_id.map(SmolStr::new)));
        self.query(fetch, filter).await
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn query<F>(&self, fetch: F, filter: AccessGrantFilter) -> Result<CredentialResult<AccessGrant>>
    where
        F: HttpClient<Error = FetchError> + Sync,
    {
        let mut endpoint = required(
            self.vc.query_endpoint(),
            "query",
            "VcService::query_access_grants",
        )?;
        let filter = filter.with_defaults();
        tracing::debug!(?filter, "querying access grants");
        endpoint.set_query(Some(&filter.to_query_string()?));
        let request = Request::builder()
            .uri(endpoint.as_str())
            .header(ACCEPT, JSON)
            .body(Vec::new())?;
        send_json(&fetch, request).await
    }
}

fn required(endpoint: Option<Url>, name: &'static str, operation: &'static str) -> Result<Url> {
    endpoint.ok_or_else(|| ConfigError::missing_endpoint("VC", name, operation).into())
}

async fn send_json<F, O>(fetch: &F, request: Request<Vec<u8>>) -> Result<O>
where
    F: HttpClient<Error = FetchError>,
    O: DeserializeOwned,
{
    let response = fetch.send_http(request).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(VcError::HttpStatus {
            status,
            body: String::from_utf8_lossy(response.body()).into_owned(),
        });
    }
    Ok(serde_json::from_slice(response.body())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn access_request_defaults_to_every_mode() {
        let request = AccessRequest::new()
            .resources(vec!["https://pod.example/data/".into()])
            .resource_owner("https://alice.example/profile#me")
            .purpose(vec!["https://purpose.example/p".into()])
            .build();
        assert_eq!(
            request.access,
            [AccessMode::Read, AccessMode::Write, AccessMode::Append]
        );
        let credential = request.to_credential();
        assert_eq!(credential["type"], json!(["SolidAccessRequest"]));
        assert!(credential.get("expirationDate").is_none());
        let consent = &credential["credentialSubject"]["hasConsent"];
        assert_eq!(consent["mode"], json!(["Read", "Write", "Append"]));
        assert_eq!(
            consent["isConsentForDataSubject"],
            "https://alice.example/profile#me"
        );
    }

    #[test]
    fn access_request_expiration_is_rfc3339() {
        let request = AccessRequest::new()
            .resources(vec![])
            .resource_owner("https://alice.example/profile#me")
            .purpose(vec![])
            .expiration_date(Utc.with_ymd_and_hms(2027, 1, 2, 3, 4, 5).unwrap())
            .access(vec![AccessMode::Read])
            .build();
        assert_eq!(
            request.to_credential()["expirationDate"],
            "2027-01-02T03:04:05.000Z"
        );
    }
}
