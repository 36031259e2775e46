//! Connection settings for the OIDC provider and the access-grant service.
//!
//! Both types are plain values: build them once, share them (they are cheap
//! to clone) and never mutate them afterwards. Endpoints are derived by
//! replacing the path of the base URL with the configured path.

use bon::Builder;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use url::Url;

/// OIDC provider configuration used for token acquisition.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(start_fn = new)]
#[serde(rename_all = "camelCase")]
pub struct OidcConfig {
    /// Base URL of the provider
    pub url: Url,
    #[builder(into)]
    pub client_id: SmolStr,
    #[builder(into)]
    pub client_secret: SmolStr,
    #[builder(into)]
    pub login_path: Option<SmolStr>,
    #[builder(into)]
    pub token_path: Option<SmolStr>,
    /// Where the provider sends the user back after an interactive login
    pub redirect_endpoint: Option<Url>,
    #[builder(into)]
    pub client_name: Option<SmolStr>,
}

impl OidcConfig {
    pub fn login_endpoint(&self) -> Option<Url> {
        endpoint(&self.url, self.login_path.as_deref())
    }

    pub fn token_endpoint(&self) -> Option<Url> {
        endpoint(&self.url, self.token_path.as_deref())
    }
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("url", &self.url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("login_path", &self.login_path)
            .field("token_path", &self.token_path)
            .field("redirect_endpoint", &self.redirect_endpoint.as_ref().map(Url::as_str))
            .field("client_name", &self.client_name)
            .finish()
    }
}

/// Access-grant (verifiable credential) service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(start_fn = new)]
#[serde(rename_all = "camelCase")]
pub struct VcConfig {
    pub url: Url,
    #[builder(into)]
    pub issue_path: Option<SmolStr>,
    #[builder(into)]
    pub derive_path: Option<SmolStr>,
    #[builder(into)]
    pub query_path: Option<SmolStr>,
}

impl VcConfig {
    pub fn issue_endpoint(&self) -> Option<Url> {
        endpoint(&self.url, self.issue_path.as_deref())
    }

    pub fn derive_endpoint(&self) -> Option<Url> {
        endpoint(&self.url, self.derive_path.as_deref())
    }

    pub fn query_endpoint(&self) -> Option<Url> {
        endpoint(&self.url, self.query_path.as_deref())
    }
}

fn endpoint(base: &Url, path: Option<&str>) -> Option<Url> {
    let path = path.filter(|p| !p.is_empty())?;
    let mut url = base.clone();
    url.set_path(path);
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oidc() -> OidcConfig {
        OidcConfig::new()
            .url(Url::parse("https://idp.example/ignored").unwrap())
            .client_id("client")
            .client_secret("s3cret")
            .token_path("/oauth2/token")
            .build()
    }

    #[test]
    fn token_endpoint_replaces_path() {
        assert_eq!(
            oidc().token_endpoint().unwrap().as_str(),
            "https://idp.example/oauth2/token"
        );
        assert!(oidc().login_endpoint().is_none());
    }

    #[test]
    fn vc_endpoints_are_independent() {
        let vc = VcConfig::new()
            .url(Url::parse("https://vc.example").unwrap())
            .issue_path("/issue")
            .derive_path("/derive")
            .build();
        assert_eq!(vc.issue_endpoint().unwrap().path(), "/issue");
        assert_eq!(vc.derive_endpoint().unwrap().path(), "/derive");
        assert!(vc.query_endpoint().is_none());
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", oidc());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn deserializes_from_camel_case() {
        let config: OidcConfig = serde_json::from_value(serde_json::json!({
            "url": "https://idp.example",
            "clientId": "client",
            "clientSecret": "secret",
            "tokenPath": "/token"
        }))
        .unwrap();
        assert_eq!(config.token_endpoint().unwrap().path(), "/token");
        assert!(config.redirect_endpoint.is_none());
    }
}
