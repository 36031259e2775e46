//! Grant-guarded access to pod resources.

use http::{Request, Response};
use podauth_common::HttpClient;
use smol_str::SmolStr;
use url::Url;

use crate::config::OidcConfig;
use crate::fetch::{FetchError, RequestContext, id_token_fetch};
use crate::grant::{AccessGrant, AccessMode, ConsentError, validate_access_grant};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum PodError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Consent(#[from] ConsentError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fetch(#[from] FetchError),
    #[error("request URI is not an absolute URL: {0}")]
    #[diagnostic(code(podauth::pod::uri))]
    InvalidUri(#[from] url::ParseError),
    #[error("normalised request URI is not a valid HTTP URI: {0}")]
    #[diagnostic(code(podauth::pod::normalised_uri))]
    NormalisedUri(#[from] http::uri::InvalidUri),
}

/// Sends requests to pod resources once a grant covering them checks out.
///
/// Requests carry the ID token from the OIDC provider as bearer credential.
#[derive(Debug, Clone)]
pub struct PodClient<C> {
    client: C,
    oidc: OidcConfig,
}

impl<C> PodClient<C>
where
    C: HttpClient + Clone + Sync,
{
    pub fn new(client: C, oidc: OidcConfig) -> Self {
        Self { client, oidc }
    }

    /// Validate `grant` for the request URL and `mode`, then send.
    ///
    /// The request goes out with the normalised URL (lowercased host,
    /// resolved dot segments) that the grant was checked against. Nothing
    /// goes over the network, not even a token request, when the grant is
    /// rejected.
    #[tracing::instrument(level = "debug", skip_all, fields(grant = %grant.id, %mode))]
    pub async fn send(
        &self,
        grant: &AccessGrant,
        mode: AccessMode,
        mut request: Request<Vec<u8>>,
        correlation_id: Option<&str>,
    ) -> Result<Response<Vec<u8>>, PodError> {
        let resource = Url::parse(&request.uri().to_string())?;
        validate_access_grant(grant, Some(resource.as_str()), Some(mode), None)?;
        *request.uri_mut() = resource.as_str().parse()?;

        let fetch = id_token_fetch(
            self.client.clone(),
            self.oidc.clone(),
            RequestContext::new(correlation_id.map(SmolStr::new)),
        );
        Ok(fetch.send_http(request).await?)
    }
}
