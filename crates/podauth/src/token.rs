//! Token acquisition against the OIDC provider's token endpoint.

use http::{Method, Request, StatusCode, header::CONTENT_TYPE};
use podauth_common::{BoxError, HttpClient};
use smol_str::{SmolStr, format_smolstr};
use url::Url;

use crate::config::OidcConfig;
use crate::dpop::{DpopError, DpopProof, build_dpop_proof};
use crate::error::ConfigError;
use crate::keys::KeyPair;
use crate::types::{
    AuthorizationCodeExchange, AuthorizationCodeParameters, ClientCredentialsParameters,
    TokenGrantType, TokenResponse,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Token request error
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("{kind}")]
pub struct TokenError {
    #[diagnostic_source]
    kind: TokenErrorKind,
    #[source]
    source: Option<BoxError>,
    #[help]
    help: Option<SmolStr>,
    context: Option<SmolStr>,
    status: Option<StatusCode>,
}

/// Error categories for token requests
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TokenErrorKind {
    /// Configuration needed for the request is missing
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(ConfigError),

    /// The HTTP client failed to deliver the request
    #[error("transport error")]
    #[diagnostic(code(podauth::token::transport))]
    Transport,

    /// Form serialization error
    #[error("form serialization error")]
    #[diagnostic(code(podauth::token::serde_form))]
    SerdeHtmlForm,

    /// HTTP build error
    #[error("http build error")]
    #[diagnostic(code(podauth::token::http_build))]
    HttpBuild,

    /// DPoP proof could not be created or attached
    #[error("dpop error")]
    #[diagnostic(code(podauth::token::dpop))]
    Dpop,

    /// The response body is not JSON
    #[error("token response is not valid JSON")]
    #[diagnostic(
        code(podauth::token::decode),
        help("the token endpoint must answer with a JSON body")
    )]
    Decode,
}

impl TokenError {
    pub fn new(kind: TokenErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            help: None,
            context: None,
            status: None,
        }
    }

    pub fn kind(&self) -> &TokenErrorKind {
        &self.kind
    }

    pub fn source_err(&self) -> Option<&BoxError> {
        self.source.as_ref()
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Status of the response that failed to decode, if one arrived
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn with_help(mut self, help: impl Into<SmolStr>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<SmolStr>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn transport(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(TokenErrorKind::Transport, Some(Box::new(source)))
    }

    pub fn decode(source: serde_json::Error, status: StatusCode) -> Self {
        let msg = format_smolstr!("{:?}", source);
        Self::new(TokenErrorKind::Decode, Some(Box::new(source)))
            .with_context(msg)
            .with_status(status)
    }
}

impl From<ConfigError> for TokenError {
    fn from(e: ConfigError) -> Self {
        Self::new(TokenErrorKind::Config(e), None)
    }
}

impl From<DpopError> for TokenError {
    fn from(e: DpopError) -> Self {
        let msg = format_smolstr!("{:?}", e);
        Self::new(TokenErrorKind::Dpop, Some(Box::new(e)))
            .with_context(msg)
            .with_help("check the key's `alg` and curve")
    }
}

impl From<http::Error> for TokenError {
    fn from(e: http::Error) -> Self {
        let msg = format_smolstr!("{:?}", e);
        Self::new(TokenErrorKind::HttpBuild, Some(Box::new(e)))
            .with_context(msg)
            .with_help("verify the token endpoint is a valid URI")
    }
}

impl From<serde_html_form::ser::Error> for TokenError {
    fn from(e: serde_html_form::ser::Error) -> Self {
        let msg = format_smolstr!("{:?}", e);
        Self::new(TokenErrorKind::SerdeHtmlForm, Some(Box::new(e))).with_context(msg)
    }
}

pub type Result<T> = core::result::Result<T, TokenError>;

/// Requests tokens from the provider described by an [`OidcConfig`].
///
/// Holds no state besides its client and configuration. Every call is one
/// round trip; nothing is cached or refreshed.
#[derive(Debug, Clone)]
pub struct TokenService<C> {
    client: C,
    config: OidcConfig,
}

impl<C: HttpClient> TokenService<C> {
    pub fn new(client: C, config: OidcConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn token_endpoint(&self, operation: &'static str) -> Result<Url> {
        self.config
            .token_endpoint()
            .ok_or_else(|| ConfigError::missing_endpoint("OIDC", "token", operation).into())
    }

    /// Client-credentials token request.
    ///
    /// A supplied proof is sent in the `DPoP` header. The response body is
    /// decoded whatever the status; provider errors come back as a
    /// [`TokenResponse`] with `error` set.
    #[tracing::instrument(level = "debug", skip_all, fields(dpop = dpop.is_some()))]
    pub async fn request_access_token(&self, dpop: Option<DpopProof>) -> Result<TokenResponse> {
        let endpoint = self.token_endpoint("TokenService::request_access_token")?;
        let body = serde_html_form::to_string(ClientCredentialsParameters {
            grant_type: TokenGrantType::ClientCredentials,
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
        })?;
        let dpop = dpop.map(DpopProof::into_header_value).transpose()?;
        self.post_form(endpoint, body, dpop).await
    }

    /// Client-credentials token request bound to `key`.
    ///
    /// The proof covers `POST` on the token endpoint.
    pub async fn request_access_token_with_dpop(&self, key: &KeyPair) -> Result<TokenResponse> {
        let endpoint = self.token_endpoint("TokenService::request_access_token_with_dpop")?;
        let proof = build_dpop_proof(endpoint.as_str(), &Method::POST, key)?;
        self.request_access_token(Some(proof)).await
    }

    /// Redeem an authorization code.
    ///
    /// The redirect URI is taken from the configuration and must be set.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn exchange_code(&self, exchange: AuthorizationCodeExchange) -> Result<TokenResponse> {
        let operation = "TokenService::exchange_code";
        let endpoint = self.token_endpoint(operation)?;
        let redirect = self
            .config
            .redirect_endpoint
            .as_ref()
            .ok_or_else(|| ConfigError::missing_endpoint("OIDC", "redirect", operation))?;
        let body = serde_html_form::to_string(AuthorizationCodeParameters {
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            code: &exchange.code,
            code_verifier: &exchange.code_verifier,
            state: &exchange.state,
            grant_type: &exchange.grant_type,
            redirect_uri: redirect.as_str(),
        })?;
        self.post_form(endpoint, body, None).await
    }

    async fn post_form(
        &self,
        endpoint: Url,
        body: String,
        dpop: Option<http::HeaderValue>,
    ) -> Result<TokenResponse> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(endpoint.as_str())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE);
        if let Some(dpop) = dpop {
            builder = builder.header("DPoP", dpop);
        }
        let request = builder.body(body.into_bytes())?;

        tracing::debug!(endpoint = %endpoint, "requesting token");
        let response = self
            .client
            .send_http(request)
            .await
            .map_err(TokenError::transport)?;
        let status = response.status();
        tracing::debug!(%status, "token endpoint responded");
        decode_json(status, response.body())
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| TokenError::decode(e, status))
}
