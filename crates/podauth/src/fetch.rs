//! Composable request decorators.
//!
//! A stage owns its context and an inner [`HttpClient`], and is itself an
//! [`HttpClient`]. Chains are built by nesting:
//!
//! ```no_run
//! # use podauth::{config::OidcConfig, fetch::*, token::TokenService};
//! # fn chain(config: OidcConfig) {
//! let client = reqwest::Client::new();
//! let tokens = TokenService::new(client.clone(), config);
//! let fetch = client
//!     .with_bearer(tokens, TokenKind::IdToken)
//!     .with_correlation(RequestContext::new(Some("job-42".into())));
//! # let _ = fetch;
//! # }
//! ```
//!
//! Requests move through the chain by value. Stages keep no per-request
//! state, so one chain can be reused for any number of calls.

use http::header::{AUTHORIZATION, HeaderName, HeaderValue, InvalidHeaderValue};
use http::{Request, Response};
use podauth_common::{BoxError, HttpClient};
use smol_str::{SmolStr, ToSmolStr};
use uuid::Uuid;

use crate::config::OidcConfig;
use crate::token::{TokenError, TokenService};
use crate::types::TokenResponse;

pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum FetchError {
    /// Token acquisition failed
    #[error("failed to obtain a token")]
    #[diagnostic(code(podauth::fetch::token))]
    Token(#[from] TokenError),
    /// The token response did not contain the requested token
    #[error("token response has no {kind}{}", provider_error(.error))]
    #[diagnostic(
        code(podauth::fetch::missing_token),
        help("check the client credentials and the token endpoint")
    )]
    MissingToken {
        kind: TokenKind,
        error: Option<SmolStr>,
    },
    #[error(transparent)]
    #[diagnostic(code(podauth::fetch::header))]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
    /// The delegate client failed
    #[error("transport error: {0}")]
    #[diagnostic(code(podauth::fetch::transport))]
    Transport(#[source] BoxError),
}

fn provider_error(error: &Option<SmolStr>) -> String {
    error
        .as_ref()
        .map(|e| format!(" (provider error: {e})"))
        .unwrap_or_default()
}

impl FetchError {
    /// Wrap an inner client error. Errors raised by a nested stage come back
    /// unchanged, so a chain reports the stage that actually failed.
    pub fn transport(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        let boxed: BoxError = Box::new(source);
        match boxed.downcast::<FetchError>() {
            Ok(inner) => *inner,
            Err(other) => FetchError::Transport(other),
        }
    }
}

/// Which token of the response is presented as the bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    AccessToken,
    IdToken,
}

impl TokenKind {
    pub fn select<'t>(&self, tokens: &'t TokenResponse) -> Option<&'t str> {
        match self {
            TokenKind::AccessToken => tokens.access_token.as_deref(),
            TokenKind::IdToken => tokens.id_token.as_deref(),
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TokenKind::AccessToken => "access_token",
            TokenKind::IdToken => "id_token",
        })
    }
}

/// Obtains a fresh token for every request and sends it as
/// `Authorization: Bearer`.
#[derive(Debug, Clone)]
pub struct BearerAuth<T, C> {
    tokens: TokenService<T>,
    kind: TokenKind,
    inner: C,
}

impl<T: HttpClient, C: HttpClient> BearerAuth<T, C> {
    pub fn new(tokens: TokenService<T>, kind: TokenKind, inner: C) -> Self {
        Self {
            tokens,
            kind,
            inner,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<T, C> HttpClient for BearerAuth<T, C>
where
    T: HttpClient + Sync,
    C: HttpClient + Sync,
{
    type Error = FetchError;

    async fn send_http(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, FetchError> {
        let tokens = self.tokens.request_access_token(None).await?;
        let token = self
            .kind
            .select(&tokens)
            .ok_or_else(|| FetchError::MissingToken {
                kind: self.kind,
                error: tokens.error.clone(),
            })?;
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        value.set_sensitive(true);

        let (mut parts, body) = request.into_parts();
        parts.headers.insert(AUTHORIZATION, value);
        self.inner
            .send_http(Request::from_parts(parts, body))
            .await
            .map_err(FetchError::transport)
    }
}

/// Per-chain request context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Reused on every call when set; otherwise each call gets a fresh id
    pub correlation_id: Option<SmolStr>,
}

impl RequestContext {
    pub fn new(correlation_id: Option<SmolStr>) -> Self {
        Self { correlation_id }
    }
}

/// Stamps `X-Correlation-ID` and a fresh `X-Request-ID` on every request.
#[derive(Debug, Clone)]
pub struct CorrelationStamp<C> {
    context: RequestContext,
    inner: C,
}

impl<C: HttpClient> CorrelationStamp<C> {
    pub fn new(context: RequestContext, inner: C) -> Self {
        Self { context, inner }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl CorrelationStamp<reqwest::Client> {
    /// Stamp requests sent with a default `reqwest` client.
    pub fn with_default_client(context: RequestContext) -> Self {
        Self::new(context, reqwest::Client::new())
    }
}

impl<C> HttpClient for CorrelationStamp<C>
where
    C: HttpClient + Sync,
{
    type Error = FetchError;

    async fn send_http(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, FetchError> {
        let correlation_id = match &self.context.correlation_id {
            Some(id) => id.clone(),
            None => Uuid::new_v4().to_smolstr(),
        };
        let request_id = Uuid::new_v4().to_smolstr();

        let (mut parts, body) = request.into_parts();
        parts
            .headers
            .append(X_CORRELATION_ID, HeaderValue::from_str(&correlation_id)?);
        parts
            .headers
            .insert(X_REQUEST_ID, HeaderValue::from_str(&request_id)?);
        tracing::debug!(
            correlation_id = %correlation_id,
            request_id = %request_id,
            method = %parts.method,
            uri = %parts.uri,
            "sending request"
        );
        self.inner
            .send_http(Request::from_parts(parts, body))
            .await
            .map_err(FetchError::transport)
    }
}

/// Wrap any client in a pipeline stage.
pub trait FetchExt: HttpClient + Sized {
    fn with_bearer<T: HttpClient>(self, tokens: TokenService<T>, kind: TokenKind) -> BearerAuth<T, Self> {
        BearerAuth::new(tokens, kind, self)
    }

    fn with_correlation(self, context: RequestContext) -> CorrelationStamp<Self> {
        CorrelationStamp::new(context, self)
    }
}

impl<C: HttpClient> FetchExt for C {}

/// `CorrelationStamp(BearerAuth(access token))` over `client`, which is
/// also used for the token requests.
pub fn access_token_fetch<C: HttpClient + Clone + Sync>(
    client: C,
    config: OidcConfig,
    context: RequestContext,
) -> CorrelationStamp<BearerAuth<C, C>> {
    token_fetch(client, config, context, TokenKind::AccessToken)
}

/// Same as [`access_token_fetch`] with the ID token as credential.
pub fn id_token_fetch<C: HttpClient + Clone + Sync>(
    client: C,
    config: OidcConfig,
    context: RequestContext,
) -> CorrelationStamp<BearerAuth<C, C>> {
    token_fetch(client, config, context, TokenKind::IdToken)
}

fn token_fetch<C: HttpClient + Clone + Sync>(
    client: C,
    config: OidcConfig,
    context: RequestContext,
    kind: TokenKind,
) -> CorrelationStamp<BearerAuth<C, C>> {
    let tokens = TokenService::new(client.clone(), config);
    client.with_bearer(tokens, kind).with_correlation(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use podauth_common::FetchFn;
    use std::convert::Infallible;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use url::Url;

    type Seen = Arc<Mutex<Vec<Request<Vec<u8>>>>>;

    fn recorder(seen: Seen) -> impl HttpClient<Error = Infallible> + Clone {
        FetchFn::new(move |request: Request<Vec<u8>>| {
            let seen = seen.clone();
            async move {
                seen.lock().await.push(request);
                Ok::<_, Infallible>(Response::new(Vec::new()))
            }
        })
    }

    /// Answers token requests with a fixed body and records everything else.
    fn idp(seen: Seen, tokens: serde_json::Value) -> impl HttpClient<Error = Infallible> + Clone {
        let body = serde_json::to_vec(&tokens).unwrap();
        FetchFn::new(move |request: Request<Vec<u8>>| {
            let seen = seen.clone();
            let body = body.clone();
            async move {
                if request.uri().path() == "/token" {
                    return Ok::<_, Infallible>(Response::new(body));
                }
                seen.lock().await.push(request);
                Ok(Response::new(Vec::new()))
            }
        })
    }

    fn config() -> OidcConfig {
        OidcConfig::new()
            .url(Url::parse("https://idp.example").unwrap())
            .client_id("client")
            .client_secret("secret")
            .token_path("/token")
            .build()
    }

    fn get(uri: &str) -> Request<Vec<u8>> {
        Request::builder().uri(uri).body(Vec::new()).unwrap()
    }

    #[tokio::test]
    async fn stamp_reuses_correlation_and_refreshes_request_id() {
        let seen = Seen::default();
        let fetch = recorder(seen.clone()).with_correlation(RequestContext::new(Some("abc".into())));

        fetch.send_http(get("https://pod.example/a")).await.unwrap();
        fetch.send_http(get("https://pod.example/b")).await.unwrap();

        let seen = seen.lock().await;
        assert_eq!(seen[0].headers()[X_CORRELATION_ID], "abc");
        assert_eq!(seen[1].headers()[X_CORRELATION_ID], "abc");
        assert_ne!(seen[0].headers()[X_REQUEST_ID], seen[1].headers()[X_REQUEST_ID]);
    }

    #[tokio::test]
    async fn stamp_generates_correlation_per_call_when_unset() {
        let seen = Seen::default();
        let fetch = recorder(seen.clone()).with_correlation(RequestContext::default());

        fetch.send_http(get("https://pod.example/a")).await.unwrap();
        fetch.send_http(get("https://pod.example/a")).await.unwrap();

        let seen = seen.lock().await;
        let first = seen[0].headers()[X_CORRELATION_ID].to_str().unwrap();
        let second = seen[1].headers()[X_CORRELATION_ID].to_str().unwrap();
        assert!(Uuid::parse_str(first).is_ok());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn stamp_appends_to_existing_correlation_and_replaces_request_id() {
        let seen = Seen::default();
        let fetch = recorder(seen.clone()).with_correlation(RequestContext::new(Some("ours".into())));
        let request = Request::builder()
            .uri("https://pod.example/a")
            .header("X-Correlation-Id", "theirs")
            .header("x-request-id", "stale")
            .body(Vec::new())
            .unwrap();

        fetch.send_http(request).await.unwrap();

        let seen = seen.lock().await;
        let correlation: Vec<_> = seen[0].headers().get_all(X_CORRELATION_ID).iter().collect();
        assert_eq!(correlation, ["theirs", "ours"]);
        let request_ids: Vec<_> = seen[0].headers().get_all(X_REQUEST_ID).iter().collect();
        assert_eq!(request_ids.len(), 1);
        assert_ne!(request_ids[0], "stale");
    }

    #[tokio::test]
    async fn bearer_selects_requested_token() {
        let seen = Seen::default();
        let client = idp(seen.clone(), serde_json::json!({"access_token": "at", "id_token": "it"}));
        let fetch = id_token_fetch(client, config(), RequestContext::default());

        fetch.send_http(get("https://pod.example/data/x")).await.unwrap();

        let seen = seen.lock().await;
        let request = &seen[0];
        assert_eq!(request.method(), http::Method::GET);
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer it");
        assert!(request.headers()[AUTHORIZATION].is_sensitive());
        assert!(request.headers().contains_key(X_CORRELATION_ID));
        assert!(request.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn access_token_chain_runs_over_shared_client() {
        let seen = Seen::default();
        let client = Arc::new(idp(
            seen.clone(),
            serde_json::json!({"access_token": "at", "id_token": "it"}),
        ));
        let fetch = access_token_fetch(client, config(), RequestContext::new(Some("corr".into())));

        fetch.send_http(get("https://vc.example/query")).await.unwrap();

        let seen = seen.lock().await;
        assert_eq!(seen[0].headers()[AUTHORIZATION], "Bearer at");
        assert_eq!(seen[0].headers()[X_CORRELATION_ID], "corr");
    }

    #[tokio::test]
    async fn missing_token_surfaces_provider_error() {
        let seen = Seen::default();
        let client = idp(seen.clone(), serde_json::json!({"error": "invalid_client"}));
        let fetch = access_token_fetch(client, config(), RequestContext::default());

        let err = fetch.send_http(get("https://pod.example/x")).await.unwrap_err();
        match err {
            FetchError::MissingToken { kind, error } => {
                assert_eq!(kind, TokenKind::AccessToken);
                assert_eq!(error.as_deref(), Some("invalid_client"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(seen.lock().await.is_empty());
    }

    #[test]
    fn transport_flattens_nested_fetch_errors() {
        let nested = FetchError::MissingToken {
            kind: TokenKind::IdToken,
            error: None,
        };
        assert!(matches!(
            FetchError::transport(nested),
            FetchError::MissingToken { .. }
        ));
        let io = std::io::Error::other("connection reset");
        assert!(matches!(FetchError::transport(io), FetchError::Transport(_)));
    }
}
