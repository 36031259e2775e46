//! The one seam every podauth request passes through.
//!
//! A client takes a fully built `http::Request<Vec<u8>>` and hands back the
//! buffered `http::Response<Vec<u8>>`. Token requests, bearer and
//! correlation stages, and the pod and grant-service calls all speak this
//! shape, so a test double or a caller's own session-carrying client can
//! stand in anywhere.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// Sends one buffered request and returns the buffered response.
///
/// Non-2xx statuses are responses, not errors; callers decide what a status
/// means.
#[cfg_attr(not(target_arch = "wasm32"), trait_variant::make(Send))]
pub trait HttpClient {
    /// Transport failure: the request never produced a response
    type Error: std::error::Error + Display + Send + Sync + 'static;

    /// Send `request`.
    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl Future<Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>>;
}

/// Errors from the default `reqwest` transport.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TransportError {
    /// The request could not be converted, sent, or its body read
    #[cfg(feature = "reqwest-client")]
    #[error(transparent)]
    #[diagnostic(
        code(podauth_common::transport::reqwest),
        help("check that the endpoint is reachable and the URL is absolute")
    )]
    Reqwest(#[from] reqwest::Error),
}

#[cfg(feature = "reqwest-client")]
impl HttpClient for reqwest::Client {
    type Error = TransportError;

    async fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> core::result::Result<http::Response<Vec<u8>>, Self::Error> {
        let request = reqwest::Request::try_from(request)?;
        tracing::trace!(method = %request.method(), url = %request.url(), "sending");

        let sent = self.execute(request).await?;
        let status = sent.status();
        let headers = sent.headers().clone();
        let body = sent.bytes().await?.to_vec();

        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl<T: HttpClient + Sync> HttpClient for Arc<T> {
    type Error = T::Error;

    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl Future<Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>> + Send
    {
        self.as_ref().send_http(request)
    }
}

#[cfg(target_arch = "wasm32")]
impl<T: HttpClient> HttpClient for Arc<T> {
    type Error = T::Error;

    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl Future<Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>> {
        self.as_ref().send_http(request)
    }
}

/// Adapts an async closure into an [`HttpClient`].
///
/// ```no_run
/// use podauth_common::http_client::{FetchFn, HttpClient};
///
/// let fetch = FetchFn::new(|request: http::Request<Vec<u8>>| async move {
///     let _ = request;
///     let response = http::Response::builder().status(204).body(Vec::<u8>::new())?;
///     Ok::<_, http::Error>(response)
/// });
/// # let _ = fetch;
/// ```
#[derive(Debug, Clone)]
pub struct FetchFn<F>(F);

impl<F> FetchFn<F> {
    /// Wrap `f`, which is called once per request.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F, Fut, E> HttpClient for FetchFn<F>
where
    F: Fn(http::Request<Vec<u8>>) -> Fut + Send + Sync,
    Fut: Future<Output = core::result::Result<http::Response<Vec<u8>>, E>> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    async fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> core::result::Result<http::Response<Vec<u8>>, Self::Error> {
        (self.0)(request).await
    }
}
