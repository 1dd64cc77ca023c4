//! HTTP client capability used to reach the target.
//!
//! # Responsibilities
//! - Turn an `OutboundRequest` into a wire request
//! - Dispatch it with a bounded wait for response headers
//! - Expose the response body as a byte stream the relay can drain
//!
//! # Design Decisions
//! - Pooled hyper-util client shared by all requests (clone is cheap)
//! - Connect failures, DNS failures and timeouts all surface as `TransportError`
//! - rustls connector accepting both http and https targets; native roots are
//!   preferred and the bundled webpki roots stand in when the host has none

use std::future::Future;
use std::io;
use std::sync::Once;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response};
use futures_util::TryStreamExt;
use http_body_util::BodyDataStream;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio_util::io::StreamReader;

use crate::forward::outbound::{OutboundBody, OutboundRequest, OutboundResponse};

/// Failure to obtain a response from the target.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not build outbound request: {0}")]
    InvalidRequest(#[from] axum::http::Error),

    #[error("{0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// Something that can execute one outbound request.
pub trait HttpClient: Send + Sync + 'static {
    fn execute(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<OutboundResponse, TransportError>> + Send;
}

/// Production client backed by hyper-util's pooled connector.
#[derive(Clone)]
pub struct HyperClient {
    inner: Client<HttpsConnector<HttpConnector>, Body>,
    timeout: Duration,
}

impl HyperClient {
    /// Create a client that waits at most `timeout` for response headers.
    pub fn new(timeout: Duration) -> Self {
        install_crypto_provider();

        let mut http_connector = HttpConnector::new();
        http_connector.set_connect_timeout(Some(timeout));
        // The TLS wrapper sees https URIs; the inner connector must let them through.
        http_connector.enforce_http(false);

        let builder = match HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(e) => {
                tracing::warn!(error = %e, "Native TLS roots unavailable, using bundled roots");
                HttpsConnectorBuilder::new().with_webpki_roots()
            }
        };
        let https_connector = builder
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http_connector);

        let inner = Client::builder(TokioExecutor::new()).build(https_connector);
        Self { inner, timeout }
    }
}

/// Select ring as the process-wide rustls provider, once.
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // Err means another provider is already installed, which is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

impl HttpClient for HyperClient {
    async fn execute(&self, request: OutboundRequest) -> Result<OutboundResponse, TransportError> {
        let request = into_http(request)?;
        let response = tokio::time::timeout(self.timeout, self.inner.request(request))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;
        Ok(from_http(response))
    }
}

fn into_http(request: OutboundRequest) -> Result<Request<Body>, TransportError> {
    let mut url = request.target.as_url().clone();
    url.set_fragment(None);

    let builder = Request::builder()
        .method(request.method.as_method())
        .uri(url.as_str());

    let request = match request.body {
        OutboundBody::Empty => builder.body(Body::empty())?,
        OutboundBody::Streamed {
            body,
            content_length,
            content_type,
        } => {
            let mut builder = builder;
            if let Some(content_type) = content_type {
                builder = builder.header(header::CONTENT_TYPE, content_type);
            }
            if let Some(length) = content_length {
                builder = builder.header(header::CONTENT_LENGTH, length);
            }
            builder.body(body)?
        }
    };
    Ok(request)
}

fn from_http(response: Response<Incoming>) -> OutboundResponse {
    let (parts, body) = response.into_parts();
    let content_length = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    let content_type = parts.headers.get(header::CONTENT_TYPE).cloned();
    let stream = BodyDataStream::new(body).map_err(io::Error::other);

    OutboundResponse {
        status: parts.status,
        content_type,
        content_length,
        body: Box::pin(StreamReader::new(stream)),
    }
}
