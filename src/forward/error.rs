//! Forwarding errors and their mapping to caller-visible responses.

use std::fmt;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::forward::client::TransportError;

/// Stage of a forwarding operation, used to report where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Constructing,
    Dispatching,
    RelayingHeaders,
    StreamingBody,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolving => "resolving",
            Stage::Constructing => "constructing",
            Stage::Dispatching => "dispatching",
            Stage::RelayingHeaders => "relaying_headers",
            Stage::StreamingBody => "streaming_body",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for a single forwarding operation.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The target parameter is absent or has no values.
    #[error("{parameter} request key not specified")]
    MissingTarget { parameter: String },

    /// The target parameter holds a malformed percent-encoding.
    #[error("{parameter} value is not valid percent-encoded UTF-8: {reason}")]
    TargetDecode { parameter: String, reason: String },

    /// The decoded target is not an absolute http(s) URL.
    #[error("target '{target}' is not an absolute http(s) URL: {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Only GET and POST are forwarded.
    #[error("method {0} is not supported, only GET and POST are forwarded")]
    UnsupportedMethod(Method),

    /// Dispatching the outbound request failed.
    #[error("upstream request failed: {0}")]
    Transport(#[from] TransportError),

    /// Copying the upstream body failed after headers were committed.
    #[error("response body relay failed: {0}")]
    Streaming(#[source] std::io::Error),
}

impl ForwardError {
    /// The stage the operation was in when this error ended it.
    pub fn stage(&self) -> Stage {
        match self {
            ForwardError::MissingTarget { .. }
            | ForwardError::TargetDecode { .. }
            | ForwardError::InvalidTarget { .. } => Stage::Resolving,
            ForwardError::UnsupportedMethod(_) => Stage::Constructing,
            ForwardError::Transport(_) => Stage::Dispatching,
            ForwardError::Streaming(_) => Stage::StreamingBody,
        }
    }

    /// Status code reported to the caller when headers are not yet committed.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ForwardError::MissingTarget { .. }
            | ForwardError::TargetDecode { .. }
            | ForwardError::InvalidTarget { .. } => StatusCode::BAD_REQUEST,
            ForwardError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            ForwardError::Transport(TransportError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::Transport(_) | ForwardError::Streaming(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, self.to_string()).into_response();
        if let ForwardError::UnsupportedMethod(_) = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, POST"));
        }
        response
    }
}
