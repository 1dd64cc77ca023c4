//! Outbound request and response model.

use std::fmt;
use std::pin::Pin;

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode};
use tokio::io::AsyncRead;

use crate::forward::inbound::{ForwardMethod, InboundRequest};
use crate::forward::target::TargetUrl;

/// Upstream response body. Dropping it releases the upstream connection.
pub type ResponseBody = Pin<Box<dyn AsyncRead + Send>>;

/// Payload attached to an outbound request.
#[derive(Debug)]
pub enum OutboundBody {
    Empty,
    /// Inbound body streamed through without buffering.
    Streamed {
        body: Body,
        content_length: Option<u64>,
        content_type: Option<HeaderValue>,
    },
}

/// The request sent to the resolved target.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: ForwardMethod,
    pub target: TargetUrl,
    pub body: OutboundBody,
}

impl OutboundRequest {
    /// Build the outbound request for an already validated method.
    pub fn new(method: ForwardMethod, target: TargetUrl, inbound: InboundRequest) -> Self {
        let body = match method {
            ForwardMethod::Get => OutboundBody::Empty,
            ForwardMethod::Post => OutboundBody::Streamed {
                body: inbound.body,
                content_length: inbound.content_length,
                content_type: inbound.content_type,
            },
        };
        Self {
            method,
            target,
            body,
        }
    }
}

/// The upstream's answer, consumed exactly once by the relay.
pub struct OutboundResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    /// `None` when the upstream did not declare a length.
    pub content_length: Option<u64>,
    pub body: ResponseBody,
}

impl fmt::Debug for OutboundResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}
