//! Inbound request model.

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request};

use crate::forward::error::ForwardError;
use crate::forward::target::ParameterMap;

/// Methods the forwarder knows how to relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardMethod {
    Get,
    Post,
}

impl ForwardMethod {
    pub fn as_method(&self) -> Method {
        match self {
            ForwardMethod::Get => Method::GET,
            ForwardMethod::Post => Method::POST,
        }
    }
}

impl TryFrom<&Method> for ForwardMethod {
    type Error = ForwardError;

    fn try_from(method: &Method) -> Result<Self, Self::Error> {
        if *method == Method::GET {
            Ok(ForwardMethod::Get)
        } else if *method == Method::POST {
            Ok(ForwardMethod::Post)
        } else {
            Err(ForwardError::UnsupportedMethod(method.clone()))
        }
    }
}

/// The caller's request as seen by the forwarder.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub params: ParameterMap,
    pub content_length: Option<u64>,
    pub content_type: Option<HeaderValue>,
    pub body: Body,
}

impl InboundRequest {
    /// Capture the parts of a host request the forwarder needs.
    pub fn from_http(request: Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        let params = parts
            .uri
            .query()
            .map(ParameterMap::from_query)
            .unwrap_or_default();
        let content_length = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let content_type = parts.headers.get(header::CONTENT_TYPE).cloned();

        Self {
            method: parts.method,
            params,
            content_length,
            content_type,
            body,
        }
    }
}
