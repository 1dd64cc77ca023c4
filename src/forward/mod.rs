//! Request forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request (method, query, body)
//!     → target.rs   (resolve + decode the target parameter)
//!     → inbound.rs  (GET / POST dispatch, everything else rejected)
//!     → outbound.rs (build outbound request, POST body streamed through)
//!     → client.rs   (dispatch via the HTTP client capability)
//!     → relay.rs    (status + headers, then bounded body transfer)
//!     → caller response
//! ```
//!
//! # Design Decisions
//! - One attempt per request, no retries
//! - Errors before dispatch never reach the client
//! - Settings are fixed at construction and shared read-only

pub mod client;
pub mod error;
pub mod inbound;
pub mod outbound;
pub mod relay;
pub mod target;

pub use client::{HttpClient, HyperClient, TransportError};
pub use error::{ForwardError, Stage};
pub use inbound::{ForwardMethod, InboundRequest};
pub use outbound::{OutboundBody, OutboundRequest, OutboundResponse, ResponseBody};
pub use target::{resolve_target, ParameterMap, TargetUrl};

use axum::body::Body;
use axum::http::Response;

use crate::config::ForwarderConfig;

/// Immutable forwarding settings.
#[derive(Debug, Clone)]
pub struct ForwarderSettings {
    pub parameter_key: String,
    pub buffer_size: usize,
}

impl From<&ForwarderConfig> for ForwarderSettings {
    fn from(config: &ForwarderConfig) -> Self {
        Self {
            parameter_key: config.parameter_key.clone(),
            buffer_size: config.buffer_size,
        }
    }
}

impl Default for ForwarderSettings {
    fn default() -> Self {
        Self::from(&ForwarderConfig::default())
    }
}

/// Forwards one inbound request to the target named in its parameters.
pub struct Forwarder<C> {
    client: C,
    settings: ForwarderSettings,
}

impl<C: HttpClient> Forwarder<C> {
    pub fn new(client: C, settings: ForwarderSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ForwarderSettings {
        &self.settings
    }

    /// Perform a single forwarding round-trip.
    pub async fn forward(&self, inbound: InboundRequest) -> Result<Response<Body>, ForwardError> {
        let target = resolve_target(&inbound.params, &self.settings.parameter_key)?;
        let method = ForwardMethod::try_from(&inbound.method)?;

        tracing::debug!(
            stage = %Stage::Dispatching,
            method = ?method,
            target_url = %target,
            "Dispatching outbound request"
        );
        let request = OutboundRequest::new(method, target.clone(), inbound);
        let response = self.client.execute(request).await?;

        tracing::debug!(
            stage = %Stage::RelayingHeaders,
            target_url = %target,
            status = %response.status,
            content_length = ?response.content_length,
            "Relaying upstream response"
        );
        Ok(relay::relay_response(response, &target, self.settings.buffer_size))
    }
}
