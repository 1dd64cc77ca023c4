//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router routing every path and method to the forwarder
//! - Wire up middleware (tracing, request timeout, request ID)
//! - Map forwarding errors to error responses and record metrics
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::forward::{Forwarder, ForwarderSettings, HttpClient, HyperClient, InboundRequest};
use crate::http::request::{propagate_request_id_layer, request_id_of, set_request_id_layer};
use crate::observability::metrics;

/// Application state injected into handlers.
pub struct AppState<C> {
    pub forwarder: Arc<Forwarder<C>>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            forwarder: self.forwarder.clone(),
        }
    }
}

/// HTTP server for the forwarding proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server using the pooled hyper client.
    pub fn new(config: ProxyConfig) -> Self {
        let client = HyperClient::new(Duration::from_secs(config.timeouts.upstream_secs));
        Self::with_client(config, client)
    }

    /// Create a new HTTP server forwarding through `client`.
    pub fn with_client<C: HttpClient>(config: ProxyConfig, client: C) -> Self {
        let settings = ForwarderSettings::from(&config.forwarder);
        let state = AppState {
            forwarder: Arc::new(Forwarder::new(client, settings)),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router<C: HttpClient>(config: &ProxyConfig, state: AppState<C>) -> Router {
        Router::new()
            .route("/", any(forward_handler::<C>))
            .route("/{*path}", any(forward_handler::<C>))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            parameter_key = %self.config.forwarder.parameter_key,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The router, for serving it from another host.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Forward any request to the target named in its query string.
async fn forward_handler<C: HttpClient>(
    State(state): State<AppState<C>>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id_of(&request);
    let method = request.method().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        uri = %request.uri(),
        "Forwarding request"
    );

    let inbound = InboundRequest::from_http(request);
    let response = match state.forwarder.forward(inbound).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(
                request_id = %request_id,
                method = %method,
                stage = %err.stage(),
                error = %err,
                "Forwarding failed"
            );
            metrics::record_failure(err.stage());
            err.into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}
