//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single fallback handler
//! - Wire up middleware (tracing, timeout, request ID, concurrency limit)
//! - Hand each request to the container engine on a blocking worker
//! - Apply reloaded configuration to the running tree
//! - Stop on the shutdown broadcast

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::EngineConfig;
use crate::container::{Deployer, Engine};
use crate::http::request::{into_container, MakeRequestUuid};
use crate::http::response::into_http;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub deployer: Arc<Deployer>,
}

/// HTTP front of the container engine.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: &EngineConfig, engine: Arc<Engine>, deployer: Arc<Deployer>) -> Self {
        let state = AppState { engine, deployer };
        let router = Self::build_router(config, state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &EngineConfig, state: AppState) -> Router {
        Router::new()
            .fallback(container_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(ConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for serving in tests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.state.engine
    }

    /// Serve until `shutdown` fires. Configurations arriving on
    /// `config_updates` are applied to the running tree in order.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<EngineConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, engine = %self.state.engine.name(), "HTTP server starting");

        let reloader = tokio::spawn(apply_updates(self.state.clone(), config_updates));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn apply_updates(state: AppState, mut updates: mpsc::UnboundedReceiver<EngineConfig>) {
    while let Some(config) = updates.recv().await {
        let engine = state.engine.clone();
        let deployer = state.deployer.clone();
        // Applying may wait for in-flight requests to drain
        let outcome =
            tokio::task::spawn_blocking(move || engine.apply_config(&config, &deployer)).await;
        match outcome {
            Ok(Ok(())) => tracing::info!("Configuration applied"),
            Ok(Err(e)) => tracing::error!(error = %e, "Configuration applied with errors"),
            Err(e) => tracing::error!(error = %e, "Configuration reload task failed"),
        }
    }
}

/// Runs the request through the container tree. The body is not read.
async fn container_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, _body) = request.into_parts();
    let mut container_request = into_container(&parts);
    let engine = state.engine.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut response = crate::response::Response::new();
        engine.invoke(&mut container_request, &mut response);
        response
    })
    .await;

    match result {
        Ok(response) => into_http(response),
        Err(e) => {
            tracing::error!(error = %e, "Request worker failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
