//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, request timeout)
//! - Serve until the shutdown broadcast fires

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ListenerConfig;
use crate::http::handlers;
use crate::treasury::TreasuryService;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub treasury: Arc<TreasuryService>,
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(treasury: Arc<TreasuryService>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/status", get(handlers::status))
        .route("/health", get(handlers::health))
        .route("/balance", get(handlers::balance))
        .route("/earnings", get(handlers::earnings))
        .route("/credit-earnings", post(handlers::credit_earnings))
        .route("/withdraw", post(handlers::accounting_withdrawal))
        .route("/send-to-coinbase", post(handlers::accounting_withdrawal))
        .route("/coinbase-withdraw", post(handlers::accounting_withdrawal))
        .route("/send-to-backend", post(handlers::send_to_backend))
        .route("/fund-backend", post(handlers::send_to_backend))
        .route("/backend-to-payout", post(handlers::backend_to_payout))
        .route("/transfer-to-coinbase", post(handlers::backend_to_payout))
        .route("/treasury-to-coinbase", post(handlers::backend_to_payout))
        .route("/backend-to-coinbase", post(handlers::backend_to_payout))
        .with_state(AppState { treasury })
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// HTTP server for the treasury API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(treasury: Arc<TreasuryService>, config: &ListenerConfig) -> Self {
        let router = build_router(treasury, Duration::from_secs(config.request_timeout_secs));
        Self { router }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
