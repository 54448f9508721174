//! JSON-over-HTTP front-end.

mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{MatchedPath, Request};
use axum::routing::{get, post};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::application::LedgerService;
use crate::features::FeatureStore;

pub use error::{json_error, status_for};

#[derive(Clone)]
pub struct AppState {
    pub service: LedgerService,
    pub features: Arc<FeatureStore>,
}

impl AppState {
    pub fn new(service: LedgerService, features: Arc<FeatureStore>) -> Self {
        Self { service, features }
    }
}

/// All routes, without tracing or CORS.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/accounts/{account_number}/balances",
            get(handlers::get_balance),
        )
        .route(
            "/accounts/{account_number}/transactions",
            get(handlers::get_transactions),
        )
        .route(
            "/accounts/{account_number}/schedules",
            get(handlers::get_schedules).post(handlers::create_schedule),
        )
        .route(
            "/accounts/{account_number}/transfers",
            post(handlers::create_transfer),
        )
        .route("/transactions", get(handlers::get_all_transactions))
        .route("/features", get(handlers::get_features))
        .with_state(state)
}

/// The router as served: request spans and permissive CORS on top of `build_router`.
pub fn app(state: AppState) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::info_span!("request", %method, %uri, matched_path)
        })
        // Server errors are logged where they are turned into responses.
        .on_failure(());

    build_router(state)
        .layer(tracing_layer)
        .layer(CorsLayer::permissive())
}

/// Serve until Ctrl+C or SIGTERM, then drain in-flight requests.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::debug!("Received ctrl+c signal."),
        _ = terminate => tracing::debug!("Received terminate signal."),
    }
}
