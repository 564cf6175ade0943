// HTTP API Server module

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod gemini;
pub mod handlers;

use crate::config::AppConfig;
use crate::proxy::GenerativeProvider;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn GenerativeProvider>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(provider: Arc<dyn GenerativeProvider>, config: AppConfig) -> Self {
        Self {
            provider,
            config: Arc::new(config),
        }
    }
}

/// Build the proxy router around an already constructed provider.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route(
            "/api/gemini/generate",
            post(handlers::generate).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/gemini/generate-image",
            post(handlers::generate_image).fallback(handlers::method_not_allowed),
        )
        .route(
            "/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let client = gemini::GeminiClient::from_config(&config)?;
    let addr = config.listen_addr();

    let state = AppState::new(Arc::new(client), config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
