//! Iris Model Server
//!
//! KServe-compatible prediction endpoint for a single Iris classifier.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    IRIS MODEL SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  boot:  Config ──► ModelHandle::initialize ──► bind listener │
//! │                     (artifact | fallback,                   │
//! │                      self-test, publish once)               │
//! │                                                             │
//! │  serve: ┌───────────┐   ┌─────────────┐   ┌──────────────┐  │
//! │         │  Router   │──►│  Handlers   │──►│ LoadedModel  │  │
//! │         │  (Axum)   │   │ health/pred │   │ (read-only)  │  │
//! │         └───────────┘   └─────────────┘   └──────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod classifier;
mod config;
mod error;
mod handlers;
mod loader;
mod models;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};
use loader::ModelHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    init_tracing(&config);

    tracing::info!("Iris Model Server starting...");

    // Load the model before the listener exists
    let model = Arc::new(ModelHandle::new());
    let loaded = model
        .initialize(&config.loader_settings())
        .context("Failed to load model")?;
    tracing::info!(
        "Serving {} as '{}' ({} model)",
        loaded.kind(),
        config.model_name,
        loaded.source()
    );

    // Build application state
    let state = AppState {
        model,
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &config::Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "iris_serving=debug,tower_http=debug".into());

    if config.json_logs() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
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

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelHandle>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::check))
        // KServe v1: GET /v1/models/{name}, POST /v1/models/{name}:predict
        .route(
            "/v1/models/:target",
            get(handlers::health::model_status).post(handlers::predict::predict_v1),
        )
        .route("/predict", post(handlers::predict::predict))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
