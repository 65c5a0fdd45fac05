pub mod error;
pub mod handlers;

use crate::{
    config::Config,
    engine::{soffice::SofficeEngine, Engine},
    pipeline::Pipeline,
};
use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub type SharedEngine = Arc<dyn Engine + Send + Sync>;

/// Shared state handed to every handler.
pub struct AppState {
    pub cfg: Arc<Config>,
    pub pipeline: Arc<Pipeline<SharedEngine>>,
    /// Bounds how many converter processes run at once.
    pub limiter: Arc<Semaphore>,
}

impl AppState {
    pub fn new(cfg: &Config, engine: SharedEngine) -> Self {
        Self {
            cfg: Arc::new(cfg.clone()),
            pipeline: Arc::new(Pipeline::new(cfg, engine)),
            limiter: Arc::new(Semaphore::new(cfg.server.max_concurrent_conversions.max(1))),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let convert_path = state.cfg.server.convert_path.clone();
    let body_limit = state.cfg.server.max_upload_bytes;
    Router::new()
        .route(&convert_path, post(handlers::convert))
        .route("/api/health", get(handlers::health))
        .route("/api/doctor", get(handlers::doctor))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(cfg: &Config) -> Result<()> {
    let engine: SharedEngine = Arc::new(SofficeEngine::new(cfg)?);
    let state = Arc::new(AppState::new(cfg, engine));
    let app = router(state);

    let addr: SocketAddr = cfg
        .server
        .bind_address
        .parse()
        .with_context(|| format!("parsing bind_address: {}", cfg.server.bind_address))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, path = %cfg.server.convert_path, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| "HTTP server")?;

    info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
