use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::api::{self, AppState, SharedState};
use crate::clock::SystemClock;
use crate::config::FlowieConfig;
use crate::db::{DbHandle, FlowieDb};

/// Build the full application router: API, auth, health and, when
/// configured, the compiled frontend with `index.html` as SPA fallback.
pub fn build_router(state: SharedState) -> Router {
    let server = state.config.server.clone();
    let mut app = api::api_router(state);

    if let Some(dir) = &server.static_dir {
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).fallback(index));
    }

    app = app.layer(TraceLayer::new_for_http());
    if server.cors_permissive {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Open the database file, creating its directory if needed.
pub fn open_database(path: &Path) -> Result<FlowieDb> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    FlowieDb::new(path).context("Failed to initialize Flowie database")
}

/// Start the server and run until Ctrl+C.
pub async fn start_server(config: FlowieConfig) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("config: {}", warning);
    }

    let db = open_database(&config.database.path)?;
    let addr = config.bind_addr();
    let state = Arc::new(AppState::new(
        config,
        DbHandle::new(db),
        Arc::new(SystemClock),
    ));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, "Flowie listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
