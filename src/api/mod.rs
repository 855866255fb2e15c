//! HTTP layer exposing search and trial-detail endpoints.

pub mod routes;
pub mod types;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{config::Settings, search::SearchEngine};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
}

pub async fn serve(settings: Settings, host: String, port: u16) -> Result<()> {
    let engine = Arc::new(SearchEngine::from_settings(&settings)?);
    let router = router(engine);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!(%addr, "serving trial-scout API");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

/// Router construction, separated so tests can drive it in-process.
pub fn router(engine: Arc<SearchEngine>) -> Router {
    let state = AppState { engine };
    Router::new()
        .route("/search", get(routes::search))
        .route("/trials/:nct_id", get(routes::trial_detail))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
