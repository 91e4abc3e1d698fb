//! HTTP surface of the engine.
//!
//! `/health` is public. Every other route goes through [`auth::require_admin`],
//! which only enforces a bearer token when one is configured.

mod auth;
mod handlers;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::pipeline::Engine;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<Engine>,
    pub admin_token: Option<Arc<str>>,
}

impl ApiState {
    pub fn new(engine: Arc<Engine>, admin_token: Option<&str>) -> Self {
        Self {
            engine,
            admin_token: admin_token.map(Arc::from),
        }
    }
}

pub fn build_router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/sites/:id/analyze", post(handlers::analyze))
        .route("/sites/:id/generate-draft", post(handlers::generate_draft))
        .route("/sites/:id/drafts", post(handlers::create_draft))
        .route("/sites/:id/articles", get(handlers::list_articles))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .with_state(state)
}

pub async fn serve(state: ApiState, bind: std::net::SocketAddr) -> crate::error::Result<()> {
    if state.admin_token.is_none() {
        tracing::warn!("No admin_token configured; mutating routes are open");
    }
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "API listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
