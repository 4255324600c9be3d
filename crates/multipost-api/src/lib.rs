//! HTTP surface of the gateway (axum).
//!
//! Handlers stay thin: parsing, the bearer gate and the error→status
//! mapping live here; the orchestration lives in `multipost-core`.

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, middleware as axum_middleware, routing::post, Router};

use multipost_core::{
    config::Config, links::LinkStore, login::LoginFlow, publish::PublishService,
    session::SessionRegistry,
};

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod types;

/// Uploaded images can be sizeable; axum's default 2 MiB body cap is too
/// small for grouped posts.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub cfg: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub login: LoginFlow,
    pub publish: PublishService,
    pub links: Arc<dyn LinkStore>,
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/request_code", post(handlers::request_code))
        .route("/verify_code", post(handlers::verify_code));

    let protected = Router::new()
        .route("/channels", post(handlers::channels))
        .route("/create_post", post(handlers::create_post))
        .route("/save_draft", post(handlers::save_draft))
        .route("/logout", post(handlers::logout))
        .layer(axum_middleware::from_fn(middleware::require_bearer));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
