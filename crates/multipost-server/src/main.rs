use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use multipost_api::{AppStateInner, router};
use multipost_backend::BackendClient;
use multipost_core::{
    blobs::BlobStore,
    config::Config,
    drafts::{DraftScheduler, DraftStore},
    login::LoginFlow,
    publish::PublishService,
    session::SessionRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multipost=info,tower_http=info".into()),
        )
        .init();

    let cfg = Arc::new(Config::load()?);

    let registry = Arc::new(SessionRegistry::new());
    let drafts = Arc::new(DraftStore::new());
    let blobs = BlobStore::new(&cfg.temp_dir)?;

    let backend = Arc::new(BackendClient::new(
        cfg.backend_url.as_str(),
        cfg.upstream_timeout,
    ));
    let connector = multipost_telegram::connector(&cfg)?;

    let login = LoginFlow::new(connector, registry.clone());
    let publish = PublishService::new(
        registry.clone(),
        drafts.clone(),
        backend.clone(),
        blobs,
        cfg.transport_timeout,
    );

    let scheduler = DraftScheduler::new(
        registry.clone(),
        drafts,
        cfg.draft_poll_interval,
        cfg.transport_timeout,
    );
    scheduler.start();

    let state = Arc::new(AppStateInner {
        cfg: cfg.clone(),
        registry: registry.clone(),
        login,
        publish,
        links: backend,
    });

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("multipost gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop publishing and release every open platform connection before
    // exiting; sessions are memory-resident and die with the process.
    scheduler.stop();
    for session in registry.drain().await {
        session.close().await;
    }
    info!("all sessions disconnected, bye");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install the shutdown handler");
        return;
    }
    info!("shutdown signal received");
}
