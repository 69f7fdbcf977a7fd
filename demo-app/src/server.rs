use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webgate_axum::webgate::SharedSessionStore;

const PRUNE_INTERVAL: Duration = Duration::from_secs(15 * 60);

pub(crate) fn spawn_http_server(port: u16, app: Router) -> JoinHandle<std::io::Result<()>> {
    tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        tracing::info!("HTTP server listening on {}", addr);
        axum_server::bind(addr).serve(app.into_make_service()).await
    })
}

/// Periodically drop expired sessions from the store.
pub(crate) fn spawn_session_pruner(store: SharedSessionStore) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            match store.lock().await.prune_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("Pruned {n} expired sessions"),
                Err(e) => tracing::warn!("Failed to prune expired sessions: {e}"),
            }
        }
    })
}

pub(crate) fn init_tracing(app_name: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            format!("webgate_axum=debug,webgate=debug,tower_http=debug,{app_name}=trace,info").into()
        }

        #[cfg(not(debug_assertions))]
        {
            "info".into()
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    #[cfg(debug_assertions)]
    tracing::info!("Debug build: verbose logging unless RUST_LOG says otherwise");
    #[cfg(not(debug_assertions))]
    tracing::info!("Release build: set RUST_LOG=debug for more detail");
}
