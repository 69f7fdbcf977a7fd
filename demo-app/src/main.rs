use std::sync::Arc;

use webgate_axum::webgate::{AppConfig, build_session_store};
use webgate_axum::{
    Collaborators, ProviderLink, RouteGroups, assemble, local_auth_router, provider_router,
};

mod collaborators;
mod handlers;
mod server;

use crate::{
    collaborators::{DemoProvider, DemoVerifier},
    server::{init_tracing, spawn_http_server, spawn_session_pruner},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing(env!("CARGO_CRATE_NAME"));

    let config = AppConfig::from_env()?;
    tracing::info!("Starting in {:?} mode", config.runtime_mode);

    let store = build_session_store(&config.store).await?;
    spawn_session_pruner(store.clone());

    let prefixes = &config.routes;
    let providers = vec![
        ProviderLink::new("Google", format!("{}/login", prefixes.provider_a)),
        ProviderLink::new("Facebook", format!("{}/login", prefixes.provider_b)),
    ];

    let groups = RouteGroups::standard(
        prefixes,
        handlers::router(),
        local_auth_router(Arc::new(DemoVerifier::from_env()), providers),
        provider_router(Arc::new(DemoProvider::new("google", &prefixes.provider_a))),
        provider_router(Arc::new(DemoProvider::new(
            "facebook",
            &prefixes.provider_b,
        ))),
    );

    let app = assemble(&config, Collaborators::new(store), groups)?;

    spawn_http_server(config.listen_port, app).await??;
    Ok(())
}
