//! services/studio/src/bin/studio.rs

use arunika_core::cache::LocalCache;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;
use studio_lib::{
    adapters::{storage::FileStorage, PgRemoteStoreFactory},
    config::Config,
    error::StudioError,
    sync::{SyncSettings, Workspace},
    web::{self, ApiDoc, AppState},
};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), StudioError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting studio...");

    // --- 2. Open the Local Cache ---
    let storage = FileStorage::open(config.cache_dir.clone(), config.cache_quota_bytes)?;
    info!("Local cache at {}", storage.dir().display());
    let cache = LocalCache::new(Box::new(storage));

    // --- 3. Open the Workspace (connects and fetches when credentials are set) ---
    let factory = Arc::new(PgRemoteStoreFactory::new(
        config.remote_timeout,
        config.run_migrations,
    ));
    let settings = SyncSettings {
        debounce: config.sync_debounce,
        echo_window: config.echo_window,
    };
    let workspace = Arc::new(Workspace::open(cache, factory, settings, config.remote.clone()).await);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(workspace.clone(), config.clone()));

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        StudioError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // File assets arrive as data URIs inside JSON bodies.
    let api_router = web::router(app_state)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors);

    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
            }
        })
        .await?;

    workspace.shutdown();
    Ok(())
}
