//! Chatping trigger adapter binary entrypoint.

use std::sync::Arc;

use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use chatping_common::config::AppConfig;
use chatping_engine::{NotificationPipeline, PgDirectory, PipelineSettings};
use chatping_notifier::FcmGateway;

use chatping_api::routes::create_router;
use chatping_api::state::AppState;

/// Largest accepted message document.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("chatping_api=info,chatping_engine=info,chatping_notifier=info")
        }))
        .json()
        .init();

    tracing::info!("Chatping trigger adapter starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Wire collaborators explicitly; nothing is global.
    let directory = PgDirectory::connect(&config.database_url, config.db_max_connections).await?;
    let gateway = FcmGateway::new(
        &config.fcm_endpoint,
        &config.fcm_project_id,
        &config.fcm_access_token,
        config.dispatch_timeout(),
    )?;
    let pipeline = NotificationPipeline::new(
        Arc::new(directory),
        Arc::new(gateway),
        PipelineSettings::from_config(&config),
    );

    let app = create_router(AppState::new(pipeline))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.api_bind_addr).await?;
    tracing::info!(addr = %config.api_bind_addr, "Trigger adapter listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received shutdown signal, stopping gracefully...");
        })
        .await?;

    tracing::info!("Chatping trigger adapter stopped.");
    Ok(())
}
