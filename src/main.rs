//! AuthHub binary entry point

use authhub::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize metrics
/// 4. Initialize AppState
/// 5. Build Axum router
/// 6. Bind the HTTP listener
/// 7. Start background tasks (expired session sweep), then serve
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging; RUST_LOG overrides logging.level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter_directives().into());

    if config.logging.is_json() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting AuthHub...");
    tracing::info!(
        domain = %config.server.domain,
        protocol = %config.server.protocol,
        frontend = %config.oauth.frontend_url,
        "Configuration loaded"
    );
    if !config.should_use_secure_cookies() {
        tracing::warn!("Using insecure session cookies for local development");
    }

    // 3. Initialize metrics
    authhub::metrics::init_metrics();

    // 4. Initialize application state
    let state = AppState::new(config.clone()).await?;

    // 5. Build Axum router
    let app = authhub::build_router(state.clone());

    // 6. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Public URL: {}", config.server.base_url());

    // 7. Start background tasks
    if config.auth.session_cleanup_interval_seconds > 0 {
        spawn_session_cleanup_task(state.clone());
    }

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}

/// Spawn background task deleting expired sessions
fn spawn_session_cleanup_task(state: AppState) {
    tokio::spawn(async move {
        let interval_secs = state.config.auth.session_cleanup_interval_seconds;
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;

            match state.sessions.purge_expired().await {
                Ok(0) => tracing::debug!("No expired sessions to remove"),
                Ok(removed) => tracing::info!(removed, "Expired sessions removed"),
                Err(error) => tracing::error!(%error, "Expired session cleanup failed"),
            }
        }
    });

    tracing::info!("Session cleanup task spawned");
}
