//! AuthHub - session-based authentication backend
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - /auth/* signup, login, logout, OAuth redirect/callback   │
//! │  - /users/me                                                │
//! │  - /health, /metrics                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Auth & Service Layer                       │
//! │  - Password hashing (Argon2id)                              │
//! │  - OAuth provider gateway (Google, GitHub, LinkedIn)        │
//! │  - Identity reconciliation                                  │
//! │  - Server-side sessions                                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers for user profile and metrics
//! - `auth`: Credentials, OAuth, sessions and auth routes
//! - `service`: Account and identity business logic
//! - `data`: Database layer
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the database pool and provider client.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Session issuing and resolution
    pub sessions: Arc<auth::SessionManager>,

    /// OAuth provider client
    pub oauth: Arc<auth::OAuthGateway>,

    /// Password signup and login
    pub accounts: Arc<service::AccountService>,

    /// OAuth profile to local user mapping
    pub identities: Arc<service::IdentityReconciler>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Build credential verifier and OAuth gateway
    /// 3. Wire services
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!(path = %config.database.path.display(), "Database connected");

        // 2. Credentials and providers
        let verifier = auth::CredentialVerifier::new(&config.auth.password)?;
        let oauth = auth::OAuthGateway::new(&config.oauth, &config.server.base_url())?;

        // 3. Services
        let sessions = auth::SessionManager::new(db.clone(), config.auth.session_max_age);
        let accounts = service::AccountService::new(db.clone(), verifier);
        let identities = service::IdentityReconciler::new(db.clone());

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            sessions: Arc::new(sessions),
            oauth: Arc::new(oauth),
            accounts: Arc::new(accounts),
            identities: Arc::new(identities),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.oauth.frontend_url);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .merge(api::users_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

/// CORS for the configured front-end origin, with credentials
fn build_cors_layer(frontend_url: &str) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    let allowed_origin = frontend_url.trim_end_matches('/');
    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => base.allow_origin([origin]),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from front-end URL; denying cross-origin requests"
            );
            base
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
