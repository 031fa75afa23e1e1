//! Authentication routes
//!
//! Password signup/login/logout and the OAuth 2.0 authorization code flow.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};

use super::cookies::{
    OAUTH_STATE_COOKIE, SESSION_COOKIE, clear_cookie, oauth_state_cookie, session_cookie,
};
use super::middleware::session_token;
use super::session::IssuedSession;
use crate::AppState;
use crate::data::OAuthProvider;
use crate::error::AppError;
use crate::metrics::record_auth_attempt;
use crate::service::NewAccount;

/// Create authentication router
///
/// Routes:
/// - POST /auth/signup - Create a password account and sign in
/// - POST /auth/login - Password login
/// - POST /auth/logout - Revoke the current session
/// - GET /auth/:provider - Redirect to the provider
/// - GET /auth/:provider/callback - OAuth callback
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/:provider", get(oauth_redirect))
        .route("/auth/:provider/callback", get(oauth_callback))
}

fn success(message: &str) -> Json<Value> {
    Json(json!({ "success": message }))
}

fn with_session(state: &AppState, jar: CookieJar, issued: IssuedSession) -> CookieJar {
    jar.add(session_cookie(
        issued.token,
        state.sessions.max_age_secs(),
        state.config.should_use_secure_cookies(),
    ))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

// =============================================================================
// Password
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    phone_no: Option<String>,
    #[serde(default)]
    linked_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// POST /auth/signup
///
/// Creates the account and signs it in.
async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;

    let user = state
        .accounts
        .signup(NewAccount {
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            password: request.password,
            phone: request.phone_no,
            linkedin: request.linked_in,
        })
        .await?;

    let issued = state.sessions.create(&user.id, "signup").await?;
    let jar = with_session(&state, jar, issued);

    Ok((
        StatusCode::CREATED,
        jar,
        success("User created successfully"),
    ))
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;

    let user = state
        .accounts
        .login(&request.email, &request.password)
        .await?;

    let issued = state.sessions.create(&user.id, "password").await?;
    let jar = with_session(&state, jar, issued);

    Ok((jar, success("Logged In")))
}

/// POST /auth/logout
///
/// Always succeeds and always clears the cookie.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(token) = session_token(&jar) {
        if let Err(error) = state.sessions.revoke(token).await {
            tracing::error!(%error, "Failed to revoke session on logout");
        }
    }

    let jar = jar.add(clear_cookie(
        SESSION_COOKIE,
        state.config.should_use_secure_cookies(),
    ));

    (jar, success("Logged Out"))
}

// =============================================================================
// OAuth
// =============================================================================

fn parse_provider(name: &str) -> Result<OAuthProvider, AppError> {
    name.parse::<OAuthProvider>().map_err(|_| AppError::NotFound)
}

/// GET /auth/:provider
///
/// Stores a fresh state token in a short-lived cookie and redirects to the
/// provider's consent page.
async fn oauth_redirect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let provider = parse_provider(&provider)?;
    let request = state.oauth.authorize(provider)?;

    let jar = jar.add(oauth_state_cookie(
        request.state,
        state.config.oauth.state_max_age,
        state.config.should_use_secure_cookies(),
    ));

    tracing::debug!(%provider, "Redirecting to OAuth provider");
    Ok((jar, Redirect::temporary(&request.url)))
}

/// Query parameters from the provider callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    /// Set when the user denied consent
    error: Option<String>,
}

/// GET /auth/:provider/callback
///
/// # Steps
/// 1. Verify the state parameter against the state cookie
/// 2. Drop the state cookie (single use), on success and failure alike
/// 3. Exchange code for tokens and fetch the profile
/// 4. Reconcile with a local user and create a session
/// 5. Redirect to the front-end callback page
async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let provider = parse_provider(&provider)?;
    if !state.oauth.is_enabled(provider) {
        return Err(AppError::NotFound);
    }

    let expected = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty());
    let state_matches = matches!(
        (expected.as_deref(), query.state.as_deref()),
        (Some(expected), Some(received)) if expected == received
    );
    if !state_matches {
        record_auth_attempt(provider.as_str(), "invalid_state");
        tracing::info!(%provider, "OAuth callback rejected: state mismatch");
        return Err(AppError::InvalidOAuthState);
    }

    let secure = state.config.should_use_secure_cookies();
    let jar = jar.add(clear_cookie(OAUTH_STATE_COOKIE, secure));

    match complete_oauth_login(&state, provider, query).await {
        Ok(issued) => {
            let jar = with_session(&state, jar, issued);
            let target = format!(
                "{}/callback",
                state.config.oauth.frontend_url.trim_end_matches('/')
            );
            Ok((jar, Redirect::temporary(&target)).into_response())
        }
        Err(error) => {
            record_auth_attempt(provider.as_str(), "failure");
            Ok((jar, error).into_response())
        }
    }
}

async fn complete_oauth_login(
    state: &AppState,
    provider: OAuthProvider,
    query: CallbackQuery,
) -> Result<IssuedSession, AppError> {
    if let Some(error) = query.error {
        tracing::info!(%provider, %error, "Provider returned an authorization error");
        return Err(AppError::Validation(format!(
            "Authorization was not granted: {error}"
        )));
    }

    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;

    let tokens = state.oauth.exchange_code(provider, &code).await?;
    let profile = state.oauth.fetch_profile(provider, &tokens).await?;
    let reconciled = state.identities.reconcile(&profile, &tokens).await?;

    state
        .sessions
        .create(&reconciled.user.id, provider.as_str())
        .await
}
