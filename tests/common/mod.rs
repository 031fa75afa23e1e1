//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use authhub::{AppState, config};
use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const FRONTEND_URL: &str = "http://localhost:5173";

/// Code the fake provider refuses with a non-2xx status
pub const REJECTED_CODE: &str = "rejected-code";
/// Code the fake provider refuses GitHub-style: `200 OK` with an `error` field
pub const ERROR_BODY_CODE: &str = "error-body-code";

/// Accounts the fake provider knows, keyed by authorization code
#[derive(Clone, Default)]
struct FakeAccounts {
    profiles: Arc<Mutex<HashMap<String, Value>>>,
    emails: Arc<Mutex<HashMap<String, Value>>>,
}

/// In-process stand-in for an OAuth provider
///
/// Issues `access-{code}` for any authorization code and serves the
/// profile registered for that code.
pub struct FakeProvider {
    pub addr: String,
    accounts: FakeAccounts,
}

impl FakeProvider {
    pub async fn start() -> Self {
        let accounts = FakeAccounts::default();

        let app = Router::new()
            .route("/authorize", get(|| async { "consent" }))
            .route("/token", post(fake_token))
            .route("/user", get(fake_userinfo))
            .route("/user/emails", get(fake_emails))
            .route("/userinfo", get(fake_userinfo))
            .with_state(accounts.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, accounts }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Serve `profile` from the user-info endpoint for `code`
    pub fn register_profile(&self, code: &str, profile: Value) {
        self.accounts
            .profiles
            .lock()
            .unwrap()
            .insert(code.to_string(), profile);
    }

    /// Serve `emails` from GitHub's email-list endpoint for `code`
    pub fn register_emails(&self, code: &str, emails: Value) {
        self.accounts
            .emails
            .lock()
            .unwrap()
            .insert(code.to_string(), emails);
    }
}

#[derive(Debug, Deserialize)]
struct TokenForm {
    code: String,
    grant_type: String,
    client_id: String,
    client_secret: String,
}

async fn fake_token(Form(form): Form<TokenForm>) -> Response {
    if form.grant_type != "authorization_code" || form.client_secret != "test-client-secret" {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid_client" })))
            .into_response();
    }

    match form.code.as_str() {
        REJECTED_CODE => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response(),
        ERROR_BODY_CODE => Json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        }))
        .into_response(),
        code => Json(json!({
            "access_token": format!("access-{code}"),
            "refresh_token": format!("refresh-{code}"),
            "token_type": "bearer",
            "expires_in": 3600,
            "client_id": form.client_id,
        }))
        .into_response(),
    }
}

fn code_from_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer access-"))
        .map(str::to_string)
}

async fn fake_userinfo(State(accounts): State<FakeAccounts>, headers: HeaderMap) -> Response {
    let profile = code_from_bearer(&headers)
        .and_then(|code| accounts.profiles.lock().unwrap().get(&code).cloned());

    match profile {
        Some(profile) => Json(profile).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "upstream failure").into_response(),
    }
}

async fn fake_emails(State(accounts): State<FakeAccounts>, headers: HeaderMap) -> Response {
    let emails = code_from_bearer(&headers)
        .and_then(|code| accounts.emails.lock().unwrap().get(&code).cloned());

    match emails {
        Some(emails) => Json(emails).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "upstream failure").into_response(),
    }
}

fn fake_provider_config(provider: &FakeProvider) -> config::ProviderConfig {
    config::ProviderConfig {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        auth_url: Some(provider.url("/authorize")),
        token_url: Some(provider.url("/token")),
        userinfo_url: Some(provider.url("/user")),
        emails_url: Some(provider.url("/user/emails")),
        scopes: None,
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider: FakeProvider,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    ///
    /// GitHub and Google point at an in-process fake provider; LinkedIn is
    /// left unconfigured.
    pub async fn new() -> Self {
        let provider = FakeProvider::start().await;

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let mut google = fake_provider_config(&provider);
        google.userinfo_url = Some(provider.url("/userinfo"));
        google.emails_url = None;

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "localhost:8080".to_string(),
                protocol: "http".to_string(),
            },
            database: config::DatabaseConfig { path: db_path },
            auth: config::AuthConfig {
                session_max_age: 604800,
                session_cleanup_interval_seconds: 0,
                password: config::PasswordHashConfig {
                    memory_kib: 1024,
                    iterations: 1,
                    parallelism: 1,
                },
            },
            oauth: config::OAuthConfig {
                frontend_url: FRONTEND_URL.to_string(),
                state_max_age: 600,
                request_timeout_seconds: 5,
                google: Some(google),
                github: Some(fake_provider_config(&provider)),
                linkedin: None,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = authhub::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            provider,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// POST /auth/signup with a JSON body
    pub async fn signup(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/auth/signup"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// POST /auth/login
    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// GET /users/me with the given session token
    pub async fn me(&self, session_token: &str) -> reqwest::Response {
        self.client
            .get(self.url("/users/me"))
            .header("Cookie", format!("session_id={session_token}"))
            .send()
            .await
            .unwrap()
    }

    /// Start an OAuth login and return the state token
    pub async fn initiate_oauth(&self, provider: &str) -> String {
        let response = self
            .client
            .get(self.url(&format!("/auth/{provider}")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 307);

        cookie_value(&response, "oauth_state").expect("state cookie is set")
    }

    /// Call the provider callback with a matching state cookie
    pub async fn complete_oauth(&self, provider: &str, code: &str) -> reqwest::Response {
        let state = self.initiate_oauth(provider).await;

        self.client
            .get(self.url(&format!(
                "/auth/{provider}/callback?code={code}&state={state}"
            )))
            .header("Cookie", format!("oauth_state={state}"))
            .send()
            .await
            .unwrap()
    }
}

/// All `Set-Cookie` headers of a response
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The `Set-Cookie` header for `name`, if any
pub fn set_cookie_header(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response)
        .into_iter()
        .find(|cookie| cookie.starts_with(&prefix))
}

/// Value set for cookie `name`, if any
pub fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    set_cookie_header(response, name).map(|cookie| {
        cookie
            .split(';')
            .next()
            .unwrap_or_default()
            .trim_start_matches(&format!("{name}="))
            .to_string()
    })
}

/// Default signup body
pub fn signup_body(email: &str) -> Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": email,
        "password": "longenough1",
    })
}
