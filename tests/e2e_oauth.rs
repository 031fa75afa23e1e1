//! E2E tests for the OAuth login flow against an in-process fake provider

mod common;

use common::{
    ERROR_BODY_CODE, FRONTEND_URL, REJECTED_CODE, TestServer, cookie_value, set_cookie_header,
    signup_body,
};
use serde_json::{Value, json};

fn github_user(id: i64, email: Option<&str>) -> Value {
    json!({
        "id": id,
        "login": "octocat",
        "name": "Mona Lisa",
        "email": email,
        "avatar_url": "https://avatars.example.com/octocat.png",
    })
}

fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// The state cookie is dropped after any callback that got past the state check
fn assert_state_cleared(response: &reqwest::Response) {
    let cleared = set_cookie_header(response, "oauth_state").expect("state cookie is cleared");
    assert!(cleared.contains("Max-Age=0"));
}

async fn profile_of(server: &TestServer, response: &reqwest::Response) -> Value {
    let token = cookie_value(response, "session_id").expect("session cookie");
    server.me(&token).await.json().await.unwrap()
}

#[tokio::test]
async fn test_initiate_redirects_to_provider_with_state() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/auth/github"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 307);

    let cookie = set_cookie_header(&response, "oauth_state").expect("state cookie");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=600"));
    let state = cookie_value(&response, "oauth_state").unwrap();
    assert!(!state.is_empty());

    let target = url::Url::parse(&location(&response)).unwrap();
    assert_eq!(target.as_str().split('?').next(), Some(server.provider.url("/authorize").as_str()));
    let params: std::collections::HashMap<_, _> = target.query_pairs().into_owned().collect();
    assert_eq!(params["client_id"], "test-client-id");
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["redirect_uri"], "http://localhost:8080/auth/github/callback");
    assert_eq!(params["state"], state);
}

#[tokio::test]
async fn test_each_initiate_uses_a_fresh_state() {
    let server = TestServer::new().await;

    let first = server.initiate_oauth("github").await;
    let second = server.initiate_oauth("github").await;

    assert_ne!(first, second);
}

#[tokio::test]
async fn test_unknown_or_unconfigured_provider_is_not_found() {
    let server = TestServer::new().await;

    for path in ["/auth/facebook", "/auth/linkedin", "/auth/facebook/callback?code=x&state=y"] {
        let response = server.client.get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 404, "{path}");
    }
}

#[tokio::test]
async fn test_callback_rejects_state_mismatch() {
    let server = TestServer::new().await;
    server.provider.register_profile("code-1", github_user(1, Some("mona@example.com")));
    let state = server.initiate_oauth("github").await;

    let response = server
        .client
        .get(server.url("/auth/github/callback?code=code-1&state=forged"))
        .header("Cookie", format!("oauth_state={state}"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert!(set_cookie_header(&response, "session_id").is_none());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid state token");
}

#[tokio::test]
async fn test_callback_rejects_missing_state_cookie() {
    let server = TestServer::new().await;
    server.provider.register_profile("code-1", github_user(1, Some("mona@example.com")));
    let state = server.initiate_oauth("github").await;

    let response = server
        .client
        .get(server.url(&format!("/auth/github/callback?code=code-1&state={state}")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_github_login_creates_verified_user() {
    let server = TestServer::new().await;
    server.provider.register_profile("code-1", github_user(4242, Some("mona@example.com")));

    let response = server.complete_oauth("github", "code-1").await;
    assert_eq!(response.status(), 307);
    assert_eq!(location(&response), format!("{FRONTEND_URL}/callback"));
    assert_state_cleared(&response);

    let profile = profile_of(&server, &response).await;
    assert_eq!(profile["email"], "mona@example.com");
    assert_eq!(profile["first_name"], "Mona");
    assert_eq!(profile["last_name"], "Lisa");
    assert_eq!(profile["email_verified"], true);
    assert_eq!(profile["oauth_providers"][0]["provider"], "github");

    // No password was ever set
    let login = server.login("mona@example.com", "anything-long").await;
    assert_eq!(login.status(), 401);
    let body: Value = login.json().await.unwrap();
    assert_eq!(body["error"], "Use OAuth login");
}

#[tokio::test]
async fn test_repeated_provider_login_reuses_user() {
    let server = TestServer::new().await;
    server.provider.register_profile("code-1", github_user(4242, Some("mona@example.com")));
    server.provider.register_profile("code-2", github_user(4242, Some("mona@example.com")));

    let first = server.complete_oauth("github", "code-1").await;
    let second = server.complete_oauth("github", "code-2").await;
    assert_eq!(second.status(), 307);

    let first = profile_of(&server, &first).await;
    let second = profile_of(&server, &second).await;
    assert_eq!(first["id"], second["id"]);

    assert_eq!(second["oauth_providers"].as_array().map(Vec::len), Some(1));

    let identity = server
        .state
        .db
        .get_oauth_identity(authhub::data::OAuthProvider::GitHub, "4242")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(identity.access_token, "access-code-2");
    assert_eq!(identity.refresh_token.as_deref(), Some("refresh-code-2"));
}

#[tokio::test]
async fn test_provider_login_links_existing_password_account() {
    let server = TestServer::new().await;

    let signup = server.signup(signup_body("ada@example.com")).await;
    let password_user = profile_of(&server, &signup).await;

    server.provider.register_profile(
        "code-1",
        json!({
            "id": "google-sub-1",
            "email": "Ada@Example.com",
            "given_name": "Augusta",
            "family_name": "King",
            "picture": "https://avatars.example.com/ada.png",
        }),
    );
    let response = server.complete_oauth("google", "code-1").await;
    assert_eq!(response.status(), 307);

    let linked = profile_of(&server, &response).await;
    assert_eq!(linked["id"], password_user["id"]);
    // Existing profile fields are kept
    assert_eq!(linked["first_name"], "Ada");
    assert_eq!(linked["oauth_providers"][0]["provider"], "google");

    // Password login keeps working after linking
    assert_eq!(server.login("ada@example.com", "longenough1").await.status(), 200);
}

#[tokio::test]
async fn test_github_hidden_email_falls_back_to_email_list() {
    let server = TestServer::new().await;
    server.provider.register_profile("code-1", github_user(7, None));
    server.provider.register_emails(
        "code-1",
        json!([
            { "email": "old@example.com", "primary": false, "verified": true },
            { "email": "primary@example.com", "primary": true, "verified": true },
        ]),
    );

    let response = server.complete_oauth("github", "code-1").await;
    assert_eq!(response.status(), 307);

    let profile = profile_of(&server, &response).await;
    assert_eq!(profile["email"], "primary@example.com");
}

#[tokio::test]
async fn test_github_email_list_skips_unverified_entries() {
    let server = TestServer::new().await;
    server.provider.register_profile("code-1", github_user(8, None));
    server.provider.register_emails(
        "code-1",
        json!([
            { "email": "old@example.com", "primary": false, "verified": false },
            { "email": "work@example.com", "primary": false, "verified": true },
        ]),
    );

    let response = server.complete_oauth("github", "code-1").await;
    assert_eq!(response.status(), 307);

    let profile = profile_of(&server, &response).await;
    assert_eq!(profile["email"], "work@example.com");
}

#[tokio::test]
async fn test_github_without_any_email_is_rejected() {
    let server = TestServer::new().await;
    // No email list registered: the lookup fails and the email stays blank
    server.provider.register_profile("code-1", github_user(7, None));

    let response = server.complete_oauth("github", "code-1").await;

    assert_eq!(response.status(), 400);
    assert_state_cleared(&response);
    assert!(set_cookie_header(&response, "session_id").is_none());
}

#[tokio::test]
async fn test_token_exchange_failure_is_bad_request() {
    let server = TestServer::new().await;

    for code in [REJECTED_CODE, ERROR_BODY_CODE] {
        let response = server.complete_oauth("github", code).await;

        assert_eq!(response.status(), 400, "{code}");
        assert_state_cleared(&response);
        assert!(set_cookie_header(&response, "session_id").is_none());
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Failed to exchange token");
    }
}

#[tokio::test]
async fn test_profile_fetch_failure_is_server_error() {
    let server = TestServer::new().await;
    // Token exchange succeeds but no profile is registered for this code

    let response = server.complete_oauth("github", "no-profile").await;

    assert_eq!(response.status(), 500);
    assert_state_cleared(&response);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Failed to get user info");
}

#[tokio::test]
async fn test_denied_consent_is_bad_request() {
    let server = TestServer::new().await;
    let state = server.initiate_oauth("github").await;

    let response = server
        .client
        .get(server.url(&format!(
            "/auth/github/callback?error=access_denied&state={state}"
        )))
        .header("Cookie", format!("oauth_state={state}"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_state_cleared(&response);
}

#[tokio::test]
async fn test_callback_without_code_is_bad_request() {
    let server = TestServer::new().await;
    let state = server.initiate_oauth("github").await;

    let response = server
        .client
        .get(server.url(&format!("/auth/github/callback?state={state}")))
        .header("Cookie", format!("oauth_state={state}"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}
