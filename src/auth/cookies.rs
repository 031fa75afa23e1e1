//! Session and OAuth state cookies

use axum_extra::extract::cookie::{Cookie, SameSite};

/// Cookie carrying the opaque session token
pub const SESSION_COOKIE: &str = "session_id";
/// Cookie binding an OAuth initiation to its callback
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

fn build_cookie(
    name: &'static str,
    value: String,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

pub fn session_cookie(token: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    build_cookie(SESSION_COOKIE, token, max_age_secs, secure)
}

pub fn oauth_state_cookie(state: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    build_cookie(OAUTH_STATE_COOKIE, state, max_age_secs, secure)
}

/// Empty, already-expired cookie that makes the browser drop `name`
///
/// Added to the jar rather than passed to `CookieJar::remove`, so the
/// `Set-Cookie` is sent even when the request did not carry the cookie.
pub fn clear_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie
}
