//! Authentication extractor
//!
//! Protects routes that require a signed-in user.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;

use super::cookies::SESSION_COOKIE;
use super::session::AuthContext;
use crate::AppState;
use crate::error::AppError;

/// Session token presented by the client, if any
pub(crate) fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
}

/// Extractor for current authenticated user
///
/// Resolves the `session_id` cookie once per request and caches the
/// resulting [`AuthContext`] in the request extensions.
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(context): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", context.profile.user.first_name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<AuthContext>().cloned() {
            return Ok(CurrentUser(context));
        }

        let state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let token = session_token(&jar).ok_or(AppError::Unauthorized)?;

        let context = state.sessions.resolve(token).await?;
        parts.extensions.insert(context.clone());

        Ok(CurrentUser(context))
    }
}
