//! User endpoints

use axum::{Json, Router, routing::get};

use super::dto::UserResponse;
use crate::AppState;
use crate::auth::CurrentUser;

/// Create user router
///
/// Routes:
/// - GET /users/me - Profile of the signed-in user
pub fn users_router() -> Router<AppState> {
    Router::new().route("/users/me", get(current_user))
}

/// GET /users/me
async fn current_user(CurrentUser(context): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(context.profile))
}
