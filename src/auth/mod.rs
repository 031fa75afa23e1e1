//! Authentication
//!
//! Handles:
//! - Password hashing
//! - OAuth provider flow
//! - Session management
//! - Authentication extractor and routes

pub mod cookies;
mod middleware;
pub mod oauth;
mod password;
mod routes;
pub mod session;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

pub use middleware::CurrentUser;
pub use oauth::{OAuthGateway, ProviderProfile, ProviderTokens};
pub use password::CredentialVerifier;
pub use routes::auth_router;
pub use session::{AuthContext, IssuedSession, SessionManager};

/// Random 256-bit token, base64url without padding
///
/// Used for session tokens and OAuth state values.
pub(crate) fn generate_token() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
