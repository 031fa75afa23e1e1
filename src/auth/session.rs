//! Server-side session management
//!
//! The cookie carries a random 256-bit token; the `sessions` table only
//! stores its SHA-256 digest. A session is valid while `now < expires_at`
//! and its row exists. Expired rows are deleted the first time they are
//! presented, and periodically by [`SessionManager::purge_expired`].

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};

use crate::data::{Database, EntityId, Session, UserProfile};
use crate::error::AppError;
use crate::metrics::{SESSION_RESOLUTIONS_TOTAL, SESSIONS_CREATED_TOTAL};

/// Digest stored in place of the raw session token
pub(crate) fn hash_session_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// A newly created session and the raw token for its cookie
///
/// The token is only available here; it cannot be recovered later.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: Session,
    pub token: String,
}

/// Authenticated request context
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub session: Session,
    pub profile: UserProfile,
}

impl AuthContext {
    pub fn user_id(&self) -> &str {
        &self.profile.user.id
    }
}

/// Issues, resolves and revokes sessions
pub struct SessionManager {
    db: Arc<Database>,
    ttl: Duration,
}

impl SessionManager {
    /// # Arguments
    /// * `db` - Session store
    /// * `max_age_secs` - Absolute session lifetime
    pub fn new(db: Arc<Database>, max_age_secs: i64) -> Self {
        Self {
            db,
            ttl: Duration::seconds(max_age_secs),
        }
    }

    /// Lifetime applied to new sessions, in seconds
    pub fn max_age_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Create a session for a user
    ///
    /// Existing sessions of the user stay valid.
    ///
    /// # Arguments
    /// * `method` - Login method, for metrics ("password", "signup", "google", ...)
    pub async fn create(&self, user_id: &str, method: &str) -> Result<IssuedSession, AppError> {
        let token = super::generate_token();
        let now = Utc::now();

        let session = Session {
            id: EntityId::new().0,
            token_hash: hash_session_token(&token),
            user_id: user_id.to_string(),
            expires_at: now + self.ttl,
            created_at: now,
        };
        self.db.insert_session(&session).await?;

        SESSIONS_CREATED_TOTAL.with_label_values(&[method]).inc();
        tracing::debug!(user_id, session_id = %session.id, method, "Session created");

        Ok(IssuedSession { session, token })
    }

    /// Resolve a presented token to its user
    ///
    /// # Errors
    /// `Unauthorized` if the token is unknown, expired, or its user is gone.
    /// An expired session is deleted before returning.
    pub async fn resolve(&self, token: &str) -> Result<AuthContext, AppError> {
        let outcome = self.resolve_inner(token).await;

        let label = match &outcome {
            Ok(_) => "valid",
            Err(Rejection::Unknown) => "unknown",
            Err(Rejection::Expired) => "expired",
            Err(Rejection::Orphaned) => "orphaned",
            Err(Rejection::Failed(_)) => "error",
        };
        SESSION_RESOLUTIONS_TOTAL.with_label_values(&[label]).inc();

        outcome.map_err(|rejection| match rejection {
            Rejection::Failed(error) => error,
            _ => AppError::Unauthorized,
        })
    }

    async fn resolve_inner(&self, token: &str) -> Result<AuthContext, Rejection> {
        if token.is_empty() {
            return Err(Rejection::Unknown);
        }

        let session = self
            .db
            .get_session_by_token_hash(&hash_session_token(token))
            .await?
            .ok_or(Rejection::Unknown)?;

        if session.is_expired_at(Utc::now()) {
            self.db.delete_session(&session.id).await?;
            tracing::debug!(session_id = %session.id, "Expired session removed");
            return Err(Rejection::Expired);
        }

        let Some(profile) = self.db.get_user_profile(&session.user_id).await? else {
            tracing::warn!(
                session_id = %session.id,
                user_id = %session.user_id,
                "Session references a missing user"
            );
            return Err(Rejection::Orphaned);
        };

        Ok(AuthContext { session, profile })
    }

    /// Delete the session for a token; absent sessions are not an error
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        if token.is_empty() {
            return Ok(());
        }

        if self
            .db
            .delete_session_by_token_hash(&hash_session_token(token))
            .await?
        {
            tracing::debug!("Session revoked");
        }

        Ok(())
    }

    /// Delete every session of a user
    ///
    /// # Returns
    /// Number of sessions removed
    pub async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, AppError> {
        let removed = self.db.delete_sessions_for_user(user_id).await?;
        tracing::info!(user_id, removed, "All sessions revoked for user");
        Ok(removed)
    }

    /// Delete every expired session
    ///
    /// # Returns
    /// Number of sessions removed
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        self.db.delete_expired_sessions(Utc::now()).await
    }
}

enum Rejection {
    Unknown,
    Expired,
    Orphaned,
    Failed(AppError),
}

impl From<AppError> for Rejection {
    fn from(error: AppError) -> Self {
        Rejection::Failed(error)
    }
}
