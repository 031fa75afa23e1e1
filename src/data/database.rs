//! SQLite database operations
//!
//! All database access goes through this module.
//! Uniqueness of emails, provider identities and session tokens is enforced
//! by the schema; collisions surface as [`AppError::Conflict`].

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

const EMAIL_TAKEN: &str = "Email already exists";
const IDENTITY_TAKEN: &str = "OAuth account is already linked";

fn map_insert_error(error: sqlx::Error) -> AppError {
    let message = match &error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            if db_error.message().contains("oauth_identities") {
                IDENTITY_TAKEN
            } else {
                EMAIL_TAKEN
            }
        }
        _ => return AppError::Database(error),
    };

    AppError::Conflict(message.to_string())
}

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a user together with its social links
    ///
    /// # Errors
    /// `Conflict` if the email is already registered
    pub async fn insert_user(
        &self,
        user: &User,
        socials: &[SocialAccount],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id, first_name, last_name, email, email_verified,
                phone, phone_verified, password_hash, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.email_verified)
        .bind(&user.phone)
        .bind(user.phone_verified)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        for social in socials {
            sqlx::query(
                r#"
                INSERT INTO social_accounts (
                    id, user_id, platform, username, url, created_at, updated_at, deleted_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&social.id)
            .bind(&social.user_id)
            .bind(social.platform)
            .bind(&social.username)
            .bind(&social.url)
            .bind(social.created_at)
            .bind(social.updated_at)
            .bind(social.deleted_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get user by ID
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find user by email (case-insensitive)
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Load a user with its non-deleted social links and linked providers
    pub async fn get_user_profile(&self, id: &str) -> Result<Option<UserProfile>, AppError> {
        let Some(user) = self.get_user(id).await? else {
            return Ok(None);
        };

        let socials = sqlx::query_as::<_, SocialAccount>(
            "SELECT * FROM social_accounts WHERE user_id = ? AND deleted_at IS NULL ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let oauth_providers = sqlx::query_scalar::<_, OAuthProvider>(
            "SELECT provider FROM oauth_identities WHERE user_id = ? ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(UserProfile {
            user,
            socials,
            oauth_providers,
        }))
    }

    // =========================================================================
    // OAuth identities
    // =========================================================================

    /// Get identity by provider and provider-scoped account id
    pub async fn get_oauth_identity(
        &self,
        provider: OAuthProvider,
        provider_uid: &str,
    ) -> Result<Option<OAuthIdentity>, AppError> {
        let identity = sqlx::query_as::<_, OAuthIdentity>(
            "SELECT * FROM oauth_identities WHERE provider = ? AND provider_uid = ?",
        )
        .bind(provider)
        .bind(provider_uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    /// Link a provider identity to an existing user
    ///
    /// # Errors
    /// `Conflict` if the (provider, provider_uid) pair is already linked
    pub async fn insert_oauth_identity(&self, identity: &OAuthIdentity) -> Result<(), AppError> {
        Self::insert_oauth_identity_with(&self.pool, identity)
            .await
            .map_err(map_insert_error)
    }

    /// Create a user and its first provider identity atomically
    ///
    /// # Errors
    /// `Conflict` if either the email or the identity already exists
    pub async fn insert_user_with_identity(
        &self,
        user: &User,
        identity: &OAuthIdentity,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id, first_name, last_name, email, email_verified,
                phone, phone_verified, password_hash, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.email_verified)
        .bind(&user.phone)
        .bind(user.phone_verified)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        Self::insert_oauth_identity_with(&mut *tx, identity)
            .await
            .map_err(map_insert_error)?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_oauth_identity_with<'e, E>(
        executor: E,
        identity: &OAuthIdentity,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO oauth_identities (
                id, user_id, provider, provider_uid, email, avatar_url,
                access_token, refresh_token, token_expires_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&identity.id)
        .bind(&identity.user_id)
        .bind(identity.provider)
        .bind(&identity.provider_uid)
        .bind(&identity.email)
        .bind(&identity.avatar_url)
        .bind(&identity.access_token)
        .bind(&identity.refresh_token)
        .bind(identity.token_expires_at)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Refresh stored provider tokens and avatar in place
    pub async fn update_oauth_identity_tokens(
        &self,
        identity: &OAuthIdentity,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE oauth_identities
            SET access_token = ?, refresh_token = ?, token_expires_at = ?,
                avatar_url = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&identity.access_token)
        .bind(&identity.refresh_token)
        .bind(identity.token_expires_at)
        .bind(&identity.avatar_url)
        .bind(identity.updated_at)
        .bind(&identity.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Insert session
    pub async fn insert_session(&self, session: &Session) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, token_hash, user_id, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.token_hash)
        .bind(&session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get session by token digest
    pub async fn get_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// Delete session by ID
    pub async fn delete_session(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete session by token digest
    pub async fn delete_session_by_token_hash(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every session of a user
    pub async fn delete_sessions_for_user(&self, user_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete sessions whose expiry is at or before `now`
    pub async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
impl Database {
    /// Count identities linked to a user
    pub async fn count_oauth_identities(&self, user_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM oauth_identities WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Count sessions of a user
    pub async fn count_sessions_for_user(&self, user_id: &str) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Delete a user row while leaving its sessions and identities behind
    ///
    /// Foreign keys are switched off on one pooled connection only, and back
    /// on before it is returned.
    pub async fn delete_user_unchecked(&self, id: &str) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await;
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&mut *conn)
            .await?;

        result?;
        Ok(())
    }
}
