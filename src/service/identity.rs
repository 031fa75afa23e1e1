//! Identity reconciliation
//!
//! Maps a provider profile to exactly one local user:
//! 1. a known (provider, provider_uid) pair wins, and its tokens are refreshed
//! 2. otherwise an existing user with the same email is linked
//! 3. otherwise a new user is created together with the identity
//!
//! Concurrent callbacks for the same external account race on the
//! `oauth_identities` unique index; the loser gets `Conflict`.

use std::sync::Arc;

use chrono::Utc;

use super::account::mask_email;
use crate::auth::{ProviderProfile, ProviderTokens};
use crate::data::{Database, EntityId, OAuthIdentity, User, normalize_email};
use crate::error::AppError;
use crate::metrics::{USERS_CREATED_TOTAL, record_auth_attempt};

/// How a profile was matched to a local user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Identity already linked
    ReturningIdentity,
    /// Linked to a pre-existing user with the same email
    LinkedExistingUser,
    /// New user created
    CreatedUser,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::ReturningIdentity => "returning_identity",
            Resolution::LinkedExistingUser => "linked_existing_user",
            Resolution::CreatedUser => "created_user",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub user: User,
    pub resolution: Resolution,
}

/// Identity reconciler
pub struct IdentityReconciler {
    db: Arc<Database>,
}

impl IdentityReconciler {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Resolve a provider profile to a local user, linking as needed
    ///
    /// # Errors
    /// - `Validation` if a new identity arrives without an email
    /// - `Conflict` if a concurrent callback linked the same identity first
    /// - `Internal` if an identity points at a missing user
    pub async fn reconcile(
        &self,
        profile: &ProviderProfile,
        tokens: &ProviderTokens,
    ) -> Result<Reconciled, AppError> {
        let provider = profile.provider;
        let now = Utc::now();

        if let Some(mut identity) = self
            .db
            .get_oauth_identity(provider, &profile.provider_uid)
            .await?
        {
            let user = self.db.get_user(&identity.user_id).await?.ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "oauth identity {} references missing user {}",
                    identity.id,
                    identity.user_id
                ))
            })?;

            identity.access_token = tokens.access_token.clone();
            // Providers omit the refresh token on repeat consent
            if tokens.refresh_token.is_some() {
                identity.refresh_token = tokens.refresh_token.clone();
            }
            identity.token_expires_at = tokens.expires_at;
            identity.avatar_url = profile.avatar_url.clone();
            identity.updated_at = now;
            self.db.update_oauth_identity_tokens(&identity).await?;

            return Ok(self.finish(user, Resolution::ReturningIdentity, profile));
        }

        let email = normalize_email(&profile.email);
        if email.is_empty() {
            record_auth_attempt(provider.as_str(), "missing_email");
            tracing::info!(
                %provider,
                "OAuth login rejected: provider shared no email for a new identity"
            );
            return Err(AppError::Validation(format!(
                "Your {provider} account has no verified email address"
            )));
        }

        let identity_for = |user_id: &str| OAuthIdentity {
            id: EntityId::new().0,
            user_id: user_id.to_string(),
            provider,
            provider_uid: profile.provider_uid.clone(),
            email: email.clone(),
            avatar_url: profile.avatar_url.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            token_expires_at: tokens.expires_at,
            created_at: now,
            updated_at: now,
        };

        if let Some(user) = self.db.find_user_by_email(&email).await? {
            self.db.insert_oauth_identity(&identity_for(&user.id)).await?;
            return Ok(self.finish(user, Resolution::LinkedExistingUser, profile));
        }

        let user = User {
            id: EntityId::new().0,
            first_name: profile.first_name.clone(),
            last_name: Some(profile.last_name.clone()).filter(|name| !name.is_empty()),
            email: email.clone(),
            email_verified: true,
            phone: None,
            phone_verified: false,
            password_hash: None,
            created_at: now,
            updated_at: now,
        };
        self.db
            .insert_user_with_identity(&user, &identity_for(&user.id))
            .await?;
        USERS_CREATED_TOTAL
            .with_label_values(&[provider.as_str()])
            .inc();

        Ok(self.finish(user, Resolution::CreatedUser, profile))
    }

    fn finish(&self, user: User, resolution: Resolution, profile: &ProviderProfile) -> Reconciled {
        record_auth_attempt(profile.provider.as_str(), "success");
        tracing::info!(
            user_id = %user.id,
            provider = %profile.provider,
            email = %mask_email(&user.email),
            resolution = resolution.as_str(),
            "OAuth identity reconciled"
        );

        Reconciled { user, resolution }
    }
}
