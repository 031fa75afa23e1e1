//! Account service
//!
//! Local (email + password) signup and login.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::CredentialVerifier;
use crate::data::{Database, EntityId, SocialAccount, SocialPlatform, User, normalize_email};
use crate::error::AppError;
use crate::metrics::{USERS_CREATED_TOTAL, record_auth_attempt};

const MIN_PASSWORD_CHARS: usize = 8;
const MAX_PHONE_CHARS: usize = 20;
const MAX_LINKEDIN_CHARS: usize = 255;

/// Validated-on-use signup input
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    /// LinkedIn profile URL
    pub linkedin: Option<String>,
}

/// Mask an email for logging: `a***@example.com`
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        _ => "***@***".to_string(),
    }
}

fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Minimal structural check: one `@`, non-empty local part, dotted domain
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Username shown for a LinkedIn profile URL: its last path segment
fn linkedin_username(url: &str) -> String {
    if let Some(segment) = url::Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
    }) {
        return segment;
    }

    // Scheme-less input such as "linkedin.com/in/ada"
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

/// Account service
pub struct AccountService {
    db: Arc<Database>,
    verifier: CredentialVerifier,
}

impl AccountService {
    /// Create new account service
    pub fn new(db: Arc<Database>, verifier: CredentialVerifier) -> Self {
        Self { db, verifier }
    }

    /// Register a password account
    ///
    /// # Errors
    /// - `Validation` for malformed input
    /// - `Conflict` if the email is already registered
    pub async fn signup(&self, input: NewAccount) -> Result<User, AppError> {
        let email = normalize_email(&input.email);
        if !is_valid_email(&email) {
            return Err(AppError::Validation("email must be a valid address".to_string()));
        }
        if input.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }

        let phone = normalize_optional_text(input.phone);
        if phone
            .as_ref()
            .is_some_and(|phone| phone.chars().count() > MAX_PHONE_CHARS)
        {
            return Err(AppError::Validation(format!(
                "phoneNo must be at most {MAX_PHONE_CHARS} characters"
            )));
        }

        let linkedin = normalize_optional_text(input.linkedin);
        if linkedin
            .as_ref()
            .is_some_and(|url| url.chars().count() > MAX_LINKEDIN_CHARS)
        {
            return Err(AppError::Validation(format!(
                "linkedIn must be at most {MAX_LINKEDIN_CHARS} characters"
            )));
        }

        // Missing first name falls back to the email's local part
        let first_name = normalize_optional_text(input.first_name).unwrap_or_else(|| {
            email
                .split_once('@')
                .map(|(local, _)| local.to_string())
                .unwrap_or_default()
        });
        let last_name = normalize_optional_text(input.last_name);

        let password_hash = self.hash_password(input.password).await?;

        let now = Utc::now();
        let user = User {
            id: EntityId::new().0,
            first_name,
            last_name,
            email,
            email_verified: false,
            phone,
            phone_verified: false,
            password_hash: Some(password_hash),
            created_at: now,
            updated_at: now,
        };

        let socials: Vec<SocialAccount> = linkedin
            .map(|url| SocialAccount {
                id: EntityId::new().0,
                user_id: user.id.clone(),
                platform: SocialPlatform::LinkedIn,
                username: linkedin_username(&url),
                url,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            })
            .into_iter()
            .collect();

        if let Err(error) = self.db.insert_user(&user, &socials).await {
            if matches!(error, AppError::Conflict(_)) {
                tracing::info!(email = %mask_email(&user.email), "Signup rejected: email taken");
            }
            return Err(error);
        }

        USERS_CREATED_TOTAL.with_label_values(&["password"]).inc();
        tracing::info!(
            user_id = %user.id,
            email = %mask_email(&user.email),
            "User signed up"
        );

        Ok(user)
    }

    /// Check email and password
    ///
    /// # Errors
    /// - `InvalidCredentials` for an unknown email or a wrong password
    /// - `PasswordNotSet` for accounts created through OAuth only
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "email and password are required".to_string(),
            ));
        }

        let Some(user) = self.db.find_user_by_email(email).await? else {
            record_auth_attempt("password", "unknown_user");
            tracing::info!(email = %mask_email(&normalize_email(email)), "Login failed");
            return Err(AppError::InvalidCredentials);
        };

        let Some(password_hash) = user.password_hash.clone() else {
            record_auth_attempt("password", "no_password");
            tracing::info!(user_id = %user.id, "Login rejected: account has no password");
            return Err(AppError::PasswordNotSet);
        };

        if !self.verify_password(password_hash, password.to_string()).await? {
            record_auth_attempt("password", "wrong_password");
            tracing::info!(user_id = %user.id, "Login failed");
            return Err(AppError::InvalidCredentials);
        }

        record_auth_attempt("password", "success");
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| AppError::Internal(e.into()))?
    }

    async fn verify_password(&self, hash: String, password: String) -> Result<bool, AppError> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || verifier.verify(&hash, &password))
            .await
            .map_err(|e| AppError::Internal(e.into()))
    }
}
