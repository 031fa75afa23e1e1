//! API response DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{OAuthProvider, SocialAccount, SocialPlatform, UserProfile};

/// Current user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub email_verified: bool,
    pub phone: Option<String>,
    pub phone_no_verified: bool,
    pub socials: Vec<SocialAccountResponse>,
    pub oauth_providers: Vec<OAuthProviderResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialAccountResponse {
    pub platform: SocialPlatform,
    pub username: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthProviderResponse {
    pub provider: OAuthProvider,
}

impl From<&SocialAccount> for SocialAccountResponse {
    fn from(social: &SocialAccount) -> Self {
        Self {
            platform: social.platform,
            username: social.username.clone(),
            url: social.url.clone(),
        }
    }
}

impl From<UserProfile> for UserResponse {
    fn from(profile: UserProfile) -> Self {
        let user = profile.user;
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            email_verified: user.email_verified,
            phone: user.phone,
            phone_no_verified: user.phone_verified,
            socials: profile.socials.iter().map(SocialAccountResponse::from).collect(),
            oauth_providers: profile
                .oauth_providers
                .into_iter()
                .map(|provider| OAuthProviderResponse { provider })
                .collect(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
