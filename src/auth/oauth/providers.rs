//! Provider endpoints and user-info normalization
//!
//! Each provider answers its user-info endpoint with a different JSON shape.
//! The structs here mirror those shapes and collapse them into
//! [`ProviderProfile`].

use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::data::OAuthProvider;

/// Provider account normalized to the fields the reconciler needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider: OAuthProvider,
    /// Provider-scoped account id
    pub provider_uid: String,
    /// Empty when the provider disclosed no email
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: String,
}

/// Resolved client settings for one provider
#[derive(Debug, Clone)]
pub(crate) struct ProviderEndpoints {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub emails_url: Option<String>,
    pub scopes: Vec<String>,
    /// Fixed extra parameters appended to the consent URL
    pub extra_auth_params: &'static [(&'static str, &'static str)],
}

impl ProviderEndpoints {
    /// Merge configured overrides onto the provider's public endpoints
    pub fn resolve(provider: OAuthProvider, config: &ProviderConfig) -> Self {
        let defaults = DefaultEndpoints::for_provider(provider);

        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url: config
                .auth_url
                .clone()
                .unwrap_or_else(|| defaults.auth_url.to_string()),
            token_url: config
                .token_url
                .clone()
                .unwrap_or_else(|| defaults.token_url.to_string()),
            userinfo_url: config
                .userinfo_url
                .clone()
                .unwrap_or_else(|| defaults.userinfo_url.to_string()),
            emails_url: config
                .emails_url
                .clone()
                .or_else(|| defaults.emails_url.map(str::to_string)),
            scopes: config.scopes.clone().unwrap_or_else(|| {
                defaults.scopes.iter().map(|s| s.to_string()).collect()
            }),
            extra_auth_params: defaults.extra_auth_params,
        }
    }
}

struct DefaultEndpoints {
    auth_url: &'static str,
    token_url: &'static str,
    userinfo_url: &'static str,
    emails_url: Option<&'static str>,
    scopes: &'static [&'static str],
    extra_auth_params: &'static [(&'static str, &'static str)],
}

impl DefaultEndpoints {
    fn for_provider(provider: OAuthProvider) -> Self {
        match provider {
            OAuthProvider::Google => Self {
                auth_url: "https://accounts.google.com/o/oauth2/auth",
                token_url: "https://oauth2.googleapis.com/token",
                userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo",
                emails_url: None,
                scopes: &[
                    "https://www.googleapis.com/auth/userinfo.email",
                    "https://www.googleapis.com/auth/userinfo.profile",
                ],
                // Refresh tokens are only issued for offline access
                extra_auth_params: &[("access_type", "offline")],
            },
            OAuthProvider::GitHub => Self {
                auth_url: "https://github.com/login/oauth/authorize",
                token_url: "https://github.com/login/oauth/access_token",
                userinfo_url: "https://api.github.com/user",
                emails_url: Some("https://api.github.com/user/emails"),
                scopes: &["user:email", "read:user"],
                extra_auth_params: &[],
            },
            OAuthProvider::LinkedIn => Self {
                auth_url: "https://www.linkedin.com/oauth/v2/authorization",
                token_url: "https://www.linkedin.com/oauth/v2/accessToken",
                userinfo_url: "https://api.linkedin.com/v2/userinfo",
                emails_url: None,
                scopes: &["openid", "profile", "email"],
                extra_auth_params: &[],
            },
        }
    }
}

// =============================================================================
// Google
// =============================================================================

/// Google `oauth2/v2/userinfo` response
#[derive(Debug, Deserialize)]
pub(crate) struct GoogleUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl From<GoogleUser> for ProviderProfile {
    fn from(user: GoogleUser) -> Self {
        Self {
            provider: OAuthProvider::Google,
            provider_uid: user.id,
            email: user.email.unwrap_or_default(),
            first_name: user.given_name.unwrap_or_default(),
            last_name: user.family_name.unwrap_or_default(),
            avatar_url: user.picture.unwrap_or_default(),
        }
    }
}

// =============================================================================
// GitHub
// =============================================================================

/// GitHub `/user` response
#[derive(Debug, Deserialize)]
pub(crate) struct GitHubUser {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// One entry of GitHub's `/user/emails` response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GitHubEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

impl GitHubUser {
    /// Public profile email, if any
    pub fn public_email(&self) -> Option<&str> {
        self.email.as_deref().filter(|email| !email.is_empty())
    }

    /// Normalize, using `email` in place of the (possibly hidden) profile email
    pub fn into_profile(self, email: String) -> ProviderProfile {
        let (first_name, last_name) = match self.name.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => split_display_name(name),
            None => (self.login.clone(), String::new()),
        };

        ProviderProfile {
            provider: OAuthProvider::GitHub,
            provider_uid: self.id.to_string(),
            email,
            first_name,
            last_name,
            avatar_url: self.avatar_url.unwrap_or_default(),
        }
    }
}

/// Split a display name on its first space
pub(crate) fn split_display_name(name: &str) -> (String, String) {
    match name.split_once(' ') {
        Some((first, last)) if !first.is_empty() => (first.to_string(), last.to_string()),
        _ => (name.to_string(), String::new()),
    }
}

/// Pick the email GitHub would use for this account
///
/// Prefers an entry that is both primary and verified, then the first
/// verified entry.
pub(crate) fn select_github_email(emails: &[GitHubEmail]) -> Option<String> {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
        .map(|e| e.email.clone())
}

// =============================================================================
// LinkedIn
// =============================================================================

/// LinkedIn OpenID Connect `/v2/userinfo` response
#[derive(Debug, Deserialize)]
pub(crate) struct LinkedInUser {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl From<LinkedInUser> for ProviderProfile {
    fn from(user: LinkedInUser) -> Self {
        Self {
            provider: OAuthProvider::LinkedIn,
            provider_uid: user.sub,
            email: user.email.unwrap_or_default(),
            first_name: user.given_name.unwrap_or_default(),
            last_name: user.family_name.unwrap_or_default(),
            avatar_url: user.picture.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github_user(name: Option<&str>, email: Option<&str>) -> GitHubUser {
        GitHubUser {
            id: 583231,
            login: "octocat".to_string(),
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            avatar_url: Some("https://avatars.githubusercontent.com/u/583231".to_string()),
        }
    }

    fn email(address: &str, primary: bool, verified: bool) -> GitHubEmail {
        GitHubEmail {
            email: address.to_string(),
            primary,
            verified,
        }
    }

    #[test]
    fn github_name_splits_on_first_space() {
        let profile = github_user(Some("Ada Lovelace"), None).into_profile(String::new());
        assert_eq!(profile.first_name, "Ada");
        assert_eq!(profile.last_name, "Lovelace");

        let profile = github_user(Some("Ada King Lovelace"), None).into_profile(String::new());
        assert_eq!(profile.first_name, "Ada");
        assert_eq!(profile.last_name, "King Lovelace");
    }

    #[test]
    fn github_single_word_name_has_empty_last_name() {
        let profile = github_user(Some("Madonna"), None).into_profile(String::new());
        assert_eq!(profile.first_name, "Madonna");
        assert_eq!(profile.last_name, "");
    }

    #[test]
    fn github_missing_name_falls_back_to_login() {
        for name in [None, Some("")] {
            let profile = github_user(name, None).into_profile(String::new());
            assert_eq!(profile.first_name, "octocat");
            assert_eq!(profile.last_name, "");
        }
    }

    #[test]
    fn github_profile_uses_numeric_id_and_avatar() {
        let profile = github_user(None, None).into_profile("octo@example.com".to_string());
        assert_eq!(profile.provider, OAuthProvider::GitHub);
        assert_eq!(profile.provider_uid, "583231");
        assert_eq!(profile.email, "octo@example.com");
        assert!(profile.avatar_url.ends_with("/u/583231"));
    }

    #[test]
    fn github_public_email_ignores_empty_string() {
        assert_eq!(github_user(None, Some("")).public_email(), None);
        assert_eq!(
            github_user(None, Some("octo@example.com")).public_email(),
            Some("octo@example.com")
        );
    }

    #[test]
    fn github_email_prefers_primary_verified() {
        let emails = vec![
            email("first@example.com", false, true),
            email("primary@example.com", true, true),
        ];
        assert_eq!(
            select_github_email(&emails).as_deref(),
            Some("primary@example.com")
        );
    }

    #[test]
    fn github_email_falls_back_to_first_verified_entry() {
        let emails = vec![
            email("first@example.com", false, true),
            email("primary@example.com", true, false),
        ];
        assert_eq!(
            select_github_email(&emails).as_deref(),
            Some("first@example.com")
        );
    }

    #[test]
    fn github_email_skips_unverified_leading_entries() {
        let emails = vec![
            email("old@example.com", false, false),
            email("work@example.com", false, true),
        ];
        assert_eq!(
            select_github_email(&emails).as_deref(),
            Some("work@example.com")
        );
    }

    #[test]
    fn github_email_is_blank_without_verified_candidates() {
        let emails = vec![
            email("first@example.com", false, false),
            email("primary@example.com", true, false),
        ];
        assert_eq!(select_github_email(&emails), None);
        assert_eq!(select_github_email(&[]), None);
    }

    #[test]
    fn google_profile_maps_given_and_family_name() {
        let user: GoogleUser = serde_json::from_value(serde_json::json!({
            "id": "1075",
            "email": "ada@example.com",
            "verified_email": true,
            "name": "Ada Lovelace",
            "given_name": "Ada",
            "family_name": "Lovelace",
            "picture": "https://lh3.googleusercontent.com/a/ada"
        }))
        .unwrap();

        let profile = ProviderProfile::from(user);
        assert_eq!(profile.provider, OAuthProvider::Google);
        assert_eq!(profile.provider_uid, "1075");
        assert_eq!(profile.first_name, "Ada");
        assert_eq!(profile.last_name, "Lovelace");
        assert_eq!(profile.avatar_url, "https://lh3.googleusercontent.com/a/ada");
    }

    #[test]
    fn linkedin_profile_uses_subject_as_uid() {
        let user: LinkedInUser = serde_json::from_value(serde_json::json!({
            "sub": "782bbtaQ",
            "email": "ada@example.com",
            "email_verified": true,
            "given_name": "Ada",
            "family_name": "Lovelace"
        }))
        .unwrap();

        let profile = ProviderProfile::from(user);
        assert_eq!(profile.provider, OAuthProvider::LinkedIn);
        assert_eq!(profile.provider_uid, "782bbtaQ");
        assert_eq!(profile.avatar_url, "");
    }

    #[test]
    fn configured_endpoints_override_defaults() {
        let config = ProviderConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            auth_url: None,
            token_url: Some("http://127.0.0.1:9000/token".to_string()),
            userinfo_url: None,
            emails_url: None,
            scopes: None,
        };

        let endpoints = ProviderEndpoints::resolve(OAuthProvider::GitHub, &config);
        assert_eq!(endpoints.auth_url, "https://github.com/login/oauth/authorize");
        assert_eq!(endpoints.token_url, "http://127.0.0.1:9000/token");
        assert_eq!(
            endpoints.emails_url.as_deref(),
            Some("https://api.github.com/user/emails")
        );
        assert_eq!(endpoints.scopes, vec!["user:email", "read:user"]);

        let google = ProviderEndpoints::resolve(OAuthProvider::Google, &config);
        assert_eq!(google.extra_auth_params, &[("access_type", "offline")]);
        assert_eq!(google.emails_url, None);
    }
}
