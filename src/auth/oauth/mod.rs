//! OAuth 2.0 authorization code flow against third-party providers
//!
//! The gateway is built once from [`OAuthConfig`] and shared through
//! `AppState`. It never touches the database; reconciling a fetched
//! profile with local users is the identity service's job.
//!
//! Every outbound call goes through one `reqwest::Client` with a request
//! timeout, and is timed in `authhub_provider_request_duration_seconds`.

mod providers;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub use providers::ProviderProfile;
use providers::{
    GitHubEmail, GitHubUser, GoogleUser, LinkedInUser, ProviderEndpoints, select_github_email,
};

use crate::config::OAuthConfig;
use crate::data::OAuthProvider;
use crate::error::AppError;
use crate::metrics::observe_provider_request;

/// Consent redirect for one pending login
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    /// Anti-forgery value to round-trip through the state cookie
    pub state: String,
}

/// Tokens returned by a provider's token endpoint
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Token endpoint response
///
/// GitHub reports a bad code with `200 OK` and an `error` field, so both
/// the status and the body are checked.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client for the configured identity providers
pub struct OAuthGateway {
    providers: HashMap<OAuthProvider, ProviderEndpoints>,
    http: reqwest::Client,
    /// Public base URL of this service, used to build redirect URIs
    base_url: String,
}

impl OAuthGateway {
    /// Build the gateway
    ///
    /// # Arguments
    /// * `config` - OAuth configuration (providers without a block stay disabled)
    /// * `base_url` - Public base URL of this service
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &OAuthConfig, base_url: &str) -> Result<Self, AppError> {
        let providers = config
            .providers()
            .into_iter()
            .map(|(provider, provider_config)| {
                (
                    provider,
                    ProviderEndpoints::resolve(provider, provider_config),
                )
            })
            .collect::<HashMap<_, _>>();

        let http = reqwest::Client::builder()
            .user_agent(concat!("authhub/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        tracing::info!(
            providers = ?providers.keys().map(OAuthProvider::as_str).collect::<Vec<_>>(),
            "OAuth gateway initialized"
        );

        Ok(Self {
            providers,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Whether a provider has client credentials configured
    pub fn is_enabled(&self, provider: OAuthProvider) -> bool {
        self.providers.contains_key(&provider)
    }

    fn endpoints(&self, provider: OAuthProvider) -> Result<&ProviderEndpoints, AppError> {
        self.providers.get(&provider).ok_or(AppError::NotFound)
    }

    /// Callback URL registered with the provider
    pub fn redirect_uri(&self, provider: OAuthProvider) -> String {
        format!("{}/auth/{}/callback", self.base_url, provider)
    }

    // =========================================================================
    // Initiate
    // =========================================================================

    /// Build the provider consent URL with a fresh state token
    ///
    /// # Errors
    /// `NotFound` if the provider is not configured
    pub fn authorize(&self, provider: OAuthProvider) -> Result<AuthorizationRequest, AppError> {
        let endpoints = self.endpoints(provider)?;
        let state = super::generate_token();

        let mut url = url::Url::parse(&endpoints.auth_url).map_err(|e| {
            AppError::Config(format!("oauth.{provider}.auth_url is not a valid URL: {e}"))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &endpoints.client_id)
                .append_pair("redirect_uri", &self.redirect_uri(provider))
                .append_pair("response_type", "code")
                .append_pair("scope", &endpoints.scopes.join(" "))
                .append_pair("state", &state);
            for (key, value) in endpoints.extra_auth_params {
                query.append_pair(key, value);
            }
        }

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
        })
    }

    // =========================================================================
    // Callback
    // =========================================================================

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    /// `TokenExchange` on transport failure, non-2xx status, undecodable
    /// body or a provider-reported error
    pub async fn exchange_code(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<ProviderTokens, AppError> {
        let endpoints = self.endpoints(provider)?;
        let redirect_uri = self.redirect_uri(provider);
        let started = Instant::now();

        let result: Result<TokenResponse, reqwest::Error> = async {
            let response = self
                .http
                .post(&endpoints.token_url)
                .header(reqwest::header::ACCEPT, "application/json")
                .form(&[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("client_id", endpoints.client_id.as_str()),
                    ("client_secret", endpoints.client_secret.as_str()),
                ])
                .send()
                .await?
                .error_for_status()?;

            response.json::<TokenResponse>().await
        }
        .await;
        observe_provider_request(provider.as_str(), "token", started.elapsed());

        let body = result.map_err(|e| {
            tracing::warn!(%provider, error = %e, "Token exchange request failed");
            AppError::TokenExchange(e.to_string())
        })?;

        if let Some(error) = body.error {
            let description = body.error_description.unwrap_or_default();
            tracing::warn!(%provider, %error, %description, "Provider rejected authorization code");
            return Err(AppError::TokenExchange(format!("{error}: {description}")));
        }

        let access_token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AppError::TokenExchange("token response carried no access_token".to_string())
            })?;

        Ok(ProviderTokens {
            access_token,
            refresh_token: body.refresh_token.filter(|token| !token.is_empty()),
            expires_at: body
                .expires_in
                .filter(|seconds| *seconds > 0)
                .map(|seconds| Utc::now() + chrono::Duration::seconds(seconds)),
        })
    }

    /// Fetch and normalize the signed-in account's profile
    ///
    /// # Errors
    /// `ProviderProfile` on transport failure, non-2xx status or an
    /// undecodable body
    pub async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        tokens: &ProviderTokens,
    ) -> Result<ProviderProfile, AppError> {
        let endpoints = self.endpoints(provider)?;
        let access_token = tokens.access_token.as_str();

        let profile = match provider {
            OAuthProvider::Google => self
                .get_json::<GoogleUser>(provider, "userinfo", &endpoints.userinfo_url, access_token)
                .await?
                .into(),
            OAuthProvider::LinkedIn => self
                .get_json::<LinkedInUser>(
                    provider,
                    "userinfo",
                    &endpoints.userinfo_url,
                    access_token,
                )
                .await?
                .into(),
            OAuthProvider::GitHub => {
                let user = self
                    .get_json::<GitHubUser>(
                        provider,
                        "userinfo",
                        &endpoints.userinfo_url,
                        access_token,
                    )
                    .await?;

                let email = match user.public_email() {
                    Some(email) => email.to_string(),
                    None => self
                        .github_fallback_email(endpoints, access_token)
                        .await
                        .unwrap_or_default(),
                };

                user.into_profile(email)
            }
        };

        if profile.provider_uid.is_empty() {
            return Err(AppError::ProviderProfile(
                "profile carried no account id".to_string(),
            ));
        }

        Ok(profile)
    }

    /// Email from GitHub's email-list endpoint; failures leave it blank
    async fn github_fallback_email(
        &self,
        endpoints: &ProviderEndpoints,
        access_token: &str,
    ) -> Option<String> {
        let emails_url = endpoints.emails_url.as_deref()?;

        match self
            .get_json::<Vec<GitHubEmail>>(OAuthProvider::GitHub, "emails", emails_url, access_token)
            .await
        {
            Ok(emails) => select_github_email(&emails),
            Err(error) => {
                tracing::warn!(%error, "GitHub email lookup failed; continuing without email");
                None
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        provider: OAuthProvider,
        step: &str,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let started = Instant::now();

        let result: Result<T, reqwest::Error> = async {
            self.http
                .get(url)
                .bearer_auth(access_token)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await?
                .error_for_status()?
                .json::<T>()
                .await
        }
        .await;
        observe_provider_request(provider.as_str(), step, started.elapsed());

        result.map_err(|e| {
            tracing::warn!(%provider, step, error = %e, "Provider request failed");
            AppError::ProviderProfile(e.to_string())
        })
    }
}
