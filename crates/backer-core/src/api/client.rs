//! Client for the backend authentication endpoints.
//!
//! Wraps `POST /login`, `GET /auth/status`, `GET /auth/profile` and
//! `POST /auth/logout`, and builds the `GET /auth/{provider}` redirect targets.

use std::time::Duration;

use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::auth::{OAuthProvider, Profile, Provider};
use crate::config::Config;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "login";
const STATUS_PATH: &str = "auth/status";
const PROFILE_PATH: &str = "auth/profile";
const LOGOUT_PATH: &str = "auth/logout";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(default, alias = "picture", alias = "pictureUrl")]
    pub picture_url: Option<String>,
    pub provider: Provider,
    #[serde(default)]
    pub role: Option<String>,
}

impl ProfileResponse {
    pub fn into_profile(self) -> Profile {
        Profile {
            name: self
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| self.email.clone()),
            email: self.email,
            picture_url: self.picture_url,
            provider: self.provider,
        }
    }
}

/// Which OAuth providers the backend currently offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ProviderStatus {
    #[serde(default, alias = "googleAvailable", alias = "google")]
    pub google_available: bool,
    #[serde(default, alias = "facebookAvailable", alias = "facebook")]
    pub facebook_available: bool,
}

impl ProviderStatus {
    pub fn is_available(&self, provider: OAuthProvider) -> bool {
        match provider {
            OAuthProvider::Google => self.google_available,
            OAuthProvider::Facebook => self.facebook_available,
        }
    }

    pub fn available(&self) -> Vec<OAuthProvider> {
        OAuthProvider::ALL
            .into_iter()
            .filter(|p| self.is_available(*p))
            .collect()
    }
}

/// HTTP client for the backend auth API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct BackendAuthClient {
    client: Client,
    base_url: Url,
}

impl BackendAuthClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.backend_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.backend_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.backend_url.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join a relative endpoint path onto the base URL, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL always accepts path segments
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path.split('/'));
        }
        url
    }

    /// Browser redirect target that starts the provider's OAuth flow
    pub fn authorize_url(&self, provider: OAuthProvider) -> Url {
        self.endpoint(&format!("auth/{}", provider.as_str()))
    }

    /// Exchange email and password for a bearer token
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .client
            .post(self.endpoint(LOGIN_PATH))
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response, "login").await
    }

    /// Ask which OAuth providers are configured. Any failure reads as "none".
    pub async fn provider_status(&self) -> ProviderStatus {
        match self.fetch_provider_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Could not fetch OAuth provider status");
                ProviderStatus::default()
            }
        }
    }

    async fn fetch_provider_status(&self) -> Result<ProviderStatus, ApiError> {
        let response = self.client.get(self.endpoint(STATUS_PATH)).send().await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response, "provider status").await
    }

    /// Resolve the identity behind a freshly issued token
    pub async fn fetch_profile(&self, token: &str) -> Result<ProfileResponse, ApiError> {
        let response = self
            .client
            .get(self.endpoint(PROFILE_PATH))
            .bearer_auth(token)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response, "profile").await
    }

    /// Tell the backend the token is no longer in use
    pub async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.endpoint(LOGOUT_PATH))
            .bearer_auth(token)
            .send()
            .await?;

        Self::check_response(response).await?;
        debug!("Backend logout acknowledged");
        Ok(())
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, ApiError> {
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {} response: {}", what, e)))
    }
}

// ============================================================================
// Tests
// ============================================================================
