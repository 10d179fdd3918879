use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::{ApiError, BackendAuthClient, ProviderStatus};
use crate::token::TokenError;

use super::callback::OAuthCallbackResult;
use super::credentials::{Credential, CredentialStore, OAuthProvider, Profile};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Backend unreachable")]
    BackendUnreachable,

    #[error("Provider denied sign-in: {0}")]
    ProviderDenied(String),

    #[error("Could not fetch profile for OAuth token")]
    ProfileFetchFailed,

    #[error("Token is malformed")]
    MalformedToken,

    #[error("Token has no expiration claim")]
    MissingClaim,
}

impl AuthError {
    /// Message suitable for showing to the person signing in.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Incorrect email or password.".to_string(),
            AuthError::BackendUnreachable => {
                "The server could not be reached. Please try again in a moment.".to_string()
            }
            AuthError::ProviderDenied(reason) => {
                format!("Sign-in was declined by the provider ({}).", reason)
            }
            AuthError::ProfileFetchFailed => {
                "Sign-in succeeded but your profile could not be loaded. Please sign in again."
                    .to_string()
            }
            AuthError::MalformedToken | AuthError::MissingClaim => {
                "Your session is no longer valid. Please sign in again.".to_string()
            }
        }
    }

    fn from_login_failure(err: &ApiError) -> Self {
        if err.is_rejected() {
            AuthError::InvalidCredentials
        } else {
            AuthError::BackendUnreachable
        }
    }

    fn from_profile_failure(err: &ApiError) -> Self {
        if err.is_unreachable() {
            AuthError::BackendUnreachable
        } else {
            AuthError::ProfileFetchFailed
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MalformedToken => AuthError::MalformedToken,
            TokenError::MissingClaim => AuthError::MissingClaim,
        }
    }
}

/// What the rest of the application sees of a session.
///
/// Always derived from the held credential and the advisory pending flag,
/// never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionState {
    Anonymous,
    OAuthPending(OAuthProvider),
    Authenticated,
}

/// Owns one user's credential and drives every login path into it.
///
/// One manager exists per user session. Operations run to completion one at a
/// time, so the store is mutated without locking.
#[derive(Debug)]
pub struct AuthSessionManager {
    api: BackendAuthClient,
    store: CredentialStore,
    pending: Option<OAuthProvider>,
}

impl AuthSessionManager {
    pub fn new(api: BackendAuthClient) -> Self {
        Self {
            api,
            store: CredentialStore::new(),
            pending: None,
        }
    }

    pub fn api(&self) -> &BackendAuthClient {
        &self.api
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.store.get()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.store.get().map(|c| &c.profile)
    }

    pub fn role(&self) -> Option<&str> {
        self.store.get().map(|c| c.role.as_str())
    }

    /// Expiry of the held token, or why it cannot be used.
    pub fn token_expiry(&self) -> Option<Result<DateTime<Utc>, AuthError>> {
        self.store
            .get()
            .map(|c| c.expiry().map_err(AuthError::from))
    }

    /// Sign in with email and password.
    pub async fn login_with_password(&mut self, email: &str, password: &str) -> Result<(), AuthError> {
        match self.api.login(email, password).await {
            Ok(resp) => {
                let credential =
                    Credential::new(resp.token, Profile::for_password_login(email), resp.role);
                info!(method = %credential.method(), role = %credential.role, "Login succeeded");
                self.store.store(credential);
                self.pending = None;
                Ok(())
            }
            Err(e) => {
                let err = AuthError::from_login_failure(&e);
                warn!(error = %e, outcome = %err, "Password login failed");
                Err(err)
            }
        }
    }

    /// Authorize URL for `provider`. The caller performs the redirect.
    pub fn begin_oauth(&self, provider: OAuthProvider) -> Url {
        self.api.authorize_url(provider)
    }

    /// Record that a redirect to `provider` has been dispatched.
    /// Purely advisory: nothing is blocked while pending.
    pub fn mark_oauth_pending(&mut self, provider: OAuthProvider) {
        debug!(%provider, "OAuth redirect pending");
        self.pending = Some(provider);
    }

    /// Finish an OAuth round-trip from the redirect result.
    pub async fn complete_oauth(&mut self, result: OAuthCallbackResult) -> Result<(), AuthError> {
        match result {
            OAuthCallbackResult::Absent => Ok(()),
            OAuthCallbackResult::Error(reason) => {
                self.pending = None;
                warn!(%reason, "OAuth provider denied sign-in");
                Err(AuthError::ProviderDenied(reason))
            }
            OAuthCallbackResult::Token(token) => {
                self.pending = None;
                match self.api.fetch_profile(&token).await {
                    Ok(resp) => {
                        let role = resp.role.clone();
                        let credential = Credential::new(token, resp.into_profile(), role);
                        info!(method = %credential.method(), role = %credential.role, "Login succeeded");
                        self.store.store(credential);
                        Ok(())
                    }
                    Err(e) => {
                        // The new token replaces whatever was held, even when it cannot be resolved
                        self.store.clear();
                        let err = AuthError::from_profile_failure(&e);
                        warn!(error = %e, outcome = %err, "OAuth profile fetch failed");
                        Err(err)
                    }
                }
            }
        }
    }

    /// True iff a credential is held and has not yet expired.
    pub fn is_authenticated(&mut self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    /// Evaluated afresh on every call. An expired credential found here is
    /// dropped from the store.
    pub fn is_authenticated_at(&mut self, now: DateTime<Utc>) -> bool {
        let expired = match self.store.get() {
            None => return false,
            Some(credential) => credential.is_expired_at(now),
        };

        if expired {
            if let Some(credential) = self.store.clear() {
                info!(provider = %credential.profile.provider, "Session expired");
            }
            return false;
        }
        true
    }

    pub fn state(&mut self) -> SessionState {
        self.state_at(Utc::now())
    }

    pub fn state_at(&mut self, now: DateTime<Utc>) -> SessionState {
        if self.is_authenticated_at(now) {
            SessionState::Authenticated
        } else if let Some(provider) = self.pending {
            SessionState::OAuthPending(provider)
        } else {
            SessionState::Anonymous
        }
    }

    /// Log out locally, notifying the backend on a best-effort basis.
    pub async fn logout(&mut self) {
        self.pending = None;
        let Some(credential) = self.store.clear() else {
            debug!("Logout with no active credential");
            return;
        };

        if let Err(e) = self.api.logout(credential.token()).await {
            warn!(error = %e, "Backend logout failed, clearing session anyway");
        }
        info!(provider = %credential.profile.provider, "Logged out");
    }

    /// Backend OAuth availability; failures degrade to "none available".
    pub async fn provider_status(&self) -> ProviderStatus {
        self.api.provider_status().await
    }

    /// `Authorization` header for outbound calls, empty when not authenticated.
    pub fn auth_header(&mut self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if self.is_authenticated() {
            if let Some(token) = self.store.token() {
                headers.insert("Authorization".to_string(), format!("Bearer {}", token));
            }
        }
        headers
    }

    /// Same as [`auth_header`](Self::auth_header), ready to hand to a reqwest request.
    pub fn auth_header_map(&mut self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (_, value) in self.auth_header() {
            match HeaderValue::from_str(&value) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(e) => warn!(error = %e, "Token is not a valid header value"),
            }
        }
        headers
    }
}

// ============================================================================
// Tests
// ============================================================================
