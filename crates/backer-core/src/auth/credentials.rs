use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::token::{self, TokenError};

/// Role assumed when the backend does not report one
pub const DEFAULT_ROLE: &str = "user";

/// Third-party identity providers reachable through the OAuth redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 2] = [OAuthProvider::Google, OAuthProvider::Facebook];

    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" => Some(OAuthProvider::Google),
            "facebook" => Some(OAuthProvider::Facebook),
            _ => None,
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the identity behind a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Provider {
    Password,
    Google,
    Facebook,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Password => "password",
            Provider::Google => "google",
            Provider::Facebook => "facebook",
        }
    }
}

impl From<OAuthProvider> for Provider {
    fn from(provider: OAuthProvider) -> Self {
        match provider {
            OAuthProvider::Google => Provider::Google,
            OAuthProvider::Facebook => Provider::Facebook,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The path by which a credential was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    Password,
    OAuth(OAuthProvider),
}

impl LoginMethod {
    pub fn provider(&self) -> Provider {
        match self {
            LoginMethod::Password => Provider::Password,
            LoginMethod::OAuth(p) => Provider::from(*p),
        }
    }
}

impl fmt::Display for LoginMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginMethod::Password => f.write_str("password"),
            LoginMethod::OAuth(p) => write!(f, "{} OAuth", p),
        }
    }
}

impl From<Provider> for LoginMethod {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Password => LoginMethod::Password,
            Provider::Google => LoginMethod::OAuth(OAuthProvider::Google),
            Provider::Facebook => LoginMethod::OAuth(OAuthProvider::Facebook),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub picture_url: Option<String>,
    pub provider: Provider,
}

impl Profile {
    /// Profile for a password login, where the backend only confirms the email.
    pub fn for_password_login(email: &str) -> Self {
        Self {
            name: email.to_string(),
            email: email.to_string(),
            picture_url: None,
            provider: Provider::Password,
        }
    }
}

/// The identity currently held by a session.
#[derive(Clone)]
pub struct Credential {
    token: String,
    /// `None` when the token carries no usable expiration claim.
    expires_at: Option<DateTime<Utc>>,
    pub profile: Profile,
    pub role: String,
}

impl Credential {
    /// Build a credential, reading the expiration claim out of `token`.
    pub fn new(token: String, profile: Profile, role: Option<String>) -> Self {
        let expires_at = match token::decode_expiration(&token) {
            Ok(exp) => Some(exp),
            Err(e) => {
                debug!(error = %e, provider = %profile.provider, "Token has no usable expiry, treating as expired");
                None
            }
        };

        Self {
            token,
            expires_at,
            profile,
            role: role
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Re-decode the expiry so callers can see why a token is unusable.
    pub fn expiry(&self) -> Result<DateTime<Utc>, TokenError> {
        token::decode_expiration(&self.token)
    }

    pub fn method(&self) -> LoginMethod {
        LoginMethod::from(self.profile.provider)
    }

    /// Expired when `now >= expires_at`, or when no expiry could be read.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => now >= exp,
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn time_until_expiry(&self) -> Duration {
        match self.expires_at {
            Some(exp) => exp - Utc::now(),
            None => Duration::zero(),
        }
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("profile", &self.profile)
            .field("role", &self.role)
            .finish()
    }
}

/// In-memory storage for the one live credential of a user session.
///
/// Each session owns its own store; nothing here is shared between users and
/// nothing outlives the process.
#[derive(Debug, Default)]
pub struct CredentialStore {
    credential: Option<Credential>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was held with `credential`.
    pub fn store(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    pub fn get(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Get the bearer token if a credential is held
    pub fn token(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.token())
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Remove and return the held credential
    pub fn clear(&mut self) -> Option<Credential> {
        self.credential.take()
    }
}

// ============================================================================
// Tests
// ============================================================================
