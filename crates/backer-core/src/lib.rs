//! Session and authentication core for the backer crowdfunding front end.
//!
//! Pages ask the [`AuthSessionManager`] whether the caller is signed in and
//! attach its [`auth_header`](AuthSessionManager::auth_header) to every
//! backend call. Credentials come from either a password exchange or an OAuth
//! redirect, and live only in memory for the lifetime of one session.

pub mod api;
pub mod auth;
pub mod config;
pub mod token;

pub use api::{ApiError, BackendAuthClient, ProviderStatus};
pub use auth::{
    AuthError, AuthSessionManager, Credential, CredentialStore, LoginMethod, OAuthCallbackHandler,
    OAuthCallbackResult, OAuthProvider, Profile, Provider, QueryParams, SessionState,
};
pub use config::Config;
pub use token::{decode_expiration, TokenError};
