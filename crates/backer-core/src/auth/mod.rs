//! Authentication module for the session core.
//!
//! This module provides:
//! - `CredentialStore`: In-memory holder of the one live credential per session
//! - `AuthSessionManager`: Password and OAuth login, logout and status checks
//! - `OAuthCallbackHandler`: One-shot consumption of OAuth redirect parameters
//!
//! Expiry is read from the token itself and checked lazily on every call.

pub mod callback;
pub mod credentials;
pub mod session;

pub use callback::{OAuthCallbackHandler, OAuthCallbackResult, QueryParams};
pub use credentials::{
    Credential, CredentialStore, LoginMethod, OAuthProvider, Profile, Provider, DEFAULT_ROLE,
};
pub use session::{AuthError, AuthSessionManager, SessionState};
