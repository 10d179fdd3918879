//! HTTP client for the backend authentication endpoints.
//!
//! The backend owns the credential exchange: it checks passwords, runs the
//! provider side of OAuth and issues the bearer tokens this crate holds.

pub mod client;
pub mod error;

pub use client::{BackendAuthClient, LoginResponse, ProfileResponse, ProviderStatus};
pub use error::ApiError;
