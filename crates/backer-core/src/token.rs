//! Bearer token expiration decoding.
//!
//! Tokens issued by the backend are three `.`-separated segments whose middle
//! segment is a base64url JSON payload. Only the `exp` claim is read here; the
//! signature is never checked on the client.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Number of `.`-delimited segments in a bearer token
const TOKEN_SEGMENTS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is malformed")]
    MalformedToken,

    #[error("Token has no expiration claim")]
    MissingClaim,
}

#[derive(Debug, Deserialize)]
struct Claims {
    // Some issuers write `exp` as a float; fractional seconds are dropped.
    exp: Option<f64>,
}

/// Decode the `exp` claim of a bearer token into an absolute timestamp.
pub fn decode_expiration(token: &str) -> Result<DateTime<Utc>, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != TOKEN_SEGMENTS {
        return Err(TokenError::MalformedToken);
    }

    let payload = decode_segment(segments[1])?;
    let claims: Claims =
        serde_json::from_slice(&payload).map_err(|_| TokenError::MalformedToken)?;

    let exp = claims.exp.ok_or(TokenError::MissingClaim)?;
    if !exp.is_finite() {
        return Err(TokenError::MalformedToken);
    }
    DateTime::from_timestamp(exp.trunc() as i64, 0).ok_or(TokenError::MalformedToken)
}

// Issuers differ on whether the payload keeps its `=` padding.
fn decode_segment(segment: &str) -> Result<Vec<u8>, TokenError> {
    if segment.ends_with('=') {
        URL_SAFE.decode(segment)
    } else {
        URL_SAFE_NO_PAD.decode(segment)
    }
    .map_err(|_| TokenError::MalformedToken)
}

// ============================================================================
// Tests
// ============================================================================
