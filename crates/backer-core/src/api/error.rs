use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - credentials rejected or token expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Request rejected ({0})")]
    Rejected(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            500..=599 => ApiError::ServerError(truncated),
            400..=499 => ApiError::Rejected(format!("Status {}: {}", status, truncated)),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// True when the backend answered and refused the request, as opposed to
    /// being unreachable or failing on its side.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized
                | ApiError::AccessDenied(_)
                | ApiError::NotFound(_)
                | ApiError::Rejected(_)
        )
    }

    /// True when the backend could not be reached in time or failed on its
    /// side. A body that arrived but could not be decoded does not count.
    pub fn is_unreachable(&self) -> bool {
        match self {
            ApiError::Network(e) => !e.is_decode(),
            ApiError::ServerError(_) | ApiError::InvalidUrl(_) => true,
            _ => false,
        }
    }
}
