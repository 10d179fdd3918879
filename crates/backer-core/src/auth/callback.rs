//! Handling of the OAuth redirect that lands back on a page.
//!
//! The provider round-trip ends with either `access_token` or `error` in the
//! page's query string. Those parameters are read once and then removed, so a
//! second render of the same page does not replay the login.

use tracing::debug;
use url::{form_urlencoded, Url};

use super::session::{AuthError, AuthSessionManager};

const ACCESS_TOKEN_PARAM: &str = "access_token";
const ERROR_PARAM: &str = "error";

/// Outcome carried by an OAuth redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthCallbackResult {
    Token(String),
    Error(String),
    Absent,
}

/// Ordered query parameters of an inbound page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the query string (without the leading `?`).
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self {
            pairs: form_urlencoded::parse(query.as_bytes()).into_owned().collect(),
        }
    }

    /// Parse the query and fragment of a full URL. Some providers return the
    /// token in the fragment, so both are read.
    pub fn from_url(url: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(url)?;
        let mut params = Self::from_query(url.query().unwrap_or_default());
        if let Some(fragment) = url.fragment() {
            params.pairs.extend(Self::from_query(fragment).pairs);
        }
        Ok(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Remove every occurrence of `key`, returning the first value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let first = self.get(key).map(str::to_string);
        self.pairs.retain(|(k, _)| k != key);
        first
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

/// Reads OAuth redirect results out of request parameters, once.
#[derive(Debug, Clone)]
pub struct OAuthCallbackHandler {
    token_param: String,
    error_param: String,
}

impl Default for OAuthCallbackHandler {
    fn default() -> Self {
        Self {
            token_param: ACCESS_TOKEN_PARAM.to_string(),
            error_param: ERROR_PARAM.to_string(),
        }
    }
}

impl OAuthCallbackHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use different parameter names for the token and the error.
    pub fn with_params(token_param: impl Into<String>, error_param: impl Into<String>) -> Self {
        Self {
            token_param: token_param.into(),
            error_param: error_param.into(),
        }
    }

    /// Extract the redirect result and clear its parameters from `params`.
    ///
    /// Returns `None` when neither parameter carries a value. If both are
    /// present the error wins.
    pub fn consume(&self, params: &mut QueryParams) -> Option<OAuthCallbackResult> {
        let token = params.remove(&self.token_param).filter(|t| !t.is_empty());
        let error = params.remove(&self.error_param).filter(|e| !e.is_empty());

        let (result, outcome) = match (token, error) {
            (_, Some(error)) => (OAuthCallbackResult::Error(error), "error"),
            (Some(token), None) => (OAuthCallbackResult::Token(token), "token"),
            (None, None) => return None,
        };
        debug!(outcome, "Consumed OAuth redirect parameters");
        Some(result)
    }

    /// Consume any pending redirect and hand it to the session manager.
    /// `None` when this request carried no redirect result.
    pub async fn handle(
        &self,
        params: &mut QueryParams,
        manager: &mut AuthSessionManager,
    ) -> Option<Result<(), AuthError>> {
        let result = self.consume(params)?;
        Some(manager.complete_oauth(result).await)
    }
}
