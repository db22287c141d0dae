//! Core traits and types for request-driven authentication strategies.
//!
//! A strategy inspects an inbound [`AuthRequest`] and settles it with exactly one
//! [`AuthOutcome`]: a redirect to an external provider, a successful login, an
//! authentication failure, or a system error. Hosts (axum handlers, RPC services,
//! session layers) translate the outcome into their own response primitives.

use async_trait::async_trait;
use http::{HeaderMap, Uri};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The parts of an inbound web request an authentication strategy may look at.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    query: HashMap<String, String>,
    body: HashMap<String, String>,
    headers: HeaderMap,
}

impl AuthRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a request from a raw, url-encoded query string (without the leading `?`).
    pub fn from_query_str(query: &str) -> Self {
        Self {
            query: parse_form(query),
            ..Self::default()
        }
    }

    pub fn from_uri(uri: &Uri) -> Self {
        Self::from_query_str(uri.query().unwrap_or_default())
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query.extend(query);
        self
    }

    pub fn with_body_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    /// Merge an `application/x-www-form-urlencoded` body into the body fields.
    pub fn with_form_body(mut self, body: &str) -> Self {
        self.body.extend(parse_form(body));
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn body(&self, name: &str) -> Option<&str> {
        self.body.get(name).map(String::as_str)
    }

    /// Look a field up in the query first, then in the body.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query(name).or_else(|| self.body(name))
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

fn parse_form(input: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(input.as_bytes())
        .into_owned()
        .collect()
}

/// Per-call options passed alongside a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateOptions {
    /// Caller-supplied opaque state to round-trip through the provider.
    pub state: Option<String>,
    /// Overrides the configured callback URL for this call only.
    #[serde(rename = "callbackURL")]
    pub callback_url: Option<String>,
}

impl AuthenticateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_callback_url(mut self, callback_url: impl Into<String>) -> Self {
        self.callback_url = Some(callback_url.into());
        self
    }
}

/// Why an authentication attempt was rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl FailureInfo {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn details(details: Option<serde_json::Value>) -> Self {
        let message = details
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str())
            .map(String::from);
        Self { message, details }
    }
}

/// The single terminal result of one `authenticate` call.
#[derive(Debug)]
pub enum AuthOutcome<U, E> {
    /// Send the user agent to `location`.
    Redirect { location: String },
    /// Authentication succeeded.
    Success { user: U, info: serde_json::Value },
    /// Authentication was rejected; not a system fault.
    Fail(FailureInfo),
    /// Something broke while authenticating.
    Error(E),
}

impl<U, E> AuthOutcome<U, E> {
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(FailureInfo::message(message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn redirect_location(&self) -> Option<&str> {
        match self {
            Self::Redirect { location } => Some(location),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureInfo> {
        match self {
            Self::Fail(info) => Some(info),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn into_user(self) -> Option<U> {
        match self {
            Self::Success { user, .. } => Some(user),
            _ => None,
        }
    }
}

/// An authentication mechanism the host can mount on a route.
#[async_trait]
pub trait Strategy: Send + Sync {
    type User: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &str;

    async fn authenticate(
        &self,
        request: &AuthRequest,
        options: &AuthenticateOptions,
    ) -> AuthOutcome<Self::User, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_prefers_query_over_body() {
        let request = AuthRequest::new()
            .with_query_param("code", "from-query")
            .with_body_param("code", "from-body")
            .with_body_param("state", "only-body");

        assert_eq!(request.param("code"), Some("from-query"));
        assert_eq!(request.param("state"), Some("only-body"));
        assert_eq!(request.param("missing"), None);
    }

    #[test]
    fn test_from_query_str_decodes_values() {
        let request = AuthRequest::from_query_str("code=a%20b&state=x%2By&empty=");
        assert_eq!(request.query("code"), Some("a b"));
        assert_eq!(request.query("state"), Some("x+y"));
        assert_eq!(request.query("empty"), Some(""));
    }

    #[test]
    fn test_from_uri_and_form_body() {
        let uri: Uri = "/auth/callback?code=abc".parse().unwrap();
        let request = AuthRequest::from_uri(&uri).with_form_body("state=s1&error=");

        assert_eq!(request.param("code"), Some("abc"));
        assert_eq!(request.body("state"), Some("s1"));
    }

    #[test]
    fn test_failure_info_reads_message_from_details() {
        let info = FailureInfo::details(Some(serde_json::json!({"message": "blocked"})));
        assert_eq!(info.message.as_deref(), Some("blocked"));

        let info = FailureInfo::details(None);
        assert_eq!(info, FailureInfo::default());
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome: AuthOutcome<String, std::io::Error> = AuthOutcome::redirect("https://x/y");
        assert_eq!(outcome.redirect_location(), Some("https://x/y"));
        assert!(!outcome.is_success());

        let outcome: AuthOutcome<String, std::io::Error> = AuthOutcome::fail("nope");
        assert!(outcome.is_fail());
        assert_eq!(outcome.failure().unwrap().message.as_deref(), Some("nope"));

        let outcome: AuthOutcome<String, std::io::Error> = AuthOutcome::Success {
            user: "alice".to_string(),
            info: serde_json::json!({}),
        };
        assert_eq!(outcome.into_user().as_deref(), Some("alice"));
    }

    struct AlwaysRedirect;

    #[async_trait]
    impl Strategy for AlwaysRedirect {
        type User = ();
        type Error = std::io::Error;

        fn name(&self) -> &str {
            "always-redirect"
        }

        async fn authenticate(
            &self,
            _request: &AuthRequest,
            options: &AuthenticateOptions,
        ) -> AuthOutcome<(), std::io::Error> {
            AuthOutcome::redirect(options.callback_url.clone().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_strategy_is_object_safe() {
        let strategy: Box<dyn Strategy<User = (), Error = std::io::Error>> =
            Box::new(AlwaysRedirect);
        let options = AuthenticateOptions::new().with_callback_url("/cb");

        let outcome = strategy.authenticate(&AuthRequest::new(), &options).await;
        assert_eq!(strategy.name(), "always-redirect");
        assert_eq!(outcome.redirect_location(), Some("/cb"));
    }
}
