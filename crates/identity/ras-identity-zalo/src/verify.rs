//! Application verification callback.
//!
//! After a profile has been fetched the strategy hands the tokens and profile
//! to the application, which decides whether they map to a user. The callback
//! comes in two flavours, with or without the originating request, and which
//! one is in use must agree with `pass_req_to_callback` in the configuration.

use crate::error::BoxError;
use crate::types::ProfileWithMetadata;
use futures::FutureExt;
use futures::future::BoxFuture;
use ras_identity_core::AuthRequest;
use std::future::Future;
use std::sync::Arc;

/// The application's verdict on an authenticated profile
#[derive(Debug, Clone)]
pub enum VerifyDecision<U> {
    Accept {
        user: U,
        info: Option<serde_json::Value>,
    },
    Reject {
        info: Option<serde_json::Value>,
    },
}

impl<U> VerifyDecision<U> {
    pub fn accept(user: U) -> Self {
        Self::Accept { user, info: None }
    }

    pub fn accept_with_info(user: U, info: serde_json::Value) -> Self {
        Self::Accept {
            user,
            info: Some(info),
        }
    }

    pub fn reject() -> Self {
        Self::Reject { info: None }
    }

    pub fn reject_with_info(info: serde_json::Value) -> Self {
        Self::Reject { info: Some(info) }
    }
}

pub type VerifyResult<U> = Result<VerifyDecision<U>, BoxError>;
pub type VerifyFuture<U> = BoxFuture<'static, VerifyResult<U>>;

type PlainFn<U> =
    dyn Fn(String, Option<String>, ProfileWithMetadata) -> VerifyFuture<U> + Send + Sync;
type RequestFn<U> =
    dyn Fn(AuthRequest, String, Option<String>, ProfileWithMetadata) -> VerifyFuture<U>
        + Send
        + Sync;

/// Verification callback, tagged by whether it wants the request.
pub enum VerifyCallback<U> {
    /// `(access_token, refresh_token, profile)`
    Plain(Arc<PlainFn<U>>),
    /// `(request, access_token, refresh_token, profile)`
    WithRequest(Arc<RequestFn<U>>),
}

impl<U> Clone for VerifyCallback<U> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(f) => Self::Plain(f.clone()),
            Self::WithRequest(f) => Self::WithRequest(f.clone()),
        }
    }
}

impl<U: Send + 'static> VerifyCallback<U> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(String, Option<String>, ProfileWithMetadata) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = VerifyResult<U>> + Send + 'static,
    {
        Self::Plain(Arc::new(move |access_token, refresh_token, profile| {
            f(access_token, refresh_token, profile).boxed()
        }))
    }

    pub fn with_request<F, Fut>(f: F) -> Self
    where
        F: Fn(AuthRequest, String, Option<String>, ProfileWithMetadata) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = VerifyResult<U>> + Send + 'static,
    {
        Self::WithRequest(Arc::new(
            move |request, access_token, refresh_token, profile| {
                f(request, access_token, refresh_token, profile).boxed()
            },
        ))
    }

    pub fn passes_request(&self) -> bool {
        matches!(self, Self::WithRequest(_))
    }

    pub(crate) async fn call(
        &self,
        request: &AuthRequest,
        access_token: String,
        refresh_token: Option<String>,
        profile: ProfileWithMetadata,
    ) -> VerifyResult<U> {
        match self {
            Self::Plain(f) => f(access_token, refresh_token, profile).await,
            Self::WithRequest(f) => f(request.clone(), access_token, refresh_token, profile).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::parse_user_profile;

    fn profile() -> ProfileWithMetadata {
        parse_user_profile(r#"{"id":"1","name":"Alice"}"#).unwrap()
    }

    #[tokio::test]
    async fn test_plain_callback() {
        let callback = VerifyCallback::new(|access_token, refresh_token, profile| async move {
            assert!(refresh_token.is_none());
            Ok(VerifyDecision::accept(format!(
                "{}:{}",
                access_token, profile.profile.id
            )))
        });
        assert!(!callback.passes_request());

        match callback
            .call(&AuthRequest::new(), "T".to_string(), None, profile())
            .await
            .unwrap()
        {
            VerifyDecision::Accept { user, info } => {
                assert_eq!(user, "T:1");
                assert!(info.is_none());
            }
            VerifyDecision::Reject { .. } => panic!("expected accept"),
        }
    }

    #[tokio::test]
    async fn test_request_callback_sees_request() {
        let callback = VerifyCallback::with_request(
            |request: AuthRequest, _access_token, _refresh_token, _profile| async move {
                match request.param("tenant") {
                    Some(tenant) => Ok(VerifyDecision::accept(tenant.to_string())),
                    None => Ok(VerifyDecision::reject_with_info(
                        serde_json::json!({"message": "no tenant"}),
                    )),
                }
            },
        );
        assert!(callback.passes_request());

        let request = AuthRequest::new().with_query_param("tenant", "acme");
        let decision = callback
            .clone()
            .call(&request, "T".to_string(), None, profile())
            .await
            .unwrap();
        assert!(matches!(decision, VerifyDecision::Accept { user, .. } if user == "acme"));

        let decision = callback
            .call(&AuthRequest::new(), "T".to_string(), None, profile())
            .await
            .unwrap();
        assert!(matches!(decision, VerifyDecision::Reject { info: Some(_) }));
    }

    #[tokio::test]
    async fn test_callback_error_propagates() {
        let callback: VerifyCallback<()> =
            VerifyCallback::new(|_, _, _| async { Err("database down".into()) });

        let err = callback
            .call(&AuthRequest::new(), "T".to_string(), None, profile())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "database down");
    }
}
