//! Zalo strategy error types.

use crate::types::ZaloTokenError;
use thiserror::Error;

pub type ZaloResult<T> = Result<T, ZaloError>;

/// Boxed error produced by a verification callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ZaloError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Token exchange failed: {message}")]
    TokenExchangeFailed {
        message: String,
        details: ZaloTokenError,
    },

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("User info request failed: {0}")]
    UserInfoFailed(String),

    #[error("Invalid user info response: {0}")]
    InvalidUserInfoResponse(String),

    #[error("State store error: {0}")]
    StoreError(String),

    #[error("Verification callback error: {0}")]
    VerifyError(BoxError),
}

impl ZaloError {
    /// True for faults in the outbound transport or in parsing a provider response.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::HttpError(_) | Self::InvalidTokenResponse(_) | Self::InvalidUserInfoResponse(_)
        )
    }

    /// True when the provider answered with an explicit `error` field.
    pub fn is_provider(&self) -> bool {
        matches!(self, Self::TokenExchangeFailed { .. } | Self::UserInfoFailed(_))
    }
}
