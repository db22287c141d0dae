//! Authorization code to access token exchange.

use crate::error::{ZaloError, ZaloResult};
use crate::types::{AccessTokenResponse, AccessTokenResult, ZaloTokenError, error_is_set};
use reqwest::Client;
use tracing::{debug, error, info};

/// Header carrying the application secret. Zalo does not accept it in the body.
pub const SECRET_HEADER: &str = "secret_key";

/// Issues the token request using Zalo's `app_id` / `secret_key` layout
#[derive(Clone)]
pub struct TokenExchanger {
    http_client: Client,
    token_url: String,
    app_id: String,
    app_secret: String,
}

impl TokenExchanger {
    pub fn new(
        http_client: Client,
        token_url: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            token_url: token_url.into(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// `redirect_uri` is accepted for symmetry with other OAuth2 clients; Zalo
    /// does not want it in the token request.
    pub async fn exchange(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> ZaloResult<AccessTokenResponse> {
        match self.request_token(code, verifier, redirect_uri).await? {
            AccessTokenResult::Token(token) => {
                info!("Successfully exchanged code for tokens");
                Ok(token)
            }
            AccessTokenResult::Error(details) => {
                let message = details.message();
                error!("Token exchange failed: {}", message);
                Err(ZaloError::TokenExchangeFailed { message, details })
            }
        }
    }

    /// Send the token request and classify the answer without turning provider
    /// errors into `Err`.
    pub async fn request_token(
        &self,
        code: &str,
        verifier: &str,
        _redirect_uri: &str,
    ) -> ZaloResult<AccessTokenResult> {
        let params = [
            ("app_id", self.app_id.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("code_verifier", verifier),
        ];

        debug!("Requesting access token from {}", self.token_url);
        let response = self
            .http_client
            .post(&self.token_url)
            .header(SECRET_HEADER, &self.app_secret)
            .form(&params)
            .send()
            .await?;

        let body = response.text().await?;
        parse_token_response(&body)
    }
}

/// Classify a token endpoint body. Any set `error` field means failure;
/// malformed JSON is reported separately from provider errors.
pub fn parse_token_response(body: &str) -> ZaloResult<AccessTokenResult> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ZaloError::InvalidTokenResponse(e.to_string()))?;

    if error_is_set(value.get("error")) {
        let details: ZaloTokenError = serde_json::from_value(value)
            .map_err(|e| ZaloError::InvalidTokenResponse(e.to_string()))?;
        return Ok(AccessTokenResult::Error(details));
    }

    let token: AccessTokenResponse = serde_json::from_value(value)
        .map_err(|e| ZaloError::InvalidTokenResponse(e.to_string()))?;

    if token.access_token.is_empty() {
        return Err(ZaloError::InvalidTokenResponse(
            "empty access_token".to_string(),
        ));
    }

    Ok(AccessTokenResult::Token(token))
}
