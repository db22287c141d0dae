//! Zalo authentication strategy.

use crate::config::{Credentials, ZaloStrategyConfig};
use crate::error::{ZaloError, ZaloResult};
use crate::pkce::{CHALLENGE_METHOD, PkceMode, PkcePair};
use crate::profile::ProfileFetcher;
use crate::state::{CompatPkceStore, PkceStore, StoreMeta, VerifiedState};
use crate::token::TokenExchanger;
use crate::types::PROVIDER_NAME;
use crate::verify::{VerifyCallback, VerifyDecision};
use async_trait::async_trait;
use ras_identity_core::{AuthOutcome, AuthRequest, AuthenticateOptions, FailureInfo, Strategy};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

pub const MISSING_CODE_MESSAGE: &str = "missing authorization code";
pub const INVALID_STATE_MESSAGE: &str = "invalid state parameter";

/// Outcome type produced by [`ZaloStrategy`]
pub type ZaloOutcome<U> = AuthOutcome<U, ZaloError>;

/// OAuth2 authorization code + PKCE flow against Zalo.
///
/// A request without `code` starts authorization and ends in a redirect. A
/// request carrying `code` (or a provider `error`) is treated as the callback
/// and ends in success, fail or error.
pub struct ZaloStrategy<U> {
    credentials: Credentials,
    authorization_url: String,
    token_url: String,
    store: Arc<dyn PkceStore>,
    pkce_mode: PkceMode,
    token_exchanger: TokenExchanger,
    profile_fetcher: ProfileFetcher,
    verify: VerifyCallback<U>,
}

impl<U: Send + 'static> ZaloStrategy<U> {
    pub fn new(config: ZaloStrategyConfig, verify: VerifyCallback<U>) -> ZaloResult<Self> {
        config.credentials.validate()?;

        if config.pass_req_to_callback != verify.passes_request() {
            return Err(ZaloError::ConfigError(format!(
                "passReqToCallback is {} but the verify callback {} the request",
                config.pass_req_to_callback,
                if verify.passes_request() {
                    "expects"
                } else {
                    "does not expect"
                }
            )));
        }

        Url::parse(&config.authorization_url)?;

        let http_client = match config.http_client {
            Some(client) => client,
            None => Client::builder().build().map_err(|e| {
                ZaloError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?,
        };

        let (store, pkce_mode) = match config.store {
            Some(store) => (store, PkceMode::Stored),
            None => {
                warn!("No PKCE store configured, using fixed compatibility verifier");
                (
                    Arc::new(CompatPkceStore) as Arc<dyn PkceStore>,
                    PkceMode::Compatibility,
                )
            }
        };

        let token_exchanger = TokenExchanger::new(
            http_client.clone(),
            config.token_url.clone(),
            config.credentials.app_id.clone(),
            config.credentials.app_secret.clone(),
        );
        let profile_fetcher = ProfileFetcher::new(http_client, config.user_profile_url);

        Ok(Self {
            credentials: config.credentials,
            authorization_url: config.authorization_url,
            token_url: config.token_url,
            store,
            pkce_mode,
            token_exchanger,
            profile_fetcher,
            verify,
        })
    }

    pub fn pkce_mode(&self) -> PkceMode {
        self.pkce_mode
    }

    /// Settle one request with exactly one outcome.
    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        options: &AuthenticateOptions,
    ) -> ZaloOutcome<U> {
        let is_callback = request.param("code").is_some()
            || request.param("error").is_some_and(|e| !e.is_empty());

        let outcome = if is_callback {
            self.complete_authorization(request, options).await
        } else {
            match self.start_authorization(request, options).await {
                Ok(location) => AuthOutcome::redirect(location),
                Err(e) => AuthOutcome::Error(e),
            }
        };

        match &outcome {
            AuthOutcome::Redirect { .. } => debug!("Redirecting to Zalo for authorization"),
            AuthOutcome::Success { .. } => info!("Zalo authentication succeeded"),
            AuthOutcome::Fail(info) => warn!(
                "Zalo authentication failed: {}",
                info.message.as_deref().unwrap_or("rejected")
            ),
            AuthOutcome::Error(e) => warn!("Zalo authentication error: {}", e),
        }
        outcome
    }

    /// Phase one: bind a fresh PKCE pair to a state handle and build the
    /// authorization URL.
    async fn start_authorization(
        &self,
        request: &AuthRequest,
        options: &AuthenticateOptions,
    ) -> ZaloResult<String> {
        let pkce = PkcePair::for_mode(self.pkce_mode);
        let redirect_uri = self.redirect_uri(options);

        let meta = StoreMeta {
            authorization_url: self.authorization_url.clone(),
            token_url: self.token_url.clone(),
            app_id: self.credentials.app_id.clone(),
            redirect_uri: redirect_uri.to_string(),
        };

        let handle = self
            .store
            .store(request, &pkce.verifier, options.state.as_deref(), &meta)
            .await?;

        self.authorization_url_for(&pkce, redirect_uri, &handle)
    }

    /// Build the provider authorization URL.
    pub fn authorization_url_for(
        &self,
        pkce: &PkcePair,
        redirect_uri: &str,
        state: &str,
    ) -> ZaloResult<String> {
        let mut url = Url::parse(&self.authorization_url)?;
        url.query_pairs_mut()
            .append_pair("app_id", &self.credentials.app_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", CHALLENGE_METHOD)
            .append_pair("state", state);

        debug!("Generated authorization URL for app {}", self.credentials.app_id);
        Ok(url.to_string())
    }

    /// Phase two: check the callback, redeem the code and hand the profile to
    /// the verification callback.
    async fn complete_authorization(
        &self,
        request: &AuthRequest,
        options: &AuthenticateOptions,
    ) -> ZaloOutcome<U> {
        if let Some(error) = request.param("error").filter(|e| !e.is_empty()) {
            let message = request
                .param("error_description")
                .filter(|d| !d.is_empty())
                .unwrap_or(error);
            return AuthOutcome::fail(message);
        }

        let Some(code) = request.param("code").filter(|c| !c.is_empty()) else {
            return AuthOutcome::fail(MISSING_CODE_MESSAGE);
        };

        let handle = request.param("state").unwrap_or_default();
        let verified = match self.store.verify(request, handle).await {
            Ok(Some(verified)) => verified,
            Ok(None) => return AuthOutcome::fail(INVALID_STATE_MESSAGE),
            Err(e) => return AuthOutcome::Error(e),
        };

        match self
            .redeem(request, code, &verified, self.redirect_uri(options))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => AuthOutcome::Error(e),
        }
    }

    async fn redeem(
        &self,
        request: &AuthRequest,
        code: &str,
        verified: &VerifiedState,
        redirect_uri: &str,
    ) -> ZaloResult<ZaloOutcome<U>> {
        let token = self
            .token_exchanger
            .exchange(code, &verified.verifier, redirect_uri)
            .await?;

        let profile = self.profile_fetcher.fetch(&token.access_token).await?;

        let decision = self
            .verify
            .call(request, token.access_token, token.refresh_token, profile)
            .await
            .map_err(ZaloError::VerifyError)?;

        Ok(match decision {
            VerifyDecision::Accept { user, info } => {
                let mut info = info.unwrap_or_else(|| serde_json::json!({}));
                // Hand caller-supplied state back to the host
                if let (Some(state), Some(fields)) = (&verified.state, info.as_object_mut()) {
                    fields
                        .entry("state")
                        .or_insert_with(|| serde_json::Value::String(state.clone()));
                }
                AuthOutcome::Success { user, info }
            }
            VerifyDecision::Reject { info } => AuthOutcome::Fail(FailureInfo::details(info)),
        })
    }

    fn redirect_uri<'a>(&'a self, options: &'a AuthenticateOptions) -> &'a str {
        options
            .callback_url
            .as_deref()
            .unwrap_or(&self.credentials.callback_url)
    }
}

#[async_trait]
impl<U: Send + 'static> Strategy for ZaloStrategy<U> {
    type User = U;
    type Error = ZaloError;

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn authenticate(
        &self,
        request: &AuthRequest,
        options: &AuthenticateOptions,
    ) -> ZaloOutcome<U> {
        ZaloStrategy::authenticate(self, request, options).await
    }
}
