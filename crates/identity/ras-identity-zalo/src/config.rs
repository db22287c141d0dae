//! Zalo strategy configuration types.

use crate::error::{ZaloError, ZaloResult};
use crate::state::PkceStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_AUTHORIZATION_URL: &str = "https://oauth.zaloapp.com/v4/permission";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth.zaloapp.com/v4/access_token";
pub const DEFAULT_USER_PROFILE_URL: &str = "https://graph.zalo.me/v2.0/me";

/// Zalo application credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub app_id: String,
    pub app_secret: String,
    pub callback_url: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

impl Credentials {
    pub fn new(
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            callback_url: callback_url.into(),
        }
    }

    pub fn validate(&self) -> ZaloResult<()> {
        if self.app_id.is_empty() {
            return Err(ZaloError::ConfigError("appId is required".to_string()));
        }
        if self.app_secret.is_empty() {
            return Err(ZaloError::ConfigError("appSecret is required".to_string()));
        }
        if self.callback_url.is_empty() {
            return Err(ZaloError::ConfigError("callbackURL is required".to_string()));
        }
        Ok(())
    }
}

/// Zalo strategy configuration.
///
/// Leaving `store` unset selects compatibility PKCE: a fixed, public verifier
/// that satisfies the provider's parameter checks but offers no secrecy.
/// Supplying a store turns on real per-request PKCE.
#[derive(Clone)]
pub struct ZaloStrategyConfig {
    pub credentials: Credentials,
    pub store: Option<Arc<dyn PkceStore>>,
    pub authorization_url: String,
    pub token_url: String,
    pub user_profile_url: String,
    /// Whether the verification callback also receives the request.
    pub pass_req_to_callback: bool,
    pub http_client: Option<reqwest::Client>,
}

impl fmt::Debug for ZaloStrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZaloStrategyConfig")
            .field("credentials", &self.credentials)
            .field("store", &self.store.is_some())
            .field("authorization_url", &self.authorization_url)
            .field("token_url", &self.token_url)
            .field("user_profile_url", &self.user_profile_url)
            .field("pass_req_to_callback", &self.pass_req_to_callback)
            .finish()
    }
}

impl ZaloStrategyConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            store: None,
            authorization_url: DEFAULT_AUTHORIZATION_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            user_profile_url: DEFAULT_USER_PROFILE_URL.to_string(),
            pass_req_to_callback: false,
            http_client: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn PkceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_authorization_url(mut self, url: impl Into<String>) -> Self {
        self.authorization_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_user_profile_url(mut self, url: impl Into<String>) -> Self {
        self.user_profile_url = url.into();
        self
    }

    pub fn with_pass_req_to_callback(mut self, pass: bool) -> Self {
        self.pass_req_to_callback = pass;
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn passes_request(&self) -> bool {
        self.pass_req_to_callback
    }

    pub fn uses_real_pkce(&self) -> bool {
        self.store.is_some()
    }
}

/// Serializable form of the strategy options, for loading from a config source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZaloSettings {
    pub app_id: String,
    pub app_secret: String,
    #[serde(rename = "callbackURL")]
    pub callback_url: String,
    #[serde(default, rename = "authorizationURL")]
    pub authorization_url: Option<String>,
    #[serde(default, rename = "tokenURL")]
    pub token_url: Option<String>,
    #[serde(default, rename = "userProfileURL")]
    pub user_profile_url: Option<String>,
    #[serde(default)]
    pub pass_req_to_callback: bool,
}

impl From<ZaloSettings> for ZaloStrategyConfig {
    fn from(settings: ZaloSettings) -> Self {
        let mut config = ZaloStrategyConfig::new(Credentials::new(
            settings.app_id,
            settings.app_secret,
            settings.callback_url,
        ))
        .with_pass_req_to_callback(settings.pass_req_to_callback);

        if let Some(url) = settings.authorization_url {
            config = config.with_authorization_url(url);
        }
        if let Some(url) = settings.token_url {
            config = config.with_token_url(url);
        }
        if let Some(url) = settings.user_profile_url {
            config = config.with_user_profile_url(url);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InMemoryPkceStore;

    #[test]
    fn test_credentials_validation() {
        assert!(Credentials::new("id", "secret", "http://cb").validate().is_ok());

        for (creds, field) in [
            (Credentials::new("", "secret", "http://cb"), "appId"),
            (Credentials::new("id", "", "http://cb"), "appSecret"),
            (Credentials::new("id", "secret", ""), "callbackURL"),
        ] {
            match creds.validate() {
                Err(ZaloError::ConfigError(msg)) => assert!(msg.contains(field)),
                other => panic!("expected config error for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("id", "top-secret", "http://cb");
        let rendered = format!("{:?}", ZaloStrategyConfig::new(creds));
        assert!(!rendered.contains("top-secret"));
    }

    #[test]
    fn test_store_switches_pkce_mode() {
        let config = ZaloStrategyConfig::new(Credentials::new("id", "secret", "http://cb"));
        assert!(!config.uses_real_pkce());

        let config = config.with_store(Arc::new(InMemoryPkceStore::new()));
        assert!(config.uses_real_pkce());
    }

    #[test]
    fn test_settings_into_config() {
        let settings: ZaloSettings = serde_json::from_value(serde_json::json!({
            "appId": "id",
            "appSecret": "secret",
            "callbackURL": "http://cb",
            "tokenURL": "http://localhost/token",
            "passReqToCallback": true
        }))
        .unwrap();

        let config = ZaloStrategyConfig::from(settings);
        assert_eq!(config.credentials.app_id, "id");
        assert_eq!(config.token_url, "http://localhost/token");
        assert_eq!(config.authorization_url, DEFAULT_AUTHORIZATION_URL);
        assert_eq!(config.user_profile_url, DEFAULT_USER_PROFILE_URL);
        assert!(config.passes_request());
        assert!(!config.uses_real_pkce());
    }
}
