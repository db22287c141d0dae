//! Graph API profile fetch and normalization.

use crate::error::{ZaloError, ZaloResult};
use crate::types::{
    PROVIDER_NAME, Photo, Profile, ProfileWithMetadata, ZaloApiError, ZaloUserInfoResponse,
    error_is_set,
};
use reqwest::Client;
use tracing::{debug, error};

/// Fields requested from the `me` endpoint
pub const PROFILE_FIELDS: &str = "id,name,birthday,gender,picture";

/// Header carrying the user access token
pub const ACCESS_TOKEN_HEADER: &str = "access_token";

#[derive(Clone)]
pub struct ProfileFetcher {
    http_client: Client,
    user_profile_url: String,
}

impl ProfileFetcher {
    pub fn new(http_client: Client, user_profile_url: impl Into<String>) -> Self {
        Self {
            http_client,
            user_profile_url: user_profile_url.into(),
        }
    }

    /// Load the user's profile with an access token.
    pub async fn fetch(&self, access_token: &str) -> ZaloResult<ProfileWithMetadata> {
        let response = self
            .http_client
            .get(&self.user_profile_url)
            .header(ACCESS_TOKEN_HEADER, access_token)
            .query(&[("fields", PROFILE_FIELDS)])
            .send()
            .await?;

        let body = response.text().await?;
        let profile = parse_user_profile(&body)?;

        debug!(
            "Successfully retrieved user info for subject: {}",
            profile.profile.id
        );
        Ok(profile)
    }
}

/// Parse a `me` response body into a normalized profile plus metadata.
pub fn parse_user_profile(body: &str) -> ZaloResult<ProfileWithMetadata> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ZaloError::InvalidUserInfoResponse(e.to_string()))?;

    if error_is_set(json.get("error")) {
        let api_error: ZaloApiError = serde_json::from_value(json).unwrap_or_default();
        let message = api_error
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Failed to fetch user profile".to_string());
        error!("User info request failed: {}", message);
        return Err(ZaloError::UserInfoFailed(message));
    }

    let user_info: ZaloUserInfoResponse = serde_json::from_value(json.clone())
        .map_err(|e| ZaloError::InvalidUserInfoResponse(e.to_string()))?;

    Ok(ProfileWithMetadata {
        profile: map_user_profile(&user_info),
        raw: body.to_string(),
        json,
    })
}

/// Map Zalo's profile shape to the provider-agnostic [`Profile`].
pub fn map_user_profile(user_info: &ZaloUserInfoResponse) -> Profile {
    let picture = user_info
        .picture
        .as_ref()
        .and_then(|p| p.data.as_ref())
        .and_then(|d| d.url.clone())
        .filter(|url| !url.is_empty());

    let photos = picture
        .iter()
        .map(|url| Photo { value: url.clone() })
        .collect();

    Profile {
        provider: PROVIDER_NAME.to_string(),
        id: user_info.id.clone(),
        display_name: user_info.name.clone(),
        name: Some(user_info.name.clone()).filter(|n| !n.is_empty()),
        birthday: user_info.birthday.clone(),
        gender: user_info.gender.clone(),
        picture,
        photos,
    }
}
