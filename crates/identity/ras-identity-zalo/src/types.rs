//! Zalo protocol types.

use serde::{Deserialize, Deserializer, Serialize};

pub const PROVIDER_NAME: &str = "zalo";

/// Returns true when a provider `error` field marks the response as failed.
///
/// Zalo echoes `"error": 0` on successful responses, so zero, `false`, `null`
/// and the empty string all count as unset.
pub fn error_is_set(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(flag)) => *flag,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(serde_json::Value::String(s)) => !s.is_empty() && s != "0",
        Some(_) => true,
    }
}

/// Successful response from the access token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub expires_in: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub refresh_token_expires_in: Option<u64>,
}

/// Error body returned by the access token endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZaloTokenError {
    /// Numeric code or error name, depending on the endpoint version.
    pub error: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_reason: Option<String>,
}

impl ZaloTokenError {
    /// Best available human readable message.
    pub fn message(&self) -> String {
        [
            &self.error_description,
            &self.error_reason,
            &self.error_name,
        ]
        .into_iter()
        .flatten()
        .find(|m| !m.is_empty())
        .cloned()
        .unwrap_or_else(|| "Failed to obtain access token".to_string())
    }
}

/// Either shape the token endpoint can answer with.
#[derive(Debug, Clone)]
pub enum AccessTokenResult {
    Token(AccessTokenResponse),
    Error(ZaloTokenError),
}

/// Raw profile as returned by the Graph API `me` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZaloUserInfoResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub birthday: Option<String>,
    pub gender: Option<String>,
    pub picture: Option<ZaloPicture>,
    pub error: Option<serde_json::Value>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZaloPicture {
    pub data: Option<ZaloPictureData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZaloPictureData {
    pub url: Option<String>,
}

/// Error body returned by the Graph API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZaloApiError {
    pub error: Option<serde_json::Value>,
    pub error_name: Option<String>,
    pub error_reason: Option<String>,
    pub ref_doc: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub value: String,
}

/// Provider-agnostic user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub provider: String,
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub photos: Vec<Photo>,
}

/// Profile together with the response it was built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileWithMetadata {
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(rename = "_raw")]
    pub raw: String,
    #[serde(rename = "_json")]
    pub json: serde_json::Value,
}

impl ProfileWithMetadata {
    pub fn into_profile(self) -> Profile {
        self.profile
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Text fields of provider error bodies are not always strings.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Number(u64),
        Text(String),
    }

    match Option::<Lenient>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Lenient::Number(n)) => Ok(Some(n)),
        Some(Lenient::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_is_set() {
        assert!(!error_is_set(None));
        assert!(!error_is_set(Some(&json!(null))));
        assert!(!error_is_set(Some(&json!(0))));
        assert!(!error_is_set(Some(&json!(""))));
        assert!(error_is_set(Some(&json!(-14014))));
        assert!(error_is_set(Some(&json!(1))));
        assert!(error_is_set(Some(&json!("invalid_grant"))));
    }

    #[test]
    fn test_token_response_accepts_string_expiry() {
        let json = r#"{
            "access_token": "T",
            "refresh_token": "R",
            "expires_in": "3600",
            "refresh_token_expires_in": 7776000
        }"#;

        let token: AccessTokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "T");
        assert_eq!(token.refresh_token.as_deref(), Some("R"));
        assert_eq!(token.expires_in, Some(3600));
        assert_eq!(token.refresh_token_expires_in, Some(7_776_000));
    }

    #[test]
    fn test_token_response_minimal() {
        let token: AccessTokenResponse = serde_json::from_str(r#"{"access_token":"T"}"#).unwrap();
        assert!(token.refresh_token.is_none());
        assert!(token.expires_in.is_none());
    }

    #[test]
    fn test_user_info_accepts_numeric_id() {
        let info: ZaloUserInfoResponse =
            serde_json::from_value(json!({"id": 1491696566623706u64, "name": "Alice"})).unwrap();
        assert_eq!(info.id, "1491696566623706");

        assert!(serde_json::from_value::<ZaloUserInfoResponse>(json!({"id": null})).is_err());
    }

    #[test]
    fn test_token_error_message_precedence() {
        let mut err = ZaloTokenError {
            error: Some(json!(-14002)),
            error_name: Some("Invalid code".to_string()),
            error_description: Some("bad code".to_string()),
            error_reason: Some("expired".to_string()),
        };
        assert_eq!(err.message(), "bad code");

        err.error_description = None;
        assert_eq!(err.message(), "expired");

        err.error_reason = Some(String::new());
        assert_eq!(err.message(), "Invalid code");

        err.error_name = None;
        assert_eq!(err.message(), "Failed to obtain access token");
    }

    #[test]
    fn test_token_error_accepts_non_string_fields() {
        let err: ZaloTokenError = serde_json::from_value(json!({
            "error": -14002,
            "error_name": null,
            "error_description": 123,
            "error_reason": {"code": "expired"}
        }))
        .unwrap();

        assert!(err.error_name.is_none());
        assert_eq!(err.error_description.as_deref(), Some("123"));
        assert_eq!(err.error_reason.as_deref(), Some(r#"{"code":"expired"}"#));
        assert_eq!(err.message(), "123");
    }

    #[test]
    fn test_profile_serializes_camel_case() {
        let profile = Profile {
            provider: PROVIDER_NAME.to_string(),
            id: "1".to_string(),
            display_name: "Alice".to_string(),
            name: Some("Alice".to_string()),
            birthday: None,
            gender: None,
            picture: None,
            photos: vec![],
        };

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(
            value,
            json!({
                "provider": "zalo",
                "id": "1",
                "displayName": "Alice",
                "name": "Alice",
                "photos": []
            })
        );
    }
}
