//! Zalo OAuth2 authentication strategy with PKCE support.
//!
//! Zalo departs from stock OAuth2 in a few places: credentials are an
//! `app_id` / `app_secret` pair, the secret travels in a `secret_key` header,
//! and the Graph API takes the access token as a header too. This crate drives
//! the authorization code flow against those endpoints and plugs into the
//! [`ras_identity_core::Strategy`] contract.
//!
//! PKCE runs in one of two modes, chosen by whether a [`PkceStore`] is
//! configured. With a store every attempt gets a random verifier bound to a
//! single-use state handle. Without one the strategy falls back to a fixed,
//! publicly known verifier ([`CompatPkceStore`]) which only keeps the request
//! shape the provider expects and provides no verifier secrecy.

mod config;
mod error;
mod pkce;
mod profile;
mod state;
mod strategy;
mod token;
mod types;
mod verify;


pub use config::{
    Credentials, DEFAULT_AUTHORIZATION_URL, DEFAULT_TOKEN_URL, DEFAULT_USER_PROFILE_URL,
    ZaloSettings, ZaloStrategyConfig,
};
pub use error::{BoxError, ZaloError, ZaloResult};
pub use pkce::{
    CHALLENGE_METHOD, COMPAT_CHALLENGE, COMPAT_VERIFIER, PkceMode, PkcePair, challenge_for,
    generate_verifier,
};
pub use profile::{
    ACCESS_TOKEN_HEADER, PROFILE_FIELDS, ProfileFetcher, map_user_profile, parse_user_profile,
};
pub use state::{CompatPkceStore, InMemoryPkceStore, PkceStore, StoreMeta, VerifiedState};
pub use strategy::{INVALID_STATE_MESSAGE, MISSING_CODE_MESSAGE, ZaloOutcome, ZaloStrategy};
pub use token::{SECRET_HEADER, TokenExchanger, parse_token_response};
pub use types::{
    AccessTokenResponse, AccessTokenResult, PROVIDER_NAME, Photo, Profile, ProfileWithMetadata,
    ZaloApiError, ZaloPicture, ZaloPictureData, ZaloTokenError, ZaloUserInfoResponse,
};
pub use verify::{VerifyCallback, VerifyDecision, VerifyFuture, VerifyResult};

// Re-export common types for convenience
pub use ras_identity_core::{AuthOutcome, AuthRequest, AuthenticateOptions, FailureInfo, Strategy};
