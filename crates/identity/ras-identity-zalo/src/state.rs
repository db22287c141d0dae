//! PKCE state storage binding a verifier to the `state` handle that comes back
//! on the authorization callback.

use crate::error::{ZaloError, ZaloResult};
use crate::pkce::COMPAT_VERIFIER;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ras_identity_core::AuthRequest;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Context handed to the store alongside the verifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreMeta {
    pub authorization_url: String,
    pub token_url: String,
    pub app_id: String,
    pub redirect_uri: String,
}

/// What a successful `verify` recovers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedState {
    pub verifier: String,
    /// Caller-supplied state stored with the verifier, if any.
    pub state: Option<String>,
}

/// Trait for PKCE verifier storage.
///
/// Implementations must fail closed: an unknown, expired, already used or
/// tampered handle yields `Ok(None)`, never some other verifier. `Err` is
/// reserved for the store itself being unavailable.
#[async_trait]
pub trait PkceStore: Send + Sync {
    /// Persist `verifier` and return the handle to send as `state`.
    async fn store(
        &self,
        request: &AuthRequest,
        verifier: &str,
        state: Option<&str>,
        meta: &StoreMeta,
    ) -> ZaloResult<String>;

    /// Resolve a handle back to its verifier.
    async fn verify(&self, request: &AuthRequest, handle: &str)
    -> ZaloResult<Option<VerifiedState>>;
}

#[derive(Debug, Clone)]
struct PkceEntry {
    verifier: String,
    state: Option<String>,
    expires_at: DateTime<Utc>,
}

impl PkceEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// In-memory, single-use implementation of [`PkceStore`].
///
/// Handles are random UUIDs chosen by the store; each resolves once.
pub struct InMemoryPkceStore {
    entries: Arc<RwLock<HashMap<String, PkceEntry>>>,
    ttl: Duration,
}

impl InMemoryPkceStore {
    /// Create a store whose entries live for 10 minutes.
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(10))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryPkceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PkceStore for InMemoryPkceStore {
    async fn store(
        &self,
        _request: &AuthRequest,
        verifier: &str,
        state: Option<&str>,
        meta: &StoreMeta,
    ) -> ZaloResult<String> {
        let expires_at = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| ZaloError::StoreError("state TTL out of range".to_string()))?;

        let handle = Uuid::new_v4().to_string();
        let entry = PkceEntry {
            verifier: verifier.to_string(),
            state: state.map(String::from),
            expires_at,
        };

        self.entries.write().await.insert(handle.clone(), entry);
        debug!(
            "Stored PKCE verifier for app {} redirecting to {}",
            meta.app_id, meta.redirect_uri
        );
        Ok(handle)
    }

    async fn verify(
        &self,
        _request: &AuthRequest,
        handle: &str,
    ) -> ZaloResult<Option<VerifiedState>> {
        // Remove on read so a handle can never be redeemed twice
        let Some(entry) = self.entries.write().await.remove(handle) else {
            debug!("PKCE handle not found");
            return Ok(None);
        };

        if entry.is_expired(Utc::now()) {
            debug!("PKCE handle expired");
            return Ok(None);
        }

        Ok(Some(VerifiedState {
            verifier: entry.verifier,
            state: entry.state,
        }))
    }
}

/// Degenerate store used when no real store is configured.
///
/// It remembers nothing: `store` echoes the caller's state (or a random hex
/// handle) and `verify` hands back the fixed compatibility verifier for any
/// handle. Since nothing was bound at store time, `verify` never recovers a
/// caller state. This gives no verifier secrecy and no replay protection.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompatPkceStore;

impl CompatPkceStore {
    fn random_handle() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

#[async_trait]
impl PkceStore for CompatPkceStore {
    async fn store(
        &self,
        _request: &AuthRequest,
        _verifier: &str,
        state: Option<&str>,
        _meta: &StoreMeta,
    ) -> ZaloResult<String> {
        Ok(match state {
            Some(state) if !state.is_empty() => state.to_string(),
            _ => Self::random_handle(),
        })
    }

    async fn verify(
        &self,
        _request: &AuthRequest,
        _handle: &str,
    ) -> ZaloResult<Option<VerifiedState>> {
        Ok(Some(VerifiedState {
            verifier: COMPAT_VERIFIER.to_string(),
            state: None,
        }))
    }
}
