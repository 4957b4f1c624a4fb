//! Session registry: which issued tokens are still honored.
//!
//! For every (subject, kind) pair the registry keeps a set of token strings.
//! A verified token is usable when no set exists for its subject and kind,
//! or when it is a member of that set. Deleting the set revokes every
//! token of that kind at once.
//!
//! A set's TTL is applied only when it goes from empty to non-empty. Later
//! additions never extend it, so a set lives at most one TTL from its first
//! member. The store performs the add and the TTL check as one step, so a set
//! that expires concurrently is recreated with a fresh TTL. OTP sets follow
//! the same rule.

use crate::models::TokenKind;
use crate::observability::metrics::record_session_revocation;
use crate::repositories::session_store::{KeyValueStore, StoreError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn KeyValueStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn token_key(subject: Uuid, kind: TokenKind) -> String {
        format!("subject:{subject}:{kind}")
    }

    pub fn otp_key(subject: Uuid) -> String {
        format!("subject:{subject}:otp")
    }

    /// Tokens currently registered for `subject` and `kind`.
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn valid_tokens(
        &self,
        subject: Uuid,
        kind: TokenKind,
    ) -> Result<HashSet<String>, StoreError> {
        self.store
            .set_members(&Self::token_key(subject, kind))
            .await
    }

    /// Register `token`, starting the set's TTL if this is its first member.
    #[instrument(skip_all, fields(kind = %kind, ttl_secs = ttl.as_secs()))]
    pub async fn add_token(
        &self,
        subject: Uuid,
        kind: TokenKind,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.store
            .set_add(&Self::token_key(subject, kind), token, ttl)
            .await
    }

    /// Drop every registered token of `kind`. Idempotent.
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn revoke_all(&self, subject: Uuid, kind: TokenKind) -> Result<(), StoreError> {
        self.store.delete(&Self::token_key(subject, kind)).await?;
        record_session_revocation(kind.as_str());
        debug!(target: "auth.registry", kind = %kind, "Revoked session set");
        Ok(())
    }

    /// Whether a signature-valid token may be honored.
    pub async fn is_usable(
        &self,
        subject: Uuid,
        kind: TokenKind,
        token: &str,
    ) -> Result<bool, StoreError> {
        let registered = self.valid_tokens(subject, kind).await?;
        Ok(registered.is_empty() || registered.contains(token))
    }

    /// One-time codes currently valid for `subject`.
    pub async fn valid_otps(&self, subject: Uuid) -> Result<HashSet<String>, StoreError> {
        self.store.set_members(&Self::otp_key(subject)).await
    }

    /// Register an OTP, starting the set's TTL if this is its first member.
    #[instrument(skip_all, fields(ttl_secs = ttl.as_secs()))]
    pub async fn add_otp(
        &self,
        subject: Uuid,
        code: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.store.set_add(&Self::otp_key(subject), code, ttl).await
    }

    /// Drop every OTP for `subject`. Idempotent.
    pub async fn revoke_otps(&self, subject: Uuid) -> Result<(), StoreError> {
        self.store.delete(&Self::otp_key(subject)).await?;
        record_session_revocation("otp");
        debug!(target: "auth.registry", "Revoked OTP set");
        Ok(())
    }

    /// Round-trip to the backing store.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }
}
