use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum RevocationStoreError {
    #[error("revocation store unavailable: {0}")]
    Unavailable(String),
    #[error("revocation store timed out")]
    Timeout,
    #[error("corrupt revocation entry: {0}")]
    Corrupt(String),
}

/// What the store knows about one token, fetched in a single round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevocationLookup {
    pub blacklisted: bool,
    /// Tokens of this user issued before this instant are revoked.
    pub user_epoch: Option<DateTime<Utc>>,
}

/// Key-value store holding refresh-session markers, blacklisted token ids and
/// per-user revocation epochs. Every entry carries a TTL; nothing is evicted
/// any other way.
#[async_trait::async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record a live refresh session for `jti`.
    async fn register_session(
        &self,
        jti: &TokenId,
        user_id: UserId,
        ttl_secs: u64,
    ) -> Result<(), RevocationStoreError>;

    /// Atomically read and delete the session marker. Of several concurrent
    /// callers at most one gets `Some`.
    async fn take_session(&self, jti: &TokenId) -> Result<Option<UserId>, RevocationStoreError>;

    async fn drop_session(&self, jti: &TokenId) -> Result<(), RevocationStoreError>;

    async fn blacklist(&self, jti: &TokenId, ttl_secs: u64) -> Result<(), RevocationStoreError>;

    async fn set_user_epoch(
        &self,
        user_id: UserId,
        epoch: DateTime<Utc>,
        ttl_secs: u64,
    ) -> Result<(), RevocationStoreError>;

    async fn lookup(
        &self,
        jti: &TokenId,
        user_id: UserId,
    ) -> Result<RevocationLookup, RevocationStoreError>;
}
