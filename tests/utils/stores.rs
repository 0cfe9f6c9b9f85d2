use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courtside::domain_model::{TokenId, UserId};
use courtside::domain_port::{RevocationLookup, RevocationStore, RevocationStoreError};
use courtside::infra_memory::MemoryRevocationStore;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory revocation store that can be switched off to simulate an outage.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryRevocationStore,
    down: AtomicBool,
}

impl FlakyStore {
    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub fn come_back(&self) {
        self.down.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RevocationStoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RevocationStoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RevocationStore for FlakyStore {
    async fn register_session(
        &self,
        jti: &TokenId,
        user_id: UserId,
        ttl_secs: u64,
    ) -> Result<(), RevocationStoreError> {
        self.check()?;
        self.inner.register_session(jti, user_id, ttl_secs).await
    }

    async fn take_session(&self, jti: &TokenId) -> Result<Option<UserId>, RevocationStoreError> {
        self.check()?;
        self.inner.take_session(jti).await
    }

    async fn drop_session(&self, jti: &TokenId) -> Result<(), RevocationStoreError> {
        self.check()?;
        self.inner.drop_session(jti).await
    }

    async fn blacklist(&self, jti: &TokenId, ttl_secs: u64) -> Result<(), RevocationStoreError> {
        self.check()?;
        self.inner.blacklist(jti, ttl_secs).await
    }

    async fn set_user_epoch(
        &self,
        user_id: UserId,
        epoch: DateTime<Utc>,
        ttl_secs: u64,
    ) -> Result<(), RevocationStoreError> {
        self.check()?;
        self.inner.set_user_epoch(user_id, epoch, ttl_secs).await
    }

    async fn lookup(
        &self,
        jti: &TokenId,
        user_id: UserId,
    ) -> Result<RevocationLookup, RevocationStoreError> {
        self.check()?;
        self.inner.lookup(jti, user_id).await
    }
}
