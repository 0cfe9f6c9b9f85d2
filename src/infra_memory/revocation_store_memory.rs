use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn new(value: V, ttl_secs: u64) -> Self {
        Self {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Process-local revocation store for single-node deployments and tests.
/// Expired entries are dropped on access and by [`Self::spawn_sweeper`].
#[derive(Default)]
pub struct MemoryRevocationStore {
    sessions: DashMap<TokenId, Entry<UserId>>,
    blacklist: DashMap<TokenId, Entry<()>>,
    user_epochs: DashMap<UserId, Entry<DateTime<Utc>>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, read or not. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        retain_live(&self.sessions) + retain_live(&self.blacklist) + retain_live(&self.user_epochs)
    }

    /// Purge on a fixed interval until the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!(purged, "expired revocation entries purged");
                }
            }
        })
    }

    fn is_blacklisted(&self, jti: &TokenId) -> bool {
        let live = self.blacklist.get(jti).map(|e| e.is_live());
        match live {
            Some(true) => true,
            Some(false) => {
                self.blacklist.remove(jti);
                false
            }
            None => false,
        }
    }

    fn user_epoch(&self, user_id: UserId) -> Option<DateTime<Utc>> {
        let found = self
            .user_epochs
            .get(&user_id)
            .map(|e| (e.is_live(), e.value));
        match found {
            Some((true, epoch)) => Some(epoch),
            Some((false, _)) => {
                self.user_epochs.remove(&user_id);
                None
            }
            None => None,
        }
    }
}

fn retain_live<K: Eq + Hash, V>(map: &DashMap<K, Entry<V>>) -> usize {
    let before = map.len();
    map.retain(|_, entry| entry.is_live());
    before.saturating_sub(map.len())
}

#[async_trait::async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn register_session(
        &self,
        jti: &TokenId,
        user_id: UserId,
        ttl_secs: u64,
    ) -> Result<(), RevocationStoreError> {
        self.sessions
            .insert(jti.clone(), Entry::new(user_id, ttl_secs));
        Ok(())
    }

    async fn take_session(&self, jti: &TokenId) -> Result<Option<UserId>, RevocationStoreError> {
        Ok(self
            .sessions
            .remove(jti)
            .filter(|(_, entry)| entry.is_live())
            .map(|(_, entry)| entry.value))
    }

    async fn drop_session(&self, jti: &TokenId) -> Result<(), RevocationStoreError> {
        self.sessions.remove(jti);
        Ok(())
    }

    async fn blacklist(&self, jti: &TokenId, ttl_secs: u64) -> Result<(), RevocationStoreError> {
        self.blacklist.insert(jti.clone(), Entry::new((), ttl_secs));
        Ok(())
    }

    async fn set_user_epoch(
        &self,
        user_id: UserId,
        epoch: DateTime<Utc>,
        ttl_secs: u64,
    ) -> Result<(), RevocationStoreError> {
        self.user_epochs.insert(user_id, Entry::new(epoch, ttl_secs));
        Ok(())
    }

    async fn lookup(
        &self,
        jti: &TokenId,
        user_id: UserId,
    ) -> Result<RevocationLookup, RevocationStoreError> {
        Ok(RevocationLookup {
            blacklisted: self.is_blacklisted(jti),
            user_epoch: self.user_epoch(user_id),
        })
    }
}
