use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// What to do when the revocation store cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RevocationPolicy {
    /// Honor the token and log a warning.
    #[default]
    FailOpen,
    /// Treat the token as revoked.
    FailClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStatus {
    Active,
    Revoked,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct RevocationGuardConfig {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff: Duration,
    pub policy: RevocationPolicy,
}

impl Default for RevocationGuardConfig {
    fn default() -> Self {
        Self {
            max_attempts: RevocationGuard::MAX_ATTEMPTS,
            attempt_timeout: Duration::from_millis(250),
            backoff: Duration::from_millis(20),
            policy: RevocationPolicy::FailOpen,
        }
    }
}

/// Bounded, non-throwing access to the revocation store.
///
/// Idempotent operations are retried up to `max_attempts` (never more than
/// [`RevocationGuard::MAX_ATTEMPTS`]) with a per-attempt timeout. Reads fold
/// a store failure into [`RevocationStatus::Unknown`] instead of an error.
pub struct RevocationGuard {
    store: Arc<dyn RevocationStore>,
    cfg: RevocationGuardConfig,
}

impl RevocationGuard {
    pub const MAX_ATTEMPTS: u32 = 3;

    pub fn new(store: Arc<dyn RevocationStore>, mut cfg: RevocationGuardConfig) -> Self {
        cfg.max_attempts = cfg.max_attempts.clamp(1, Self::MAX_ATTEMPTS);
        Self { store, cfg }
    }

    pub fn policy(&self) -> RevocationPolicy {
        self.cfg.policy
    }

    async fn with_retry<T, F, Fut>(&self, op: &str, f: F) -> Result<T, RevocationStoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RevocationStoreError>>,
    {
        let mut last_err = RevocationStoreError::Timeout;
        for attempt in 1..=self.cfg.max_attempts {
            match tokio::time::timeout(self.cfg.attempt_timeout, f()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => last_err = e,
                Err(_) => last_err = RevocationStoreError::Timeout,
            }
            debug!(op, attempt, error = %last_err, "revocation store attempt failed");
            if attempt < self.cfg.max_attempts {
                tokio::time::sleep(self.cfg.backoff * attempt).await;
            }
        }
        Err(last_err)
    }

    /// Single attempt under the timeout. For operations that are not safe to
    /// repeat after an ambiguous failure.
    async fn once<T, Fut>(&self, fut: Fut) -> Result<T, RevocationStoreError>
    where
        Fut: Future<Output = Result<T, RevocationStoreError>>,
    {
        tokio::time::timeout(self.cfg.attempt_timeout, fut)
            .await
            .unwrap_or(Err(RevocationStoreError::Timeout))
    }

    pub async fn status(&self, token: &TokenVerifyResult) -> RevocationStatus {
        let lookup = self
            .with_retry("lookup", || self.store.lookup(&token.jti, token.user_id))
            .await;
        match lookup {
            Ok(found) => {
                let before_epoch = found
                    .user_epoch
                    .is_some_and(|epoch| token.issued_at < epoch);
                if found.blacklisted || before_epoch {
                    RevocationStatus::Revoked
                } else {
                    RevocationStatus::Active
                }
            }
            Err(e) => {
                warn!(jti = %token.jti, error = %e, "revocation status unknown");
                RevocationStatus::Unknown
            }
        }
    }

    /// Turn a status into an admission decision under the configured policy.
    pub fn admit(&self, status: RevocationStatus, token: &TokenVerifyResult) -> Result<(), AuthError> {
        match (status, self.cfg.policy) {
            (RevocationStatus::Active, _) => Ok(()),
            (RevocationStatus::Revoked, _) => Err(AuthError::Revoked),
            (RevocationStatus::Unknown, RevocationPolicy::FailOpen) => {
                warn!(
                    jti = %token.jti,
                    user_id = %token.user_id,
                    "accepting token without revocation check"
                );
                Ok(())
            }
            (RevocationStatus::Unknown, RevocationPolicy::FailClosed) => Err(AuthError::Revoked),
        }
    }

    pub async fn register_session(
        &self,
        jti: &TokenId,
        user_id: UserId,
        ttl_secs: u64,
    ) -> Result<(), RevocationStoreError> {
        self.with_retry("register_session", || {
            self.store.register_session(jti, user_id, ttl_secs)
        })
        .await
    }

    /// Consume a refresh session. Never retried: a timed-out first attempt may
    /// already have deleted the marker, and a retry would then see `None`.
    pub async fn take_session(&self, jti: &TokenId) -> Result<Option<UserId>, RevocationStoreError> {
        self.once(self.store.take_session(jti)).await
    }

    pub async fn drop_session(&self, jti: &TokenId) -> Result<(), RevocationStoreError> {
        self.with_retry("drop_session", || self.store.drop_session(jti))
            .await
    }

    pub async fn blacklist(&self, jti: &TokenId, ttl_secs: u64) -> Result<(), RevocationStoreError> {
        self.with_retry("blacklist", || self.store.blacklist(jti, ttl_secs))
            .await
    }

    pub async fn set_user_epoch(
        &self,
        user_id: UserId,
        epoch: DateTime<Utc>,
        ttl_secs: u64,
    ) -> Result<(), RevocationStoreError> {
        self.with_retry("set_user_epoch", || {
            self.store.set_user_epoch(user_id, epoch, ttl_secs)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::testutil::DownStore;
    use crate::infra_memory::MemoryRevocationStore;
    use std::sync::atomic::Ordering;

    fn token() -> TokenVerifyResult {
        let now = Utc::now();
        TokenVerifyResult {
            user_id: UserId::new_v4(),
            role: Role::Player,
            kind: TokenKind::Access,
            jti: TokenId::generate(),
            issued_at: now,
            expires_at: now + chrono::Duration::minutes(15),
        }
    }

    fn fast(policy: RevocationPolicy, max_attempts: u32) -> RevocationGuardConfig {
        RevocationGuardConfig {
            max_attempts,
            attempt_timeout: Duration::from_millis(50),
            backoff: Duration::from_millis(1),
            policy,
        }
    }

    #[tokio::test]
    async fn attempts_are_capped_at_three() {
        let store = Arc::new(DownStore::default());
        let guard = RevocationGuard::new(store.clone(), fast(RevocationPolicy::FailOpen, 10));

        assert_eq!(guard.status(&token()).await, RevocationStatus::Unknown);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let store = Arc::new(DownStore::default());
        let guard = RevocationGuard::new(store.clone(), fast(RevocationPolicy::FailOpen, 0));

        guard.status(&token()).await;
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hanging_store_times_out_as_unknown() {
        let store = Arc::new(DownStore::hanging());
        let guard = RevocationGuard::new(store, fast(RevocationPolicy::FailOpen, 2));

        let status = tokio::time::timeout(Duration::from_secs(5), guard.status(&token()))
            .await
            .unwrap();
        assert_eq!(status, RevocationStatus::Unknown);
    }

    #[tokio::test]
    async fn take_session_is_not_retried() {
        let store = Arc::new(DownStore::default());
        let guard = RevocationGuard::new(store.clone(), fast(RevocationPolicy::FailOpen, 3));

        assert!(guard.take_session(&TokenId::generate()).await.is_err());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn policy_decides_unknown() {
        let t = token();
        let open = RevocationGuard::new(
            Arc::new(DownStore::default()),
            fast(RevocationPolicy::FailOpen, 1),
        );
        let closed = RevocationGuard::new(
            Arc::new(DownStore::default()),
            fast(RevocationPolicy::FailClosed, 1),
        );

        assert!(open.admit(RevocationStatus::Unknown, &t).is_ok());
        assert!(matches!(
            closed.admit(RevocationStatus::Unknown, &t),
            Err(AuthError::Revoked)
        ));
        assert!(matches!(
            open.admit(RevocationStatus::Revoked, &t),
            Err(AuthError::Revoked)
        ));
        assert!(closed.admit(RevocationStatus::Active, &t).is_ok());
    }

    #[tokio::test]
    async fn blacklisted_token_is_revoked() {
        let guard = RevocationGuard::new(
            Arc::new(MemoryRevocationStore::new()),
            fast(RevocationPolicy::FailOpen, 3),
        );
        let t = token();
        assert_eq!(guard.status(&t).await, RevocationStatus::Active);

        guard.blacklist(&t.jti, 60).await.unwrap();
        assert_eq!(guard.status(&t).await, RevocationStatus::Revoked);
    }

    #[tokio::test]
    async fn tokens_before_user_epoch_are_revoked() {
        let guard = RevocationGuard::new(
            Arc::new(MemoryRevocationStore::new()),
            fast(RevocationPolicy::FailOpen, 3),
        );
        let mut old = token();
        old.issued_at = Utc::now() - chrono::Duration::minutes(5);
        let mut fresh = old.clone();
        fresh.jti = TokenId::generate();
        fresh.issued_at = Utc::now() + chrono::Duration::minutes(5);

        guard
            .set_user_epoch(old.user_id, Utc::now(), 600)
            .await
            .unwrap();

        assert_eq!(guard.status(&old).await, RevocationStatus::Revoked);
        assert_eq!(guard.status(&fresh).await, RevocationStatus::Active);
    }
}
