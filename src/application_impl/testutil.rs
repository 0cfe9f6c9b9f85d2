//! Shared fixtures for the service tests.

use crate::application_impl::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};

/// Revocation store that fails every call and counts how often it was asked.
#[derive(Default)]
pub struct DownStore {
    pub calls: AtomicU32,
    hang: bool,
}

impl DownStore {
    pub fn hanging() -> Self {
        Self {
            calls: AtomicU32::new(0),
            hang: true,
        }
    }

    async fn fail<T>(&self) -> Result<T, RevocationStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        Err(RevocationStoreError::Unavailable(
            "connection refused".to_string(),
        ))
    }
}

#[async_trait::async_trait]
impl RevocationStore for DownStore {
    async fn register_session(
        &self,
        _: &TokenId,
        _: UserId,
        _: u64,
    ) -> Result<(), RevocationStoreError> {
        self.fail().await
    }

    async fn take_session(&self, _: &TokenId) -> Result<Option<UserId>, RevocationStoreError> {
        self.fail().await
    }

    async fn drop_session(&self, _: &TokenId) -> Result<(), RevocationStoreError> {
        self.fail().await
    }

    async fn blacklist(&self, _: &TokenId, _: u64) -> Result<(), RevocationStoreError> {
        self.fail().await
    }

    async fn set_user_epoch(
        &self,
        _: UserId,
        _: DateTime<Utc>,
        _: u64,
    ) -> Result<(), RevocationStoreError> {
        self.fail().await
    }

    async fn lookup(
        &self,
        _: &TokenId,
        _: UserId,
    ) -> Result<RevocationLookup, RevocationStoreError> {
        self.fail().await
    }
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        issuer: "courtside.auth".to_string(),
        audience: "courtside-web".to_string(),
        access_ttl: Duration::minutes(15),
        refresh_ttl: Duration::days(7),
        leeway_secs: 0,
        signing_key: b"test-signing-secret".to_vec(),
    }
}

pub struct Harness {
    pub service: RealAuthService,
    pub clock: Arc<ManualClock>,
    pub repo: Arc<MemoryCredentialRepo>,
}

pub fn harness(store: Arc<dyn RevocationStore>, policy: RevocationPolicy) -> Harness {
    harness_with_jwt(store, policy, jwt_config())
}

pub fn harness_with_jwt(
    store: Arc<dyn RevocationStore>,
    policy: RevocationPolicy,
    jwt: JwtConfig,
) -> Harness {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let repo = Arc::new(MemoryCredentialRepo::new());
    let codec = JwtHs256Codec::try_new(jwt, clock.clone()).unwrap();
    let guard = RevocationGuard::new(
        store,
        RevocationGuardConfig {
            max_attempts: 2,
            attempt_timeout: std::time::Duration::from_millis(50),
            backoff: std::time::Duration::from_millis(1),
            policy,
        },
    );
    let service = RealAuthService::new(
        repo.clone(),
        Arc::new(Argon2PasswordHasher::with_params(8, 1, 1).unwrap()),
        Arc::new(codec),
        Arc::new(guard),
        clock.clone(),
        AuthServiceConfig::default(),
    );
    Harness {
        service,
        clock,
        repo,
    }
}

/// Revocation store that records the TTL of every blacklist write.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryRevocationStore,
    pub blacklist_ttls: Mutex<Vec<u64>>,
}

#[async_trait::async_trait]
impl RevocationStore for RecordingStore {
    async fn register_session(
        &self,
        jti: &TokenId,
        user_id: UserId,
        ttl_secs: u64,
    ) -> Result<(), RevocationStoreError> {
        self.inner.register_session(jti, user_id, ttl_secs).await
    }

    async fn take_session(&self, jti: &TokenId) -> Result<Option<UserId>, RevocationStoreError> {
        self.inner.take_session(jti).await
    }

    async fn drop_session(&self, jti: &TokenId) -> Result<(), RevocationStoreError> {
        self.inner.drop_session(jti).await
    }

    async fn blacklist(&self, jti: &TokenId, ttl_secs: u64) -> Result<(), RevocationStoreError> {
        self.blacklist_ttls.lock().unwrap().push(ttl_secs);
        self.inner.blacklist(jti, ttl_secs).await
    }

    async fn set_user_epoch(
        &self,
        user_id: UserId,
        epoch: DateTime<Utc>,
        ttl_secs: u64,
    ) -> Result<(), RevocationStoreError> {
        self.inner.set_user_epoch(user_id, epoch, ttl_secs).await
    }

    async fn lookup(
        &self,
        jti: &TokenId,
        user_id: UserId,
    ) -> Result<RevocationLookup, RevocationStoreError> {
        self.inner.lookup(jti, user_id).await
    }
}

pub fn memory_harness() -> Harness {
    harness(
        Arc::new(MemoryRevocationStore::new()),
        RevocationPolicy::FailOpen,
    )
}
