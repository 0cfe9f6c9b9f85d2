use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{self, Settings};
use anyhow::anyhow;
use chrono::Duration;
use sqlx::MySqlPool;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Attributes for the `access_token` / `refresh_token` cookies.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_max_age_secs: i64,
    pub refresh_max_age_secs: i64,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            secure: false,
            access_max_age_secs: 15 * 60,
            refresh_max_age_secs: 7 * 24 * 60 * 60,
        }
    }
}

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub cookie_policy: CookiePolicy,
    pool: Option<MySqlPool>,
    sweeper: Option<JoinHandle<()>>,
}

/// Build the codec configuration. A missing secret is fatal.
pub fn jwt_config(jwt: &settings::Jwt) -> Result<JwtConfig, AuthError> {
    let secret = jwt.resolve_secret().ok_or_else(|| {
        AuthError::Configuration(format!(
            "no JWT signing secret: set {} or jwt.secret",
            settings::JWT_SECRET_ENV
        ))
    })?;
    let cfg = JwtConfig {
        issuer: jwt.issuer.clone(),
        audience: jwt.audience.clone(),
        access_ttl: Duration::seconds(jwt.access_ttl_secs),
        refresh_ttl: Duration::seconds(jwt.refresh_ttl_secs),
        leeway_secs: jwt.leeway_secs,
        signing_key: secret.into_bytes(),
    };
    cfg.validate()?;
    Ok(cfg)
}

pub fn guard_config(revocation: &settings::Revocation) -> RevocationGuardConfig {
    RevocationGuardConfig {
        max_attempts: revocation.max_attempts,
        attempt_timeout: std::time::Duration::from_millis(revocation.attempt_timeout_ms),
        backoff: std::time::Duration::from_millis(revocation.backoff_ms),
        policy: revocation.policy,
    }
}

impl Server {
    pub fn with_service(auth_service: Arc<dyn AuthService>, cookie_policy: CookiePolicy) -> Self {
        Self {
            auth_service,
            cookie_policy,
            pool: None,
            sweeper: None,
        }
    }

    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let cookie_policy = CookiePolicy {
            secure: settings.http.secure_cookies,
            access_max_age_secs: settings.jwt.access_ttl_secs,
            refresh_max_age_secs: settings.jwt.refresh_ttl_secs,
        };

        if settings.auth.backend == "fake" {
            warn!("fake auth backend enabled, every login succeeds");
            return Ok(Self::with_service(
                Arc::new(FakeAuthService::new()),
                cookie_policy,
            ));
        }
        if settings.auth.backend != "real" {
            return Err(anyhow!("Unknown auth backend: {}", settings.auth.backend));
        }

        // Validate the signing secret before touching any backend.
        let jwt_config = jwt_config(&settings.jwt)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let token_codec: Arc<dyn TokenCodec> =
            Arc::new(JwtHs256Codec::try_new(jwt_config, clock.clone())?);

        let mut pool = None;
        let credential_repo: Arc<dyn CredentialRepo> = match settings.credentials.backend.as_str()
        {
            "memory" => Arc::new(MemoryCredentialRepo::new()),
            "mysql" => {
                let dsn = settings
                    .credentials
                    .mysql_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("credentials.mysql_url is required for mysql"))?;
                let p = MySqlPool::connect(dsn).await?;
                pool = Some(p.clone());
                Arc::new(MySqlCredentialRepo::new(p))
            }
            other => return Err(anyhow!("Unknown credentials backend: {}", other)),
        };

        let mut sweeper = None;
        let revocation_store: Arc<dyn RevocationStore> =
            match settings.revocation.backend.as_str() {
                "memory" => {
                    let store = Arc::new(MemoryRevocationStore::new());
                    let every = settings.revocation.sweep_interval_secs.max(1);
                    sweeper = Some(store.spawn_sweeper(std::time::Duration::from_secs(every)));
                    store
                }
                "redis" => {
                    let dsn = settings
                        .revocation
                        .redis_url
                        .as_deref()
                        .ok_or_else(|| anyhow!("revocation.redis_url is required for redis"))?;
                    let redis_client = redis::Client::open(dsn)?;
                    let redis_manager = redis_client.get_connection_manager().await?;
                    Arc::new(RedisRevocationStore::new(
                        redis_manager,
                        settings.revocation.key_prefix.clone(),
                    ))
                }
                other => return Err(anyhow!("Unknown revocation backend: {}", other)),
            };
        let guard = Arc::new(RevocationGuard::new(
            revocation_store,
            guard_config(&settings.revocation),
        ));
        info!(policy = ?guard.policy(), "revocation guard ready");

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            credential_repo,
            Arc::new(Argon2PasswordHasher::new()),
            token_codec,
            guard,
            clock,
            AuthServiceConfig {
                min_password_len: settings.auth.min_password_len,
                user_epoch_ttl: Duration::seconds(
                    settings.jwt.refresh_ttl_secs + settings.jwt.leeway_secs as i64,
                ),
            },
        ));

        info!("server started");

        Ok(Self {
            auth_service,
            cookie_policy,
            pool,
            sweeper,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");
        if let Some(sweeper) = &self.sweeper {
            sweeper.abort();
        }
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
