use chrono::{Duration, Utc};
use courtside::api;
use courtside::application_impl::*;
use courtside::application_port::*;
use courtside::domain_model::Role;
use courtside::domain_port::{ManualClock, RevocationStore};
use courtside::infra_memory::MemoryCredentialRepo;
use courtside::server::{CookiePolicy, Server};
use std::sync::Arc;
use warp::Filter;

pub const PASSWORD: &str = "pick-and-roll";

pub struct TestSetup {
    pub auth: Arc<RealAuthService>,
    pub clock: Arc<ManualClock>,
    pub repo: Arc<MemoryCredentialRepo>,
}

pub struct TestSetupBuilder {
    store: Option<Arc<dyn RevocationStore>>,
    policy: RevocationPolicy,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            policy: RevocationPolicy::FailOpen,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RevocationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn fail_closed(mut self) -> Self {
        self.policy = RevocationPolicy::FailClosed;
        self
    }

    pub fn build(self) -> TestSetup {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let repo = Arc::new(MemoryCredentialRepo::new());
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(courtside::infra_memory::MemoryRevocationStore::new()));
        let codec = JwtHs256Codec::try_new(
            JwtConfig {
                issuer: "courtside.auth".to_string(),
                audience: "courtside-web".to_string(),
                access_ttl: Duration::minutes(15),
                refresh_ttl: Duration::days(7),
                leeway_secs: 5,
                signing_key: b"integration-secret".to_vec(),
            },
            clock.clone(),
        )
        .unwrap();
        let guard = RevocationGuard::new(
            store,
            RevocationGuardConfig {
                max_attempts: 3,
                attempt_timeout: std::time::Duration::from_millis(100),
                backoff: std::time::Duration::from_millis(1),
                policy: self.policy,
            },
        );
        let auth = Arc::new(RealAuthService::new(
            repo.clone(),
            Arc::new(Argon2PasswordHasher::with_params(8, 1, 1).unwrap()),
            Arc::new(codec),
            Arc::new(guard),
            clock.clone(),
            AuthServiceConfig::default(),
        ));
        TestSetup { auth, clock, repo }
    }
}

impl TestSetup {
    pub async fn sign_up(&self, email: &str, role: Role) -> LoginResult {
        self.auth
            .register(RegisterInput {
                email: email.to_string(),
                password: PASSWORD.to_string(),
                role,
            })
            .await
            .unwrap();
        self.auth
            .login(LoginInput {
                email: email.to_string(),
                password: PASSWORD.to_string(),
            })
            .await
            .unwrap()
    }

    /// The HTTP surface as `main` mounts it.
    pub fn api(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone + 'static
    {
        let server = Arc::new(Server::with_service(
            self.auth.clone(),
            CookiePolicy::default(),
        ));
        let api_v1 = warp::path("api")
            .and(warp::path("v1"))
            .and(api::v1::routes(server));
        api::v1::health()
            .or(api_v1)
            .recover(api::v1::recover_error)
    }
}
