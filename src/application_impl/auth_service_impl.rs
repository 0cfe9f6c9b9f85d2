use crate::application_impl::{RevocationGuard, RevocationStatus};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AuthServiceConfig {
    pub min_password_len: usize,
    /// How long a per-user revocation epoch is kept. Must cover the longest
    /// token lifetime.
    pub user_epoch_ttl: Duration,
}

impl Default for AuthServiceConfig {
    fn default() -> Self {
        Self {
            min_password_len: 8,
            user_epoch_ttl: Duration::days(7),
        }
    }
}

pub struct RealAuthService {
    credential_repo: Arc<dyn CredentialRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    revocation: Arc<RevocationGuard>,
    clock: Arc<dyn Clock>,
    cfg: AuthServiceConfig,
}

impl RealAuthService {
    pub fn new(
        credential_repo: Arc<dyn CredentialRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        revocation: Arc<RevocationGuard>,
        clock: Arc<dyn Clock>,
        cfg: AuthServiceConfig,
    ) -> Self {
        Self {
            credential_repo,
            credential_hasher,
            token_codec,
            revocation,
            clock,
            cfg,
        }
    }

    fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.cfg.min_password_len {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {} characters",
                self.cfg.min_password_len
            )));
        }
        Ok(())
    }

    /// Last instant the codec still accepts a token expiring at `expires_at`.
    fn accepted_until(&self, expires_at: DateTime<Utc>) -> DateTime<Utc> {
        expires_at + self.token_codec.leeway()
    }

    /// Marker lifetime for a token: everything the codec would still accept,
    /// rounded up to whole seconds.
    fn ttl_secs(&self, expires_at: DateTime<Utc>) -> u64 {
        let remaining = self.accepted_until(expires_at) - self.clock.now();
        let secs = remaining.num_seconds();
        let secs = if remaining > Duration::seconds(secs) { secs + 1 } else { secs };
        if secs <= 0 { 1 } else { secs as u64 }
    }

    fn non_empty(token: &str) -> Result<&str, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            Err(AuthError::NoToken)
        } else {
            Ok(token)
        }
    }

    async fn active_credentials(&self, user_id: UserId) -> Result<CredentialsRecord, AuthError> {
        match self.credential_repo.get_by_id(user_id).await? {
            Some(rec) if rec.is_active => Ok(rec),
            _ => {
                debug!(%user_id, "token subject no longer active");
                Err(AuthError::Revoked)
            }
        }
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError> {
        let RegisterInput {
            email,
            password,
            role,
        } = request;

        let email = Email::parse(&email).map_err(|e| AuthError::InvalidInput(e.to_string()))?;
        self.validate_password(&password)?;

        if self.credential_repo.get_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let user_id = UserId::new_v4();
        self.credential_repo
            .create(&CredentialsRecord {
                user_id,
                email,
                password_hash,
                role,
                is_active: true,
                created_at: self.clock.now(),
            })
            .await?;

        info!(%user_id, %role, "user registered");
        Ok(user_id)
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput { email, password } = request;

        let email = Email::parse(&email).map_err(|_| AuthError::InvalidCredentials)?;
        let rec = self
            .credential_repo
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !rec.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        let ok = self
            .credential_hasher
            .verify_password(&password, &rec.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue_tokens(rec.user_id, rec.role).await?;
        info!(user_id = %rec.user_id, "login succeeded");

        Ok(LoginResult {
            user_id: rec.user_id,
            role: rec.role,
            tokens,
        })
    }

    async fn issue_tokens(&self, user_id: UserId, role: Role) -> Result<AuthTokens, AuthError> {
        let (access_token, access_exp) =
            self.token_codec
                .issue_access_token(user_id, role, TokenId::generate())?;

        let refresh_jti = TokenId::generate();
        let (refresh_token, refresh_exp) =
            self.token_codec
                .issue_refresh_token(user_id, role, refresh_jti.clone())?;

        let ttl_secs = self.ttl_secs(refresh_exp);
        if let Err(e) = self
            .revocation
            .register_session(&refresh_jti, user_id, ttl_secs)
            .await
        {
            warn!(%user_id, error = %e, "refresh session not registered");
        }

        Ok(AuthTokens {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }

    async fn verify_access(&self, token: &str) -> Result<Principal, AuthError> {
        let token = Self::non_empty(token)?;
        let verified = self.token_codec.verify(token, TokenKind::Access)?;

        let status = self.revocation.status(&verified).await;
        self.revocation.admit(status, &verified)?;

        Ok(verified.principal())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let refresh_token = Self::non_empty(refresh_token)?;
        let verified = self
            .token_codec
            .verify(refresh_token, TokenKind::Refresh)?;

        let status = self.revocation.status(&verified).await;
        self.revocation.admit(status, &verified)?;

        // Rotation: check-and-consume. First caller to take the marker wins.
        match self.revocation.take_session(&verified.jti).await {
            Ok(Some(owner)) if owner == verified.user_id => {}
            Ok(Some(owner)) => {
                warn!(jti = %verified.jti, %owner, "refresh session owner mismatch");
                return Err(AuthError::InvalidToken);
            }
            Ok(None) => {
                debug!(jti = %verified.jti, "refresh session already consumed");
                return Err(AuthError::Revoked);
            }
            Err(e) => {
                warn!(jti = %verified.jti, error = %e, "refresh session check failed");
                self.revocation
                    .admit(RevocationStatus::Unknown, &verified)?;
            }
        }

        let rec = self.active_credentials(verified.user_id).await?;

        let ttl_secs = self.ttl_secs(verified.expires_at);
        if let Err(e) = self.revocation.blacklist(&verified.jti, ttl_secs).await {
            warn!(jti = %verified.jti, error = %e, "rotated refresh token not blacklisted");
        }

        let tokens = self.issue_tokens(rec.user_id, rec.role).await?;
        debug!(user_id = %rec.user_id, "refresh token rotated");
        Ok(tokens)
    }

    async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let token = Self::non_empty(token)?;
        let inspected = self.token_codec.inspect(token)?;

        if self.accepted_until(inspected.expires_at) <= self.clock.now() {
            debug!(jti = %inspected.jti, "token already expired, nothing to revoke");
            return Ok(());
        }

        let ttl_secs = self.ttl_secs(inspected.expires_at);
        self.revocation
            .blacklist(&inspected.jti, ttl_secs)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        if inspected.kind == TokenKind::Refresh {
            self.revocation
                .drop_session(&inspected.jti)
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?;
        }

        info!(jti = %inspected.jti, kind = %inspected.kind, "token revoked");
        Ok(())
    }

    async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let presented: Vec<&str> = [access_token, refresh_token]
            .into_iter()
            .flatten()
            .filter(|t| !t.trim().is_empty())
            .collect();
        if presented.is_empty() {
            return Err(AuthError::NoToken);
        }

        for token in presented {
            match self.revoke(token).await {
                Ok(()) => {}
                // A token that does not decode has no session to end.
                Err(AuthError::InvalidToken) => debug!("ignoring undecodable token on logout"),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn change_password(
        &self,
        principal: Principal,
        request: ChangePasswordInput,
    ) -> Result<(), AuthError> {
        let rec = self
            .credential_repo
            .get_by_id(principal.user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let ok = self
            .credential_hasher
            .verify_password(&request.current_password, &rec.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }
        self.validate_password(&request.new_password)?;

        let password_hash = self
            .credential_hasher
            .hash_password(&request.new_password)
            .await?;

        // Tokens carry a microsecond `iat`; anything issued before this instant
        // is revoked, a login at the same instant or later is not.
        let epoch = DateTime::<Utc>::from_timestamp_micros(self.clock.now().timestamp_micros())
            .ok_or_else(|| AuthError::InternalError("clock out of range".to_string()))?;
        let epoch_ttl = self.cfg.user_epoch_ttl.num_seconds().max(1) as u64;
        self.revocation
            .set_user_epoch(rec.user_id, epoch, epoch_ttl)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        self.credential_repo
            .update_password_hash(rec.user_id, &password_hash)
            .await?;

        info!(user_id = %rec.user_id, "password changed, outstanding tokens revoked");
        Ok(())
    }
}
