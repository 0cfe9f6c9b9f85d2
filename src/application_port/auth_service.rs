use crate::domain_model::{Role, TokenId, TokenKind, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no token presented")]
    NoToken,
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    InvalidToken,
    #[error("token revoked")]
    Revoked,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Errors the caller recovers from by refreshing or logging in again.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::NoToken
                | AuthError::Expired
                | AuthError::InvalidToken
                | AuthError::Revoked
                | AuthError::InvalidCredentials
        )
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user_id: UserId,
    pub role: Role,
    pub tokens: AuthTokens,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct TokenVerifyResult {
    pub user_id: UserId,
    pub role: Role,
    pub kind: TokenKind,
    pub jti: TokenId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenVerifyResult {
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            role: self.role,
        }
    }
}

pub trait TokenCodec: Send + Sync {
    fn issue_access_token(
        &self,
        user: UserId,
        role: Role,
        jti: TokenId,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;
    fn issue_refresh_token(
        &self,
        user: UserId,
        role: Role,
        jti: TokenId,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError>;
    /// Full verification: signature, expiry, issuer, audience and token kind.
    fn verify(&self, token: &str, expected: TokenKind) -> Result<TokenVerifyResult, AuthError>;
    /// Signature-checked decode that tolerates expiry. Used by revocation,
    /// where an expired token is simply nothing left to revoke.
    fn inspect(&self, token: &str) -> Result<TokenVerifyResult, AuthError>;
    /// Skew tolerated past `exp`. A token verifies until `expires_at + leeway`.
    fn leeway(&self) -> Duration;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    async fn issue_tokens(&self, user_id: UserId, role: Role) -> Result<AuthTokens, AuthError>;
    async fn verify_access(&self, token: &str) -> Result<Principal, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
    async fn revoke(&self, token: &str) -> Result<(), AuthError>;
    async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError>;
    async fn change_password(
        &self,
        principal: Principal,
        request: ChangePasswordInput,
    ) -> Result<(), AuthError>;
}
