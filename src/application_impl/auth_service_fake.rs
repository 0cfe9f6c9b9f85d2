use crate::application_port::*;
use crate::domain_model::{Email, Role, UserId};
use chrono::{Duration, Utc};

const ACCESS_PREFIX: &str = "fake-access-token:";
const REFRESH_PREFIX: &str = "fake-refresh-token:";

#[derive(Debug)]
pub struct FakeAuthService;

impl FakeAuthService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FakeAuthService {
    fn default() -> Self {
        Self::new()
    }
}

// Store-free stand-in for frontend work. Any credentials log in; every token
// is `<prefix><user_id>:<role>` and revocation is a no-op.
#[async_trait::async_trait]
impl AuthService for FakeAuthService {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError> {
        let email =
            Email::parse(&request.email).map_err(|e| AuthError::InvalidInput(e.to_string()))?;
        Ok(get_fake_id(&email))
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let email = Email::parse(&request.email).map_err(|_| AuthError::InvalidCredentials)?;
        let role = Role::Admin;
        let user_id = get_fake_id(&email);
        Ok(LoginResult {
            user_id,
            role,
            tokens: get_fake_tokens(user_id, role),
        })
    }

    async fn issue_tokens(&self, user_id: UserId, role: Role) -> Result<AuthTokens, AuthError> {
        Ok(get_fake_tokens(user_id, role))
    }

    async fn verify_access(&self, token: &str) -> Result<Principal, AuthError> {
        parse_fake_token(token, ACCESS_PREFIX)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let principal = parse_fake_token(refresh_token, REFRESH_PREFIX)?;
        Ok(get_fake_tokens(principal.user_id, principal.role))
    }

    async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::NoToken);
        }
        Ok(())
    }

    async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        if access_token.or(refresh_token).is_none() {
            return Err(AuthError::NoToken);
        }
        Ok(())
    }

    async fn change_password(
        &self,
        _principal: Principal,
        _request: ChangePasswordInput,
    ) -> Result<(), AuthError> {
        Ok(())
    }
}

fn get_fake_id(email: &Email) -> UserId {
    UserId(uuid::Uuid::new_v5(
        &uuid::Uuid::NAMESPACE_OID,
        email.as_str().as_bytes(),
    ))
}

fn get_fake_tokens(user_id: UserId, role: Role) -> AuthTokens {
    let now = Utc::now();
    AuthTokens {
        access_token: AccessToken(format!("{}{}:{}", ACCESS_PREFIX, user_id, role)),
        access_token_expires_at: now + Duration::days(1),
        refresh_token: RefreshToken(format!("{}{}:{}", REFRESH_PREFIX, user_id, role)),
        refresh_token_expires_at: now + Duration::days(7),
    }
}

fn parse_fake_token(token: &str, prefix: &str) -> Result<Principal, AuthError> {
    if token.trim().is_empty() {
        return Err(AuthError::NoToken);
    }
    let (user_id, role) = token
        .strip_prefix(prefix)
        .and_then(|rest| rest.split_once(':'))
        .ok_or(AuthError::InvalidToken)?;
    let user_id = user_id
        .parse::<UserId>()
        .map_err(|_| AuthError::InvalidToken)?;
    let role = role.parse::<Role>().map_err(|_| AuthError::InvalidToken)?;
    Ok(Principal { user_id, role })
}
