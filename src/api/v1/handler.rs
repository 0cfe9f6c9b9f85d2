use super::cookie::*;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::{Role, UserId};
use crate::server::CookiePolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use warp::http::StatusCode;
use warp::{self, Reply, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Self-service sign-up. Any `role` field in the body is ignored; new
/// accounts are players.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub role: Role,
}

pub async fn register(
    body: RegisterRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    create_account(auth_service, body.email, body.password, Role::Player).await
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Account creation with an explicit role, for admins only.
pub async fn create_user(
    body: CreateUserRequest,
    principal: Principal,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if principal.role != Role::Admin {
        debug!(user_id = %principal.user_id, role = %principal.role, "create_user refused");
        return Err(reject::custom(ApiErrorCode::Forbidden));
    }
    create_account(auth_service, body.email, body.password, body.role).await
}

async fn create_account(
    auth_service: Arc<dyn AuthService>,
    email: String,
    password: String,
    role: Role,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, warp::Rejection> {
    let register_input = RegisterInput {
        email,
        password,
        role,
    };
    let user_id = auth_service
        .register(register_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let json = warp::reply::json(&ApiResponse::ok(RegisterResponse { user_id, role }));
    Ok(warp::reply::with_status(json, StatusCode::CREATED))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: UserId,
    pub role: Role,
    pub auth_tokens: AuthTokens,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_input = LoginInput {
        email: body.email,
        password: body.password,
    };
    let login_result = auth_service
        .login(login_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let mut response = warp::reply::json(&ApiResponse::ok(LoginResponse {
        user_id: login_result.user_id,
        role: login_result.role,
        auth_tokens: login_result.tokens.clone(),
    }))
    .into_response();
    set_auth_cookies(
        &mut response,
        &cookie_policy,
        &login_result.tokens.access_token.0,
        &login_result.tokens.refresh_token.0,
    );
    Ok(response)
}

/// Body for refresh and logout. Both fields fall back to cookies.
#[derive(Debug, Default, Deserialize)]
pub struct TokenBody {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

pub async fn refresh(
    body: TokenBody,
    refresh_cookie: Option<String>,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let refresh_token = body
        .refresh_token
        .or(refresh_cookie)
        .ok_or(ApiErrorCode::NoToken)
        .map_err(reject::custom)?;

    let tokens = auth_service
        .refresh(&refresh_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let mut response = warp::reply::json(&ApiResponse::ok(&tokens)).into_response();
    set_auth_cookies(
        &mut response,
        &cookie_policy,
        &tokens.access_token.0,
        &tokens.refresh_token.0,
    );
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse;

pub async fn logout(
    access_token: Option<String>,
    body: TokenBody,
    refresh_cookie: Option<String>,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let refresh_token = body.refresh_token.or(refresh_cookie);
    auth_service
        .logout(access_token.as_deref(), refresh_token.as_deref())
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let mut response = warp::reply::json(&ApiResponse::ok(LogoutResponse)).into_response();
    clear_auth_cookies(&mut response, &cookie_policy);
    Ok(response)
}

pub async fn me(principal: Principal) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(principal)))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordResponse;

pub async fn change_password(
    body: ChangePasswordRequest,
    principal: Principal,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = ChangePasswordInput {
        current_password: body.current_password,
        new_password: body.new_password,
    };
    auth_service
        .change_password(principal, input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    // Every outstanding token is dead now; the client logs in again.
    let mut response =
        warp::reply::json(&ApiResponse::ok(ChangePasswordResponse)).into_response();
    clear_auth_cookies(&mut response, &cookie_policy);
    Ok(response)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(HealthResponse {
        status: "ok",
    })))
}
