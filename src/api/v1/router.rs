use super::cookie::{ACCESS_COOKIE, REFRESH_COOKIE};
use super::error::*;
use super::handler::{self, TokenBody};
use crate::application_port::{AuthService, Principal};
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::hyper::body::Bytes;
use warp::{Filter, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let cookie_policy = Arc::new(server.cookie_policy.clone());

    let register = warp::path!("auth" / "register")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::register);

    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and(with(cookie_policy.clone()))
        .and_then(handler::login);

    let create_user = warp::path!("auth" / "users")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::create_user);

    let refresh = warp::path!("auth" / "refresh")
        .and(warp::post())
        .and(optional_token_body())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.auth_service.clone()))
        .and(with(cookie_policy.clone()))
        .and_then(handler::refresh);

    let logout = warp::path!("auth" / "logout")
        .and(warp::post())
        .and(logout_access_token())
        .and(optional_token_body())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.auth_service.clone()))
        .and(with(cookie_policy.clone()))
        .and_then(handler::logout);

    let me = warp::path!("auth" / "me")
        .and(warp::get())
        .and(with_verification(server.auth_service.clone()))
        .and_then(handler::me);

    let change_password = warp::path!("auth" / "password")
        .and(warp::put())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and(with(cookie_policy.clone()))
        .and_then(handler::change_password);

    register
        .or(create_user)
        .or(login)
        .or(refresh)
        .or(logout)
        .or(me)
        .or(change_password)
}

/// Liveness check, mounted outside the versioned prefix.
pub fn health() -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("health")
        .and(warp::get())
        .and_then(handler::health)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Access token from `Authorization: Bearer`, falling back to the
/// `access_token` cookie. A present header that is not a bearer is rejected
/// rather than silently ignored.
fn access_token() -> impl Filter<Extract = (Option<String>,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional::<String>(ACCESS_COOKIE))
        .and_then(|header: Option<String>, cookie: Option<String>| async move {
            match header {
                Some(value) => match value.strip_prefix("Bearer ") {
                    Some(token) => Ok(Some(token.trim().to_string())),
                    None => Err(reject::custom(ApiErrorCode::InvalidToken)),
                },
                None => Ok(cookie),
            }
        })
}

fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (Principal,), Error = warp::Rejection> + Clone {
    access_token().and_then(move |token: Option<String>| {
        let auth_service = auth_service.clone();
        async move {
            let token = token.ok_or_else(|| reject::custom(ApiErrorCode::NoToken))?;
            let principal = auth_service
                .verify_access(&token)
                .await
                .map_err(ApiErrorCode::from)
                .map_err(reject::custom)?;
            Ok::<_, warp::Rejection>(principal)
        }
    })
}

/// Logout takes whatever it can find. A header that is not a bearer is
/// skipped in favour of the cookie so the refresh token still gets revoked.
fn logout_access_token()
-> impl Filter<Extract = (Option<String>,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional::<String>(ACCESS_COOKIE))
        .map(|header: Option<String>, cookie: Option<String>| {
            header
                .as_deref()
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
                .or(cookie)
        })
}

#[derive(Debug)]
struct BodyDeclared;

impl reject::Reject for BodyDeclared {}

/// JSON body that may be absent entirely. A request that declares no body
/// gets the defaults; anything else needs a `Content-Length` within the limit.
fn optional_token_body() -> impl Filter<Extract = (TokenBody,), Error = warp::Rejection> + Clone {
    let absent = warp::header::optional::<u64>("content-length")
        .and(warp::header::optional::<String>("transfer-encoding"))
        .and_then(|length: Option<u64>, encoding: Option<String>| async move {
            match (length, encoding) {
                (None | Some(0), None) => Ok(TokenBody::default()),
                _ => Err(reject::custom(BodyDeclared)),
            }
        });

    let present = warp::body::content_length_limit(MAX_BODY_BYTES)
        .and(warp::body::bytes())
        .and_then(|bytes: Bytes| async move {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(TokenBody::default());
            }
            serde_json::from_slice::<TokenBody>(&bytes)
                .map_err(|_| reject::custom(ApiErrorCode::InvalidInput))
        });

    absent.or(present).unify()
}
