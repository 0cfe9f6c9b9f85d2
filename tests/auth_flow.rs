use chrono::Duration;
use courtside::application_port::*;
use courtside::domain_model::Role;
use serde_json::{Value, json};
use std::sync::Arc;
use warp::http::StatusCode;

mod utils;

use utils::*;

#[tokio::test]
async fn test_issued_tokens_verify_to_the_same_user() {
    let setup = TestSetupBuilder::new().build();
    let login = setup.sign_up("coach@hoops.club", Role::Coach).await;

    let principal = setup
        .auth
        .verify_access(&login.tokens.access_token.0)
        .await
        .unwrap();
    assert_eq!(principal.user_id, login.user_id);
    assert_eq!(principal.role, Role::Coach);
}

#[tokio::test]
async fn test_revoked_token_stays_rejected_until_expiry() {
    let setup = TestSetupBuilder::new().build();
    let login = setup.sign_up("guard@hoops.club", Role::Player).await;
    let access = login.tokens.access_token.0;

    setup.auth.revoke(&access).await.unwrap();
    setup.clock.advance(Duration::minutes(10));

    assert!(matches!(
        setup.auth.verify_access(&access).await,
        Err(AuthError::Revoked)
    ));
    // a second revoke is harmless
    assert!(setup.auth.revoke(&access).await.is_ok());
}

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let setup = TestSetupBuilder::new().build();
    let login = setup.sign_up("center@hoops.club", Role::Player).await;

    let rotated = setup
        .auth
        .refresh(&login.tokens.refresh_token.0)
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, login.tokens.refresh_token);
    assert!(setup.auth.verify_access(&rotated.access_token.0).await.is_ok());

    assert!(matches!(
        setup.auth.refresh(&login.tokens.refresh_token.0).await,
        Err(AuthError::Revoked)
    ));
    // the new refresh token still works once
    assert!(setup.auth.refresh(&rotated.refresh_token.0).await.is_ok());
}

#[tokio::test]
async fn test_parallel_refresh_yields_one_new_pair() {
    let setup = TestSetupBuilder::new().build();
    let login = setup.sign_up("forward@hoops.club", Role::Player).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let auth = setup.auth.clone();
            let token = login.tokens.refresh_token.0.clone();
            tokio::spawn(async move { auth.refresh(&token).await })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) => assert!(e.is_unauthorized(), "unexpected error: {e}"),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_store_outage_degrades_open_then_recovers() {
    let store = Arc::new(FlakyStore::default());
    let setup = TestSetupBuilder::new().with_store(store.clone()).build();
    let login = setup.sign_up("wing@hoops.club", Role::Player).await;
    let access = login.tokens.access_token.0;

    store.go_down();
    assert!(setup.auth.verify_access(&access).await.is_ok());
    assert!(matches!(
        setup.auth.revoke(&access).await,
        Err(AuthError::Store(_))
    ));

    store.come_back();
    setup.auth.revoke(&access).await.unwrap();
    assert!(matches!(
        setup.auth.verify_access(&access).await,
        Err(AuthError::Revoked)
    ));
}

#[tokio::test]
async fn test_store_outage_rejects_when_failing_closed() {
    let store = Arc::new(FlakyStore::default());
    let setup = TestSetupBuilder::new()
        .with_store(store.clone())
        .fail_closed()
        .build();
    let login = setup.sign_up("bench@hoops.club", Role::Player).await;

    store.go_down();
    assert!(matches!(
        setup.auth.verify_access(&login.tokens.access_token.0).await,
        Err(AuthError::Revoked)
    ));

    store.come_back();
    assert!(
        setup
            .auth
            .verify_access(&login.tokens.access_token.0)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_password_change_ends_every_session() {
    let setup = TestSetupBuilder::new().build();
    let first = setup.sign_up("captain@hoops.club", Role::Coach).await;
    let second = setup
        .auth
        .login(LoginInput {
            email: "captain@hoops.club".to_string(),
            password: PASSWORD.to_string(),
        })
        .await
        .unwrap();

    let principal = setup
        .auth
        .verify_access(&first.tokens.access_token.0)
        .await
        .unwrap();
    setup.clock.advance(Duration::milliseconds(1));
    setup
        .auth
        .change_password(
            principal,
            ChangePasswordInput {
                current_password: PASSWORD.to_string(),
                new_password: "give-and-go".to_string(),
            },
        )
        .await
        .unwrap();

    for tokens in [&first.tokens, &second.tokens] {
        assert!(matches!(
            setup.auth.verify_access(&tokens.access_token.0).await,
            Err(AuthError::Revoked)
        ));
        assert!(matches!(
            setup.auth.refresh(&tokens.refresh_token.0).await,
            Err(AuthError::Revoked)
        ));
    }

    // a login in the same second as the change is unaffected
    let fresh = setup
        .auth
        .login(LoginInput {
            email: "captain@hoops.club".to_string(),
            password: "give-and-go".to_string(),
        })
        .await
        .unwrap();
    assert!(setup.auth.verify_access(&fresh.tokens.access_token.0).await.is_ok());
    assert!(setup.auth.refresh(&fresh.tokens.refresh_token.0).await.is_ok());
}

#[tokio::test]
async fn test_deactivated_user_cannot_refresh() {
    let setup = TestSetupBuilder::new().build();
    let login = setup.sign_up("cut@hoops.club", Role::Player).await;

    setup.repo.set_active(login.user_id, false);
    assert!(matches!(
        setup.auth.refresh(&login.tokens.refresh_token.0).await,
        Err(AuthError::Revoked)
    ));
}

fn body(resp: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(resp.body()).unwrap()
}

#[tokio::test]
async fn test_http_login_me_logout_me() {
    let setup = TestSetupBuilder::new().build();
    let api = setup.api();

    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/register")
        .json(&json!({"email": "point@hoops.club", "password": PASSWORD}))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/login")
        .json(&json!({"email": "point@hoops.club", "password": PASSWORD}))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let access = body(&resp)["data"]["auth_tokens"]["access_token"]
        .as_str()
        .unwrap()
        .to_string();
    let refresh = body(&resp)["data"]["auth_tokens"]["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    let me = || {
        warp::test::request()
            .method("GET")
            .path("/api/v1/auth/me")
            .header("authorization", format!("Bearer {}", access))
    };

    let resp = me().reply(&api).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(&resp)["data"]["role"], "player");

    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/logout")
        .header("cookie", format!("access_token={}; refresh_token={}", access, refresh))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = me().reply(&api).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(&resp)["error"]["code"], "TokenRevoked");

    let resp = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": refresh }))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_http_health_is_unversioned() {
    let setup = TestSetupBuilder::new().build();
    let resp = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&setup.api())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}
