#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{json, Value};

use common::{bearer, TestEnv, PASSWORD};
use zeon_server::auth::Role;

async fn login_status(env: &TestEnv, body: Value) -> (StatusCode, Value) {
    let app = test_app!(env);
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    (status, test::read_body_json(resp).await)
}

#[actix_web::test]
async fn test_login_returns_token_and_role() {
    let env = TestEnv::new();
    env.token_for("ana@example.com", Role::Admin).await;

    let (status, body) = login_status(
        &env,
        json!({"email": "  ANA@example.com ", "password": PASSWORD}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
    assert_eq!(body["email"], "ana@example.com");

    let claims = env.state.tokens.validate(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.role, "admin");
}

#[actix_web::test]
async fn test_login_accepts_username_field() {
    let env = TestEnv::new();
    env.token_for("luis@example.com", Role::User).await;

    let (status, body) =
        login_status(&env, json!({"username": "luis@example.com", "password": PASSWORD})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");
}

#[actix_web::test]
async fn test_login_failures_are_indistinguishable() {
    let env = TestEnv::new();
    env.token_for("ana@example.com", Role::User).await;
    let inactive = env.token_for("old@example.com", Role::User).await;
    let claims = env.state.tokens.validate(&inactive).unwrap();
    env.state
        .users
        .update(claims.sub.parse().unwrap(), Some(false), None)
        .await
        .unwrap();

    let attempts = [
        json!({"email": "ana@example.com", "password": "wrong-password"}),
        json!({"email": "nobody@example.com", "password": PASSWORD}),
        json!({"email": "old@example.com", "password": PASSWORD}),
        json!({"email": "ana@example.com", "password": ""}),
    ];

    let mut messages = Vec::new();
    for attempt in attempts {
        let (status, body) = login_status(&env, attempt).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
        messages.push(body["message"].as_str().unwrap().to_string());
    }
    messages.dedup();
    assert_eq!(messages, vec!["Invalid email or password".to_string()]);
}

#[actix_web::test]
async fn test_me_describes_token_owner() {
    let env = TestEnv::new();
    let token = env.token_for("root@example.com", Role::Superadmin).await;
    let app = test_app!(env);

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;

    assert_eq!(body["email"], "root@example.com");
    assert_eq!(body["role"], "superadmin");
    assert!(body["id"].is_string());
}

#[actix_web::test]
async fn test_me_rejects_missing_and_forged_tokens() {
    let env = TestEnv::new();
    let app = test_app!(env);

    let req = test::TestRequest::get().uri("/auth/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer("not.a.token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_deactivated_account_loses_access() {
    let env = TestEnv::new();
    let token = env.token_for("ana@example.com", Role::User).await;
    let claims = env.state.tokens.validate(&token).unwrap();
    env.state
        .users
        .update(claims.sub.parse().unwrap(), Some(false), None)
        .await
        .unwrap();
    let app = test_app!(env);

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
