#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{json, Value};

use common::{docx_text, TestEnv};

#[actix_web::test]
async fn test_health_reports_configuration() {
    let env = TestEnv::new();
    let app = test_app!(env);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "zeon");
    assert_eq!(body["smtp_enabled"], false);
    assert!(body["output_root"].as_str().unwrap().ends_with("outputs"));
}

#[actix_web::test]
async fn test_templates_lists_ids() {
    let env = TestEnv::new();
    env.add_demo_template();
    env.add_template(
        "carta",
        json!({"fields": [{"name": "X"}]}),
        &common::paragraph("${X}"),
        false,
    );
    let app = test_app!(env);

    let req = test::TestRequest::get().uri("/templates").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["ok"], true);
    assert_eq!(body["templates"], json!(["carta", "demo"]));
}

#[actix_web::test]
async fn test_generate_fills_demo_template() {
    let env = TestEnv::new();
    env.add_demo_template();
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri("/generate")
        .set_json(json!({"template_type": "demo", "data": {"NAME": "Ana"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;

    assert_eq!(body["ok"], true);
    assert_eq!(body["summary"]["replaced_count"], 1);
    assert_eq!(body["summary"]["replaced_keys"], json!(["${NAME}"]));
    assert_eq!(body["summary"]["missing_keys"], json!(["${DNI}"]));
    assert_eq!(body["email"]["sent"], false);

    let filename = body["filename"].as_str().unwrap();
    assert!(filename.starts_with("documento_"));
    assert!(filename.ends_with(".docx"));
    assert_eq!(body["download_url"], format!("/download/{}", filename));

    let req = test::TestRequest::get()
        .uri(&format!("/download/{}", filename))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = test::read_body(resp).await;
    assert_eq!(docx_text(&bytes), "Hello Ana, DNI ${DNI}");
}

#[actix_web::test]
async fn test_generate_accepts_spanish_aliases_and_prefix() {
    let env = TestEnv::new();
    env.add_demo_template();
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri("/generate")
        .set_json(json!({
            "tipo": "demo",
            "datos": {"${NAME}": "Luis", "DNI": 12345678},
            "prefix": "Carta de Luis"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert!(body["filename"].as_str().unwrap().starts_with("Carta_de_Luis_"));
    assert_eq!(body["summary"]["replaced_count"], 2);
    assert_eq!(body["summary"]["missing_keys"], json!([]));
}

#[actix_web::test]
async fn test_generate_unknown_template_writes_nothing() {
    let env = TestEnv::new();
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri("/generate")
        .set_json(json!({"template_type": "missing", "data": {}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "NotFound");
    assert!(body["timestamp"].is_string());

    assert!(env.output_files().is_empty());
}

#[actix_web::test]
async fn test_generate_rejects_bad_requests() {
    let env = TestEnv::new();
    env.add_demo_template();
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri("/generate")
        .set_json(json!({"data": {"NAME": "Ana"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/generate")
        .set_json(json!({"template_type": "demo", "data": ["not", "an", "object"]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/generate")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "BadRequest");
}

#[actix_web::test]
async fn test_generate_email_failure_is_reported_not_fatal() {
    let env = TestEnv::new();
    env.add_demo_template();
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri("/generate")
        .set_json(json!({
            "template_type": "demo",
            "data": {"NAME": "Ana"},
            "email": {"to": "ana@example.com"}
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;

    assert_eq!(body["ok"], true);
    assert_eq!(body["email"]["sent"], false);
    assert_eq!(body["email"]["to"], "ana@example.com");
    assert!(body["email"]["error"].as_str().unwrap().contains("disabled"));
}

#[actix_web::test]
async fn test_download_rejects_unknown_and_traversal() {
    let env = TestEnv::new();
    let app = test_app!(env);

    for uri in ["/download/nope.docx", "/download/..%2F..%2Fetc%2Fpasswd"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}
