#[macro_use]
mod common;

use std::io::{Cursor, Read};

use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{json, Value};
use zip::ZipArchive;

use common::{bearer, docx_text, paragraph, TestEnv};
use zeon_server::auth::Role;

#[actix_web::test]
async fn test_client_routes_require_token() {
    let env = TestEnv::new();
    let app = test_app!(env);

    for uri in ["/client/forms", "/client/documents", "/client/packs"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[actix_web::test]
async fn test_forms_hide_inactive_templates() {
    let env = TestEnv::new();
    env.add_demo_template();
    env.add_template("archivada", json!({"fields": []}), &paragraph("old"), false);
    let token = env.token_for("ana@example.com", Role::User).await;
    let app = test_app!(env);

    let req = test::TestRequest::get()
        .uri("/client/forms")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let forms = body["forms"].as_array().unwrap();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0]["id"], "demo");
    assert_eq!(forms[0]["label"], "Demo");

    let req = test::TestRequest::get()
        .uri("/client/forms/demo")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["id"], "demo");
    assert_eq!(body["schema"]["fields"][0]["label"], "Nombre");

    let req = test::TestRequest::get()
        .uri("/client/forms/archivada")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_generate_enforces_required_fields() {
    let env = TestEnv::new();
    env.add_demo_template();
    let token = env.token_for("ana@example.com", Role::User).await;
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri("/client/generate")
        .insert_header(bearer(&token))
        .set_json(json!({"template_type": "demo", "data": {"NAME": "  ", "DNI": "1"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("Nombre"));

    assert!(env.output_files().is_empty());
}

#[actix_web::test]
async fn test_generate_records_history_per_user() {
    let env = TestEnv::new();
    env.add_demo_template();
    let ana = env.token_for("ana@example.com", Role::User).await;
    let luis = env.token_for("luis@example.com", Role::User).await;
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri("/client/generate")
        .insert_header(bearer(&ana))
        .set_json(json!({"tipo": "demo", "datos": {"NAME": "Ana", "DNI": "123"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let generated: Value = test::read_body_json(resp).await;
    assert!(generated["document_id"].is_string());
    assert!(generated["filename"].as_str().unwrap().starts_with("demo_"));
    assert_eq!(generated["summary"]["missing_keys"], json!([]));

    let req = test::TestRequest::get()
        .uri("/client/documents")
        .insert_header(bearer(&ana))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let documents = body["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["id"], generated["document_id"]);
    assert_eq!(documents[0]["template_type"], "demo");
    assert_eq!(documents[0]["filename"], generated["filename"]);
    assert_eq!(documents[0]["email_sent"], false);
    assert!(documents[0].get("storage_path").is_none());

    let req = test::TestRequest::get()
        .uri("/client/documents")
        .insert_header(bearer(&luis))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["documents"], json!([]));
}

#[actix_web::test]
async fn test_generate_pack_builds_archive() {
    let env = TestEnv::new();
    env.add_pack(
        "alta",
        &[
            ("solicitud.docx", "01_solicitud.docx", "Solicitud de ${NAME}"),
            ("declaracion.docx", "02_declaracion.docx", "Declaro ${NAME} ${DNI}"),
        ],
    );
    let token = env.token_for("ana@example.com", Role::User).await;
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri("/client/generate-pack")
        .insert_header(bearer(&token))
        .set_json(json!({"pack": "alta", "datos": {"NAME": "Ana"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;

    assert_eq!(body["pack_id"], "alta");
    let zip_name = body["zip_name"].as_str().unwrap();
    assert!(zip_name.starts_with("alta_") && zip_name.ends_with(".zip"));
    assert_eq!(body["zip_download"], format!("/download/{}", zip_name));
    assert_eq!(body["documents"][1]["output"], "02_declaracion.docx");
    assert_eq!(body["documents"][1]["summary"]["missing_keys"], json!(["${DNI}"]));
    assert_eq!(body["email"]["sent"], false);

    let req = test::TestRequest::get()
        .uri(&format!("/download/{}", zip_name))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = test::read_body(resp).await;

    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 2);
    let mut first = Vec::new();
    archive
        .by_name("01_solicitud.docx")
        .unwrap()
        .read_to_end(&mut first)
        .unwrap();
    assert_eq!(docx_text(&first), "Solicitud de Ana");

    let req = test::TestRequest::get()
        .uri("/client/packs")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let packs = body["packs"].as_array().unwrap();
    assert_eq!(packs.len(), 1);
    assert_eq!(packs[0]["zip_name"], zip_name);
    assert!(packs[0].get("zip_path").is_none());
}

#[actix_web::test]
async fn test_generate_pack_unknown_or_missing_id() {
    let env = TestEnv::new();
    let token = env.token_for("ana@example.com", Role::User).await;
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri("/client/generate-pack")
        .insert_header(bearer(&token))
        .set_json(json!({"pack_id": "nope", "data": {}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/client/generate-pack")
        .insert_header(bearer(&token))
        .set_json(json!({"data": {}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/client/packs")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["packs"], json!([]));
}

#[actix_web::test]
async fn test_pack_email_falls_back_to_notify_address() {
    let env = TestEnv::with_config(|config| {
        config.pack_notify_to = Some("oficina@example.com".to_string());
    });
    env.add_pack("alta", &[("a.docx", "a.docx", "${NAME}")]);
    let token = env.token_for("ana@example.com", Role::User).await;
    let app = test_app!(env);

    let req = test::TestRequest::post()
        .uri("/client/generate-pack")
        .insert_header(bearer(&token))
        .set_json(json!({"pack_id": "alta", "data": {"NAME": "Ana"}}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["email"]["sent"], false);
    assert_eq!(body["email"]["to"], "oficina@example.com");
    assert!(body["email"]["error"].is_string());
}
