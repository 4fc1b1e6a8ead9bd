//! Shared fixtures for the HTTP tests: temp storage roots, in-memory state,
//! `.docx` bodies built on the fly and signed-in accounts.
#![allow(dead_code, unused_macros)]

use std::fs;
use std::io::{Cursor, Write};

use actix_web::web;
use serde_json::{json, Value};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use zeon_server::auth::accounts::create_account;
use zeon_server::auth::Role;
use zeon_server::config::AppConfig;
use zeon_server::docx::DocxPackage;
use zeon_server::registry::{NewTemplate, TemplateSchema};
use zeon_server::AppState;

/// Build the app under test from a [`TestEnv`].
macro_rules! test_app {
    ($env:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($env.state.clone())
                .configure(zeon_server::routes),
        )
        .await
    };
}

pub const PASSWORD: &str = "secret123";

/// Minimal word-processing package whose body is `body_xml`.
pub fn build_docx(body_xml: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body_xml
    );
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(br#"<?xml version="1.0"?><Types/>"#).unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn paragraph(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text)
}

/// Paragraph texts of a package, one per line.
pub fn docx_text(bytes: &[u8]) -> String {
    DocxPackage::from_bytes(bytes).unwrap().plain_text().unwrap()
}

pub struct TestEnv {
    pub dir: TempDir,
    pub state: web::Data<AppState>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_root(dir.path());
        adjust(&mut config);
        let state = AppState::without_database(config);
        state.output.ensure_dirs().unwrap();
        Self {
            dir,
            state: web::Data::new(state),
        }
    }

    pub fn add_template(&self, id: &str, schema: Value, body_xml: &str, active: bool) {
        self.state
            .templates
            .create(NewTemplate {
                id: id.to_string(),
                schema: TemplateSchema::from_value(schema).unwrap(),
                document: build_docx(body_xml),
                active,
            })
            .unwrap();
    }

    /// The `demo` template: `Hello ${NAME}, DNI ${DNI}` with NAME required.
    pub fn add_demo_template(&self) {
        self.add_template(
            "demo",
            json!({
                "label": "Demo",
                "fields": [
                    {"name": "NAME", "label": "Nombre", "required": true},
                    {"name": "DNI"}
                ]
            }),
            &paragraph("Hello ${NAME}, DNI ${DNI}"),
            true,
        );
    }

    /// Write a pack directory: `(template file, output name, body text)`.
    pub fn add_pack(&self, pack_id: &str, docs: &[(&str, &str, &str)]) {
        let dir = self.state.config.storage.packs_root.join(pack_id);
        fs::create_dir_all(&dir).unwrap();
        let mut entries = Vec::new();
        for (template, output, text) in docs {
            fs::write(dir.join(template), build_docx(&paragraph(text))).unwrap();
            entries.push(json!({"template": template, "output": output}));
        }
        let manifest = json!({"label": pack_id, "docs": entries});
        fs::write(dir.join("pack.json"), serde_json::to_vec(&manifest).unwrap()).unwrap();
    }

    /// Create an account and return a bearer token for it.
    pub async fn token_for(&self, email: &str, role: Role) -> String {
        let user = create_account(
            self.state.users.as_ref(),
            &self.state.passwords,
            email,
            PASSWORD,
            role,
        )
        .await
        .unwrap();
        self.state.tokens.issue(&user).unwrap()
    }

    pub fn output_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.state.output.documents_dir())
            .unwrap()
            .flatten()
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}
