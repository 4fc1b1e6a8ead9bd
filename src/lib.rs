use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod admin;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod documents;
pub mod docx;
pub mod error;
pub mod generator;
pub mod mailer;
pub mod registry;
pub mod storage;
pub mod substitution;

pub use crate::db::AppState;

use crate::config::{AppConfig, ServerConfig};
use crate::error::ApiError;

/// Upper bound for JSON request bodies.
const JSON_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::documents::handlers::health,
        crate::documents::handlers::list_templates,
        crate::documents::handlers::generate,
        crate::documents::handlers::download,
        crate::auth::handlers::login,
        crate::auth::handlers::me,
        crate::client::handlers::list_forms,
        crate::client::handlers::get_form,
        crate::client::handlers::list_documents,
        crate::client::handlers::generate,
        crate::client::handlers::generate_pack,
        crate::client::handlers::list_packs,
        crate::admin::handlers::list_templates,
        crate::admin::handlers::get_template,
        crate::admin::handlers::download_template,
        crate::admin::handlers::create_template,
        crate::admin::handlers::update_template,
        crate::admin::handlers::delete_template,
        crate::admin::handlers::list_users,
        crate::admin::handlers::create_user,
        crate::admin::handlers::update_user,
        crate::admin::handlers::list_documents,
        crate::admin::handlers::list_packs
    ),
    components(
        schemas(
            ErrorResponse,
            documents::models::HealthResponse,
            documents::models::TemplateListResponse,
            documents::models::GenerateRequest,
            documents::models::GenerateResponse,
            auth::model::LoginRequest,
            auth::model::LoginResponse,
            auth::model::MeResponse,
            auth::model::Role,
            auth::model::UserInfo,
            auth::model::CreateUserRequest,
            auth::model::CreateUserResponse,
            auth::model::UpdateUserRequest,
            client::models::FormsResponse,
            client::models::FormResponse,
            client::models::DocumentsResponse,
            client::models::ClientGenerateResponse,
            client::models::GeneratePackRequest,
            client::models::GeneratePackResponse,
            client::models::PacksResponse,
            admin::models::AdminTemplatesResponse,
            admin::models::AdminTemplateResponse,
            admin::models::TemplateWriteResponse,
            admin::models::UsersResponse,
            admin::models::UserResponse,
            admin::models::AdminDocumentsResponse,
            admin::models::AdminPacksResponse,
            mailer::EmailRequest,
            mailer::EmailOutcome,
            substitution::SubstitutionSummary,
            registry::TemplateSummary,
            registry::PackSummary,
            generator::PackDocument,
            db::DocumentRecord,
            db::PackRecord,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Documents", description = "Template listing, generation and downloads."),
        (name = "Authentication", description = "Login and token introspection."),
        (name = "Client", description = "Forms, generation and history for signed-in users."),
        (name = "Admin", description = "Template, account and history management (superadmin).")
    )
)]
pub struct ApiDoc;

/// Register every route plus the JSON body configuration.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_LIMIT)
            .error_handler(|err, _req| ApiError::Validation(err.to_string()).into()),
    )
    .configure(documents::config)
    .configure(auth::handlers::config)
    .configure(client::config)
    .configure(admin::config);
}

fn build_cors(server: &ServerConfig) -> Cors {
    if !server.cors_enabled {
        return Cors::default();
    }
    let origin = server.cors_allow_origin.trim();
    let cors = if origin.is_empty() || origin == "*" {
        Cors::default().allow_any_origin()
    } else {
        origin
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .fold(Cors::default(), |cors, o| cors.allowed_origin(o))
    };
    cors.allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
        ])
        .max_age(3600)
}

pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();
    let server = config.server.clone();
    log::info!(
        "Templates: {}, packs: {}, output: {}",
        config.storage.template_root.display(),
        config.storage.packs_root.display(),
        config.storage.output_root.display()
    );

    let app_state = web::Data::new(
        AppState::new(config)
            .await
            .context("Failed to initialise storage. Check DATABASE_URL and the storage roots")?,
    );

    let prometheus = PrometheusMetricsBuilder::new("zeon_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create Prometheus metrics middleware: {}", e))?;

    log::info!("Starting server at http://{}:{}", server.host, server.port);

    let cors_config = server.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .wrap(build_cors(&cors_config))
            .app_data(app_state.clone())
            .configure(routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((server.host.as_str(), server.port))?
    .run()
    .await?;

    Ok(())
}
