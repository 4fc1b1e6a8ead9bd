use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};

use super::models::{
    GenerateRequest, GenerateResponse, HealthResponse, TemplateListResponse, SERVICE_NAME,
};
use crate::error::ApiError;
use crate::substitution::Replacements;
use crate::AppState;

/// Filename prefix for public generations that do not name one.
const DEFAULT_PREFIX: &str = "documento";

/// Sweep the output area without holding up an async worker.
pub(crate) async fn run_cleanup(state: &AppState) {
    let output = state.output.clone();
    match web::block(move || output.cleanup()).await {
        Ok(removed) if removed > 0 => log::info!("Output cleanup removed {} files", removed),
        Ok(_) => {}
        Err(e) => log::debug!("Output cleanup did not run: {}", e),
    }
}

/// Attachment response for a stored file.
pub(crate) async fn attachment(path: std::path::PathBuf, filename: &str) -> Result<NamedFile, ApiError> {
    let file = NamedFile::open_async(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ApiError::NotFound(format!("File '{}' not found", filename)),
        _ => ApiError::internal("Failed to open file", e),
    })?;
    Ok(file.set_content_disposition(ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(filename.to_string())],
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Documents",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    )
)]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    run_cleanup(&state).await;
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: SERVICE_NAME.to_string(),
        template_root: state.config.storage.template_root.display().to_string(),
        output_root: state.config.storage.output_root.display().to_string(),
        smtp_enabled: state.mailer.is_enabled(),
    })
}

#[utoipa::path(
    get,
    path = "/templates",
    tag = "Documents",
    responses(
        (status = 200, description = "Template ids", body = TemplateListResponse),
        (status = 500, description = "Template storage unreadable", body = crate::ErrorResponse)
    )
)]
pub async fn list_templates(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let templates = state.templates.clone();
    let ids = web::block(move || templates.ids())
        .await
        .map_err(|e| ApiError::internal("Failed to list templates", e))??;
    Ok(HttpResponse::Ok().json(TemplateListResponse {
        ok: true,
        templates: ids,
    }))
}

#[utoipa::path(
    post,
    path = "/generate",
    tag = "Documents",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Document generated", body = GenerateResponse),
        (status = 400, description = "Invalid request", body = crate::ErrorResponse),
        (status = 404, description = "Template not found", body = crate::ErrorResponse),
        (status = 500, description = "Generation failed", body = crate::ErrorResponse)
    )
)]
pub async fn generate(
    state: web::Data<AppState>,
    body: web::Json<GenerateRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    let template_id = request.template_id()?.to_string();
    let replacements = Replacements::from_json(&request.data_map()?);

    run_cleanup(&state).await;

    let documents = state.documents.clone();
    let prefix = request
        .output_prefix
        .clone()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
    let id = template_id.clone();
    let document = web::block(move || documents.generate(&id, &replacements, Some(&prefix)))
        .await
        .map_err(|e| ApiError::internal("Document generation failed", e))??;

    let email = state
        .mailer
        .deliver(request.email.as_ref(), None, &document.path, &document.filename)
        .await;

    Ok(HttpResponse::Ok().json(GenerateResponse {
        ok: true,
        filename: document.filename,
        download_url: document.download_url,
        summary: document.summary,
        email,
    }))
}

#[utoipa::path(
    get,
    path = "/download/{filename}",
    tag = "Documents",
    params(("filename" = String, Path, description = "Generated document or archive name")),
    responses(
        (status = 200, description = "File content"),
        (status = 404, description = "File not found", body = crate::ErrorResponse)
    )
)]
pub async fn download(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<NamedFile, ApiError> {
    let filename = path.into_inner();
    let file_path = state.output.resolve_download(&filename).ok_or_else(|| {
        log::warn!("Download requested for unknown file '{}'", filename);
        ApiError::NotFound(format!("File '{}' not found", filename))
    })?;
    attachment(file_path, &filename).await
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/templates", web::get().to(list_templates))
        .route("/generate", web::post().to(generate))
        .route("/download/{filename}", web::get().to(download));
}
