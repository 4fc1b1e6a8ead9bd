use actix_web::{web, HttpRequest, HttpResponse};

use super::models::{
    ClientGenerateResponse, DocumentsResponse, FormResponse, FormsResponse, GeneratePackRequest,
    GeneratePackResponse, PacksResponse,
};
use crate::auth::{authorize, Role};
use crate::db::{NewDocumentRecord, NewPackRecord};
use crate::documents::models::GenerateRequest;
use crate::error::ApiError;
use crate::generator::validation::validate_required;
use crate::registry::{RegistryError, TemplateSchema};
use crate::substitution::Replacements;
use crate::AppState;

/// Schema of an active template; inactive templates are reported as missing.
fn active_schema(state: &AppState, id: &str) -> Result<TemplateSchema, RegistryError> {
    let summary = state.templates.summary(id)?;
    if !summary.active {
        return Err(RegistryError::NotFound(id.to_string()));
    }
    state.templates.schema(id)
}

#[utoipa::path(
    get,
    path = "/client/forms",
    tag = "Client",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active templates", body = FormsResponse),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse)
    )
)]
pub async fn list_forms(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authorize(&req, &state, Role::User).await?;
    let templates = state.templates.clone();
    let forms = web::block(move || templates.list(true))
        .await
        .map_err(|e| ApiError::internal("Failed to list forms", e))??;
    Ok(HttpResponse::Ok().json(FormsResponse { ok: true, forms }))
}

#[utoipa::path(
    get,
    path = "/client/forms/{id}",
    tag = "Client",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Template id")),
    responses(
        (status = 200, description = "Form schema", body = FormResponse),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse),
        (status = 404, description = "Form not found or inactive", body = crate::ErrorResponse)
    )
)]
pub async fn get_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    authorize(&req, &state, Role::User).await?;
    let id = path.into_inner();

    let schema = {
        let state = state.clone();
        let id = id.clone();
        web::block(move || active_schema(&state, &id))
            .await
            .map_err(|e| ApiError::internal("Failed to load form", e))??
    };

    Ok(HttpResponse::Ok().json(FormResponse {
        ok: true,
        label: schema.label.clone().unwrap_or_else(|| id.clone()),
        description: schema.description.clone().unwrap_or_default(),
        schema: serde_json::to_value(&schema)
            .map_err(|e| ApiError::internal("Failed to encode schema", e))?,
        id,
    }))
}

#[utoipa::path(
    get,
    path = "/client/documents",
    tag = "Client",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own documents, newest first", body = DocumentsResponse),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse)
    )
)]
pub async fn list_documents(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = authorize(&req, &state, Role::User).await?;
    let documents = state.audit.documents_for_user(user.id).await?;
    Ok(HttpResponse::Ok().json(DocumentsResponse { ok: true, documents }))
}

#[utoipa::path(
    post,
    path = "/client/generate",
    tag = "Client",
    security(("bearer_auth" = [])),
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Document generated and recorded", body = ClientGenerateResponse),
        (status = 400, description = "Missing required fields", body = crate::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse),
        (status = 404, description = "Template not found or inactive", body = crate::ErrorResponse)
    )
)]
pub async fn generate(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<GenerateRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = authorize(&req, &state, Role::User).await?;
    let request = body.into_inner();
    let template_id = request.template_id()?.to_string();
    let data = request.data_map()?;

    let schema = {
        let state = state.clone();
        let id = template_id.clone();
        web::block(move || active_schema(&state, &id))
            .await
            .map_err(|e| ApiError::internal("Failed to load form", e))??
    };
    let errors = validate_required(&schema, &data);
    if !errors.is_empty() {
        log::info!(
            "Rejected '{}' for {}: missing {:?}",
            template_id,
            user.email,
            errors.fields()
        );
        return Err(errors.into());
    }

    let replacements = Replacements::from_json(&data);
    let documents = state.documents.clone();
    let prefix = request.output_prefix.clone();
    let id = template_id.clone();
    let document = web::block(move || documents.generate(&id, &replacements, prefix.as_deref()))
        .await
        .map_err(|e| ApiError::internal("Document generation failed", e))??;

    let email = state
        .mailer
        .deliver(request.email.as_ref(), None, &document.path, &document.filename)
        .await;

    let document_id = match state
        .audit
        .record_document(NewDocumentRecord {
            user_id: user.id,
            template_type: template_id.clone(),
            filename: document.filename.clone(),
            storage_path: document.path.display().to_string(),
            email_sent: email.sent,
            email_error: email.error.clone(),
        })
        .await
    {
        Ok(record) => Some(record.id),
        Err(e) => {
            log::error!("Failed to record document '{}': {}", document.filename, e);
            None
        }
    };

    Ok(HttpResponse::Ok().json(ClientGenerateResponse {
        ok: true,
        document_id,
        filename: document.filename,
        download_url: document.download_url,
        summary: document.summary,
        email,
    }))
}

#[utoipa::path(
    post,
    path = "/client/generate-pack",
    tag = "Client",
    security(("bearer_auth" = [])),
    request_body = GeneratePackRequest,
    responses(
        (status = 200, description = "Pack archive generated and recorded", body = GeneratePackResponse),
        (status = 400, description = "Invalid request", body = crate::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse),
        (status = 404, description = "Pack or pack template not found", body = crate::ErrorResponse),
        (status = 500, description = "Pack generation failed", body = crate::ErrorResponse)
    )
)]
pub async fn generate_pack(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<GeneratePackRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = authorize(&req, &state, Role::User).await?;
    let request = body.into_inner();
    let pack_id = request.pack_id()?.to_string();
    let replacements = Replacements::from_json(&request.data_map()?);

    let packs = state.packs.clone();
    let id = pack_id.clone();
    let artifact = web::block(move || packs.generate_pack(&id, &replacements))
        .await
        .map_err(|e| ApiError::internal("Pack generation failed", e))??;

    let email = state
        .mailer
        .deliver(
            request.email.as_ref(),
            state.config.pack_notify_to.as_deref(),
            &artifact.zip_path,
            &artifact.zip_name,
        )
        .await;

    if let Err(e) = state
        .audit
        .record_pack(NewPackRecord {
            user_id: user.id,
            pack_id: pack_id.clone(),
            zip_name: artifact.zip_name.clone(),
            zip_path: artifact.zip_path.display().to_string(),
            email_sent: email.sent,
            email_error: email.error.clone(),
        })
        .await
    {
        log::error!("Failed to record pack '{}': {}", artifact.zip_name, e);
    }

    Ok(HttpResponse::Ok().json(GeneratePackResponse {
        ok: true,
        pack_id,
        zip_name: artifact.zip_name,
        zip_download: artifact.download_url,
        created_at: artifact.created_at,
        documents: artifact.documents,
        email,
    }))
}

#[utoipa::path(
    get,
    path = "/client/packs",
    tag = "Client",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own pack archives, newest first", body = PacksResponse),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse)
    )
)]
pub async fn list_packs(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = authorize(&req, &state, Role::User).await?;
    let packs = state.audit.packs_for_user(user.id).await?;
    Ok(HttpResponse::Ok().json(PacksResponse { ok: true, packs }))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/client")
            .route("/forms", web::get().to(list_forms))
            .route("/forms/{id}", web::get().to(get_form))
            .route("/documents", web::get().to(list_documents))
            .route("/generate", web::post().to(generate))
            .route("/generate-pack", web::post().to(generate_pack))
            .route("/packs", web::get().to(list_packs)),
    );
}
