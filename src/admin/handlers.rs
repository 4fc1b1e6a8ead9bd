use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;

use super::models::{
    owner_emails, AdminDocumentEntry, AdminDocumentsResponse, AdminPacksResponse,
    AdminTemplateResponse, AdminTemplatesResponse, TemplateWriteResponse, UserResponse,
    UsersResponse,
};
use super::multipart_parser::MultipartParser;
use crate::auth::accounts::create_account;
use crate::auth::{authorize, CreateUserRequest, CreateUserResponse, Role, UpdateUserRequest, UserInfo};
use crate::docx::DOCX_MIME;
use crate::error::ApiError;
use crate::registry::{NewTemplate, RegistryError, TemplateUpdate};
use crate::AppState;

fn parse_role(raw: &str) -> Result<Role, ApiError> {
    raw.parse::<Role>().map_err(ApiError::Validation)
}

#[utoipa::path(
    get,
    path = "/admin/templates",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All templates, active first", body = AdminTemplatesResponse),
        (status = 401, description = "Unauthorized", body = crate::ErrorResponse),
        (status = 403, description = "Superadmin role required", body = crate::ErrorResponse)
    )
)]
pub async fn list_templates(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authorize(&req, &state, Role::Superadmin).await?;
    let templates = state.templates.clone();
    let templates = web::block(move || templates.list(false))
        .await
        .map_err(|e| ApiError::internal("Failed to list templates", e))??;
    Ok(HttpResponse::Ok().json(AdminTemplatesResponse { ok: true, templates }))
}

#[utoipa::path(
    get,
    path = "/admin/templates/{id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Template id")),
    responses(
        (status = 200, description = "Template schema", body = AdminTemplateResponse),
        (status = 403, description = "Superadmin role required", body = crate::ErrorResponse),
        (status = 404, description = "Template not found", body = crate::ErrorResponse)
    )
)]
pub async fn get_template(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    authorize(&req, &state, Role::Superadmin).await?;
    let id = path.into_inner();
    let templates = state.templates.clone();
    let lookup_id = id.clone();
    let (summary, schema) = web::block(move || {
        let summary = templates.summary(&lookup_id)?;
        let schema = templates.schema(&lookup_id)?;
        Ok::<_, RegistryError>((summary, schema))
    })
    .await
    .map_err(|e| ApiError::internal("Failed to load template", e))??;

    Ok(HttpResponse::Ok().json(AdminTemplateResponse {
        ok: true,
        id,
        active: summary.active,
        schema: serde_json::to_value(&schema)
            .map_err(|e| ApiError::internal("Failed to encode schema", e))?,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/templates/{id}/docx",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Template id")),
    responses(
        (status = 200, description = "Template document body"),
        (status = 403, description = "Superadmin role required", body = crate::ErrorResponse),
        (status = 404, description = "Template not found", body = crate::ErrorResponse)
    )
)]
pub async fn download_template(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    authorize(&req, &state, Role::Superadmin).await?;
    let id = path.into_inner();
    let templates = state.templates.clone();
    let lookup_id = id.clone();
    let body = web::block(move || templates.document(&lookup_id))
        .await
        .map_err(|e| ApiError::internal("Failed to load template", e))??;

    Ok(HttpResponse::Ok()
        .content_type(DOCX_MIME)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(format!("{}.docx", id))],
        })
        .body(body))
}

#[utoipa::path(
    post,
    path = "/admin/templates",
    tag = "Admin",
    security(("bearer_auth" = [])),
    request_body(content_type = "multipart/form-data", description = "template_id, schema_json, docx, active"),
    responses(
        (status = 201, description = "Template created", body = TemplateWriteResponse),
        (status = 400, description = "Invalid upload", body = crate::ErrorResponse),
        (status = 403, description = "Superadmin role required", body = crate::ErrorResponse),
        (status = 409, description = "Template id already exists", body = crate::ErrorResponse)
    )
)]
pub async fn create_template(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let user = authorize(&req, &state, Role::Superadmin).await?;
    let upload = MultipartParser::parse_template_upload(payload).await?;

    let id = upload
        .template_id
        .ok_or_else(|| ApiError::Validation("template_id is required".to_string()))?;
    let schema = upload
        .schema
        .ok_or_else(|| ApiError::Validation("schema_json is required".to_string()))?;
    let (document, _) = upload
        .docx
        .ok_or_else(|| ApiError::Validation("docx file is required".to_string()))?;

    let templates = state.templates.clone();
    let summary = web::block(move || {
        templates.create(NewTemplate {
            id,
            schema,
            document,
            active: upload.active.unwrap_or(true),
        })
    })
    .await
    .map_err(|e| ApiError::internal("Failed to create template", e))??;

    log::info!("Template '{}' created by {}", summary.id, user.email);
    Ok(HttpResponse::Created().json(TemplateWriteResponse {
        ok: true,
        id: summary.id,
        has_docx: None,
        active: None,
    }))
}

#[utoipa::path(
    put,
    path = "/admin/templates/{id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Template id")),
    request_body(content_type = "multipart/form-data", description = "Any of schema_json, docx, active"),
    responses(
        (status = 200, description = "Template updated", body = TemplateWriteResponse),
        (status = 400, description = "Invalid upload", body = crate::ErrorResponse),
        (status = 403, description = "Superadmin role required", body = crate::ErrorResponse),
        (status = 404, description = "Template not found", body = crate::ErrorResponse)
    )
)]
pub async fn update_template(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let user = authorize(&req, &state, Role::Superadmin).await?;
    let id = path.into_inner();
    let upload = MultipartParser::parse_template_upload(payload).await?;
    let has_docx = upload.docx.is_some();

    let templates = state.templates.clone();
    let summary = web::block(move || {
        templates.update(
            &id,
            TemplateUpdate {
                schema: upload.schema,
                document: upload.docx.map(|(bytes, _)| bytes),
                active: upload.active,
            },
        )
    })
    .await
    .map_err(|e| ApiError::internal("Failed to update template", e))??;

    log::info!("Template '{}' updated by {}", summary.id, user.email);
    Ok(HttpResponse::Ok().json(TemplateWriteResponse {
        ok: true,
        id: summary.id,
        has_docx: Some(has_docx),
        active: None,
    }))
}

#[utoipa::path(
    delete,
    path = "/admin/templates/{id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Template id")),
    responses(
        (status = 200, description = "Template deactivated", body = TemplateWriteResponse),
        (status = 403, description = "Superadmin role required", body = crate::ErrorResponse),
        (status = 404, description = "Template not found", body = crate::ErrorResponse)
    )
)]
pub async fn delete_template(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user = authorize(&req, &state, Role::Superadmin).await?;
    let id = path.into_inner();
    let templates = state.templates.clone();
    let summary = web::block(move || templates.deactivate(&id))
        .await
        .map_err(|e| ApiError::internal("Failed to deactivate template", e))??;

    log::info!("Template '{}' deactivated by {}", summary.id, user.email);
    Ok(HttpResponse::Ok().json(TemplateWriteResponse {
        ok: true,
        id: summary.id,
        has_docx: None,
        active: Some(false),
    }))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Accounts, newest first", body = UsersResponse),
        (status = 403, description = "Superadmin role required", body = crate::ErrorResponse)
    )
)]
pub async fn list_users(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authorize(&req, &state, Role::Superadmin).await?;
    let users = state.users.list().await?;
    Ok(HttpResponse::Ok().json(UsersResponse {
        ok: true,
        users: users.iter().map(UserInfo::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "Admin",
    security(("bearer_auth" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = CreateUserResponse),
        (status = 400, description = "Invalid email, role or password", body = crate::ErrorResponse),
        (status = 403, description = "Superadmin role required", body = crate::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::ErrorResponse)
    )
)]
pub async fn create_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = authorize(&req, &state, Role::Superadmin).await?;
    let role = match body.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => parse_role(raw)?,
        None => Role::User,
    };

    let user = create_account(state.users.as_ref(), &state.passwords, &body.email, &body.password, role).await?;

    log::info!("User {} ({}) created by {}", user.email, user.role, actor.email);
    Ok(HttpResponse::Created().json(CreateUserResponse {
        ok: true,
        user_id: user.id,
        user: UserInfo::from(&user),
    }))
}

#[utoipa::path(
    patch,
    path = "/admin/users/{id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = UserResponse),
        (status = 400, description = "Invalid update", body = crate::ErrorResponse),
        (status = 403, description = "Superadmin role required", body = crate::ErrorResponse),
        (status = 404, description = "Account not found", body = crate::ErrorResponse)
    )
)]
pub async fn update_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = authorize(&req, &state, Role::Superadmin).await?;
    let user_id = path.into_inner();

    let role = match body.role.as_deref() {
        Some(raw) => Some(parse_role(raw)?),
        None => None,
    };
    if body.active.is_none() && role.is_none() {
        return Err(ApiError::Validation("Nothing to update: set active and/or role".to_string()));
    }
    if user_id == actor.id
        && (body.active == Some(false) || role.is_some_and(|r| r != Role::Superadmin))
    {
        return Err(ApiError::Validation(
            "Cannot deactivate or demote your own account".to_string(),
        ));
    }

    let user = state.users.update(user_id, body.active, role).await?;
    log::info!(
        "User {} updated by {} (active={}, role={})",
        user.email,
        actor.email,
        user.active,
        user.role
    );
    Ok(HttpResponse::Ok().json(UserResponse {
        ok: true,
        user: UserInfo::from(&user),
    }))
}

#[utoipa::path(
    get,
    path = "/admin/documents",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Every generated document, newest first", body = AdminDocumentsResponse),
        (status = 403, description = "Superadmin role required", body = crate::ErrorResponse)
    )
)]
pub async fn list_documents(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authorize(&req, &state, Role::Superadmin).await?;
    let users: Vec<UserInfo> = state.users.list().await?.iter().map(UserInfo::from).collect();
    let owners = owner_emails(&users);
    let documents = state
        .audit
        .all_documents()
        .await?
        .into_iter()
        .map(|document| AdminDocumentEntry {
            user_email: owners.get(&document.user_id).cloned(),
            document,
        })
        .collect();
    Ok(HttpResponse::Ok().json(AdminDocumentsResponse { ok: true, documents }))
}

#[utoipa::path(
    get,
    path = "/admin/packs",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Valid pack definitions", body = AdminPacksResponse),
        (status = 403, description = "Superadmin role required", body = crate::ErrorResponse)
    )
)]
pub async fn list_packs(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authorize(&req, &state, Role::Superadmin).await?;
    let packs = state.packs.clone();
    let packs = web::block(move || packs.library().list())
        .await
        .map_err(|e| ApiError::internal("Failed to list packs", e))??;
    Ok(HttpResponse::Ok().json(AdminPacksResponse { ok: true, packs }))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(
                web::resource("/templates")
                    .route(web::get().to(list_templates))
                    .route(web::post().to(create_template)),
            )
            .service(
                web::resource("/templates/{id}")
                    .route(web::get().to(get_template))
                    .route(web::put().to(update_template))
                    .route(web::delete().to(delete_template)),
            )
            .route("/templates/{id}/docx", web::get().to(download_template))
            .service(
                web::resource("/users")
                    .route(web::get().to(list_users))
                    .route(web::post().to(create_user)),
            )
            .route("/users/{id}", web::patch().to(update_user))
            .route("/documents", web::get().to(list_documents))
            .route("/packs", web::get().to(list_packs)),
    );
}
