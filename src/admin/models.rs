use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::UserInfo;
use crate::db::DocumentRecord;
use crate::registry::{PackSummary, TemplateSummary};

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminTemplatesResponse {
    pub ok: bool,
    pub templates: Vec<TemplateSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminTemplateResponse {
    pub ok: bool,
    pub id: String,
    pub active: bool,
    #[schema(value_type = Object)]
    pub schema: Value,
}

/// Result of a template create, update or delete.
#[derive(Debug, Serialize, ToSchema)]
pub struct TemplateWriteResponse {
    pub ok: bool,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_docx: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsersResponse {
    pub ok: bool,
    pub users: Vec<UserInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub ok: bool,
    pub user: UserInfo,
}

/// A document with the email of the account that generated it.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminDocumentEntry {
    #[serde(flatten)]
    pub document: DocumentRecord,
    pub user_email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminDocumentsResponse {
    pub ok: bool,
    pub documents: Vec<AdminDocumentEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminPacksResponse {
    pub ok: bool,
    pub packs: Vec<PackSummary>,
}

/// Owner lookup for the admin document listing.
pub fn owner_emails(users: &[UserInfo]) -> std::collections::HashMap<Uuid, String> {
    users.iter().map(|u| (u.id, u.email.clone())).collect()
}
