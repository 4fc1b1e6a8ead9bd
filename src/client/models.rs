use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::{DocumentRecord, PackRecord};
use crate::documents::models::data_object;
use crate::error::ApiError;
use crate::generator::PackDocument;
use crate::mailer::{EmailOutcome, EmailRequest};
use crate::registry::TemplateSummary;
use crate::substitution::SubstitutionSummary;

#[derive(Debug, Serialize, ToSchema)]
pub struct FormsResponse {
    pub ok: bool,
    pub forms: Vec<TemplateSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FormResponse {
    pub ok: bool,
    pub id: String,
    pub label: String,
    pub description: String,
    /// Schema as stored, including front-end hints.
    #[schema(value_type = Object)]
    pub schema: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentsResponse {
    pub ok: bool,
    pub documents: Vec<DocumentRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientGenerateResponse {
    pub ok: bool,
    /// History entry id; absent when recording failed.
    pub document_id: Option<Uuid>,
    pub filename: String,
    pub download_url: String,
    pub summary: SubstitutionSummary,
    pub email: EmailOutcome,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GeneratePackRequest {
    #[serde(default, alias = "pack")]
    #[schema(example = "matricula")]
    pub pack_id: Option<String>,
    #[serde(default, alias = "datos")]
    #[schema(value_type = Object, example = json!({"NAME": "Ana"}))]
    pub data: Option<Value>,
    #[serde(default)]
    pub email: Option<EmailRequest>,
}

impl GeneratePackRequest {
    pub fn pack_id(&self) -> Result<&str, ApiError> {
        self.pack_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::Validation("pack_id is required".to_string()))
    }

    pub fn data_map(&self) -> Result<Map<String, Value>, ApiError> {
        data_object(self.data.as_ref())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratePackResponse {
    pub ok: bool,
    pub pack_id: String,
    pub zip_name: String,
    pub zip_download: String,
    pub created_at: DateTime<Utc>,
    pub documents: Vec<PackDocument>,
    pub email: EmailOutcome,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PacksResponse {
    pub ok: bool,
    pub packs: Vec<PackRecord>,
}
