use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;

use crate::docx::DocxPackage;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("template '{0}' not found")]
    NotFound(String),
    #[error("template '{0}' already exists")]
    AlreadyExists(String),
    #[error("invalid template id '{0}'")]
    InvalidId(String),
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("pack '{0}' not found")]
    PackNotFound(String),
    #[error("invalid manifest for pack '{pack}': {message}")]
    InvalidManifest { pack: String, message: String },
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One input field of a template form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    /// Front-end hints (`type`, `placeholder`, ...) kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldDefinition {
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Input schema stored next to a template body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldDefinition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TemplateSchema {
    /// Parse and validate schema JSON text.
    pub fn parse(text: &str) -> Result<Self, RegistryError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| RegistryError::InvalidSchema(format!("not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, RegistryError> {
        if !value.is_object() {
            return Err(RegistryError::InvalidSchema(
                "schema must be a JSON object".to_string(),
            ));
        }
        let schema: TemplateSchema = serde_json::from_value(value)
            .map_err(|e| RegistryError::InvalidSchema(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.fields.is_empty() {
            return Err(RegistryError::InvalidSchema(
                "'fields' must be a non-empty list".to_string(),
            ));
        }
        if let Some(pos) = self.fields.iter().position(|f| f.name.trim().is_empty()) {
            return Err(RegistryError::InvalidSchema(format!(
                "field #{} has no name",
                pos + 1
            )));
        }
        Ok(())
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.required)
    }
}

/// Per-template metadata file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMeta {
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Default for TemplateMeta {
    fn default() -> Self {
        Self {
            active: true,
            created_at: None,
            updated_at: None,
        }
    }
}

impl TemplateMeta {
    pub fn created(active: bool) -> Self {
        let now = Utc::now();
        Self {
            active,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// Listing entry for a template.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TemplateSummary {
    pub id: String,
    pub label: String,
    pub description: String,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TemplateSummary {
    pub fn new(id: &str, schema: &TemplateSchema, meta: &TemplateMeta) -> Self {
        Self {
            id: id.to_string(),
            label: schema.label.clone().unwrap_or_else(|| id.to_string()),
            description: schema.description.clone().unwrap_or_default(),
            active: meta.active,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        }
    }
}

/// Active entries first, then by label (case-insensitive), then id.
pub fn sort_summaries(summaries: &mut [TemplateSummary]) {
    summaries.sort_by(|a, b| {
        b.active
            .cmp(&a.active)
            .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[derive(Debug, Clone)]
pub struct NewTemplate {
    /// Raw id as supplied; normalised on create.
    pub id: String,
    pub schema: TemplateSchema,
    pub document: Vec<u8>,
    pub active: bool,
}

/// Partial update; `None` leaves the part untouched.
#[derive(Debug, Clone, Default)]
pub struct TemplateUpdate {
    pub schema: Option<TemplateSchema>,
    pub document: Option<Vec<u8>>,
    pub active: Option<bool>,
}

/// Make a caller-supplied id safe to use as a directory name.
///
/// Whitespace becomes `_`, `-` becomes `_`, anything outside
/// `[A-Za-z0-9_.]` is dropped and leading/trailing dots and underscores are
/// stripped.
pub fn normalize_template_id(raw: &str) -> Result<String, RegistryError> {
    let mut id = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_whitespace() || c == '-' {
            id.push('_');
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            id.push(c);
        }
    }
    let id = id.trim_matches(|c| c == '.' || c == '_');
    if id.is_empty() {
        return Err(RegistryError::InvalidId(raw.to_string()));
    }
    Ok(id.to_string())
}

/// Check that uploaded bytes are a readable word-processing package.
pub fn validate_document(bytes: &[u8]) -> Result<(), RegistryError> {
    DocxPackage::from_bytes(bytes)
        .map(|_| ())
        .map_err(|e| RegistryError::InvalidDocument(e.to_string()))
}
