use actix_multipart::{Field, Multipart};
use futures_util::StreamExt;
use sanitize_filename::sanitize;

use crate::config::parse_bool;
use crate::error::ApiError;
use crate::registry::TemplateSchema;

/// Upper bound for an uploaded template body.
pub const MAX_DOCX_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum MultipartParseError {
    #[error("Multipart field error: {0}")]
    FieldError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid UTF-8 data: {0}")]
    Utf8Error(String),
    #[error("Invalid schema_json: {0}")]
    SchemaError(String),
    #[error("Template document must be a .docx file, got '{0}'")]
    NotDocx(String),
    #[error("Upload exceeds the 20 MiB limit")]
    TooLarge,
}

impl From<MultipartParseError> for ApiError {
    fn from(error: MultipartParseError) -> Self {
        match error {
            MultipartParseError::IoError(_) => ApiError::internal("Failed to read upload", error),
            _ => ApiError::Validation(error.to_string()),
        }
    }
}

/// Template upload fields; each is optional so the same parser serves
/// create and update.
#[derive(Debug, Default)]
pub struct TemplateUpload {
    pub template_id: Option<String>,
    pub schema: Option<TemplateSchema>,
    pub docx: Option<(Vec<u8>, String)>,
    pub active: Option<bool>,
}

pub struct MultipartParser;

impl MultipartParser {
    pub async fn parse_template_upload(
        mut multipart: Multipart,
    ) -> Result<TemplateUpload, MultipartParseError> {
        let mut upload = TemplateUpload::default();

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let content_disposition = field
                .content_disposition()
                .ok_or_else(|| MultipartParseError::FieldError("Content disposition not found".to_string()))?;
            let name = content_disposition
                .get_name()
                .ok_or_else(|| MultipartParseError::FieldError("Field name not found".to_string()))?
                .to_string();
            let maybe_filename = content_disposition.get_filename().map(|s| s.to_string());

            match name.as_str() {
                "template_id" | "id" => {
                    let value = read_text(&mut field).await?;
                    upload.template_id = Some(value.trim().to_string()).filter(|v| !v.is_empty());
                }
                "schema_json" | "schema" => {
                    let value = read_text(&mut field).await?;
                    if !value.trim().is_empty() {
                        let schema = TemplateSchema::parse(&value)
                            .map_err(|e| MultipartParseError::SchemaError(e.to_string()))?;
                        upload.schema = Some(schema);
                    }
                }
                "docx" | "file" => {
                    let data = read_bytes(&mut field, MAX_DOCX_BYTES).await?;
                    if data.is_empty() {
                        continue;
                    }
                    let filename = sanitize(maybe_filename.unwrap_or_default());
                    if !filename.to_lowercase().ends_with(".docx") {
                        return Err(MultipartParseError::NotDocx(filename));
                    }
                    upload.docx = Some((data, filename));
                }
                "active" => {
                    let value = read_text(&mut field).await?;
                    if !value.trim().is_empty() {
                        upload.active = Some(parse_bool(&value, true));
                    }
                }
                other => {
                    log::debug!("Ignoring unexpected multipart field '{}'", other);
                    continue;
                }
            }
        }

        Ok(upload)
    }
}

async fn read_bytes(field: &mut Field, limit: usize) -> Result<Vec<u8>, MultipartParseError> {
    let mut buffer = Vec::new();
    while let Some(chunk) = field.next().await {
        let data_chunk = chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
        if buffer.len() + data_chunk.len() > limit {
            return Err(MultipartParseError::TooLarge);
        }
        buffer.extend_from_slice(&data_chunk);
    }
    Ok(buffer)
}

async fn read_text(field: &mut Field) -> Result<String, MultipartParseError> {
    let bytes = read_bytes(field, 1024 * 1024).await?;
    String::from_utf8(bytes).map_err(|e| MultipartParseError::Utf8Error(e.to_string()))
}
