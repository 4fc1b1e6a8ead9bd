use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::mailer::{EmailOutcome, EmailRequest};
use crate::substitution::SubstitutionSummary;

pub const SERVICE_NAME: &str = "zeon";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub ok: bool,
    #[schema(example = "zeon")]
    pub service: String,
    pub template_root: String,
    pub output_root: String,
    pub smtp_enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemplateListResponse {
    pub ok: bool,
    #[schema(example = json!(["demo", "solicitud_beca"]))]
    pub templates: Vec<String>,
}

/// Body of `POST /generate`. Spanish aliases are accepted for every key.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GenerateRequest {
    #[serde(default, alias = "tipo", alias = "template")]
    #[schema(example = "demo")]
    pub template_type: Option<String>,
    #[serde(default, alias = "datos")]
    #[schema(value_type = Object, example = json!({"NAME": "Ana"}))]
    pub data: Option<Value>,
    #[serde(default, alias = "prefix")]
    pub output_prefix: Option<String>,
    #[serde(default)]
    pub email: Option<EmailRequest>,
}

impl GenerateRequest {
    pub fn template_id(&self) -> Result<&str, ApiError> {
        self.template_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Validation("template_type is required".to_string()))
    }

    /// Field values; a missing `data` is an empty mapping.
    pub fn data_map(&self) -> Result<Map<String, Value>, ApiError> {
        data_object(self.data.as_ref())
    }
}

/// Field values must be a JSON object when present.
pub fn data_object(data: Option<&Value>) -> Result<Map<String, Value>, ApiError> {
    match data {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(ApiError::Validation("data must be a JSON object".to_string())),
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateResponse {
    pub ok: bool,
    pub filename: String,
    pub download_url: String,
    pub summary: SubstitutionSummary,
    pub email: EmailOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_request_aliases() {
        let req: GenerateRequest = serde_json::from_value(json!({
            "tipo": " demo ",
            "datos": {"NAME": "Ana"},
            "prefix": "carta"
        }))
        .unwrap();
        assert_eq!(req.template_id().unwrap(), "demo");
        assert_eq!(req.data_map().unwrap()["NAME"], "Ana");
        assert_eq!(req.output_prefix.as_deref(), Some("carta"));
    }

    #[test]
    fn test_generate_request_requires_template() {
        let req: GenerateRequest = serde_json::from_value(json!({"template_type": "  "})).unwrap();
        assert!(matches!(req.template_id(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_data_must_be_object() {
        assert!(data_object(None).unwrap().is_empty());
        assert!(data_object(Some(&json!(null))).unwrap().is_empty());
        assert!(data_object(Some(&json!([1, 2]))).is_err());
    }
}
