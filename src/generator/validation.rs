//! Request validation against a template schema.

use std::fmt;

use serde_json::{Map, Value};

use crate::registry::{FieldDefinition, TemplateSchema};
use crate::substitution::normalize_key;

/// One field that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing_field(field: &FieldDefinition) -> Self {
        Self::new(
            field.name.clone(),
            format!("{} is required", field.display_label()),
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Every problem found in one request, reported together.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    pub fn message(&self) -> String {
        let parts: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        format!("Validation failed: {}", parts.join("; "))
    }

    pub fn into_result(self) -> Result<(), String> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.message())
        }
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Look a field up under its bare or `${...}` key.
fn lookup<'a>(data: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    data.get(name)
        .or_else(|| normalize_key(name).and_then(|token| data.get(&token)))
}

/// Check that every required schema field has a non-blank value.
pub fn validate_required(schema: &TemplateSchema, data: &Map<String, Value>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for field in schema.required_fields() {
        if is_blank(lookup(data, &field.name)) {
            errors.add(ValidationError::missing_field(field));
        }
    }
    errors
}
