//! Keyed in-process template store.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::model::*;
use super::TemplateRepository;

#[derive(Debug, Clone)]
struct StoredTemplate {
    schema: TemplateSchema,
    document: Vec<u8>,
    meta: TemplateMeta,
}

#[derive(Debug, Default)]
pub struct MemoryTemplateRepository {
    templates: RwLock<BTreeMap<String, StoredTemplate>>,
}

impl MemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateRepository for MemoryTemplateRepository {
    fn list(&self, active_only: bool) -> Result<Vec<TemplateSummary>, RegistryError> {
        let templates = self.templates.read();
        let mut summaries: Vec<_> = templates
            .iter()
            .filter(|(_, t)| !active_only || t.meta.active)
            .map(|(id, t)| TemplateSummary::new(id, &t.schema, &t.meta))
            .collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    fn ids(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.templates.read().keys().cloned().collect())
    }

    fn summary(&self, id: &str) -> Result<TemplateSummary, RegistryError> {
        self.templates
            .read()
            .get(id)
            .map(|t| TemplateSummary::new(id, &t.schema, &t.meta))
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    fn schema(&self, id: &str) -> Result<TemplateSchema, RegistryError> {
        self.templates
            .read()
            .get(id)
            .map(|t| t.schema.clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    fn document(&self, id: &str) -> Result<Vec<u8>, RegistryError> {
        self.templates
            .read()
            .get(id)
            .map(|t| t.document.clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    fn create(&self, template: NewTemplate) -> Result<TemplateSummary, RegistryError> {
        let id = normalize_template_id(&template.id)?;
        template.schema.validate()?;
        validate_document(&template.document)?;

        let mut templates = self.templates.write();
        if templates.contains_key(&id) {
            return Err(RegistryError::AlreadyExists(id));
        }
        let stored = StoredTemplate {
            schema: template.schema,
            document: template.document,
            meta: TemplateMeta::created(template.active),
        };
        let summary = TemplateSummary::new(&id, &stored.schema, &stored.meta);
        templates.insert(id, stored);
        Ok(summary)
    }

    fn update(&self, id: &str, update: TemplateUpdate) -> Result<TemplateSummary, RegistryError> {
        let id = normalize_template_id(id)?;
        if let Some(schema) = &update.schema {
            schema.validate()?;
        }
        if let Some(document) = &update.document {
            validate_document(document)?;
        }

        let mut templates = self.templates.write();
        let stored = templates
            .get_mut(&id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        if let Some(schema) = update.schema {
            stored.schema = schema;
        }
        if let Some(document) = update.document {
            stored.document = document;
        }
        if let Some(active) = update.active {
            stored.meta.active = active;
        }
        stored.meta.touch();
        Ok(TemplateSummary::new(&id, &stored.schema, &stored.meta))
    }
}
