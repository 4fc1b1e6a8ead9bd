//! Template and pack definitions.
//!
//! Templates sit behind [`TemplateRepository`] so the directory layout used in
//! production can be swapped for another store without touching callers.

pub mod fs;
pub mod memory;
pub mod model;
pub mod packs;

pub use fs::FsTemplateRepository;
pub use memory::MemoryTemplateRepository;
pub use model::*;
pub use packs::{PackDefinition, PackEntry, PackLibrary, PackManifest, PackSummary};

pub trait TemplateRepository: Send + Sync {
    /// Valid templates (schema and body present), active ones first.
    fn list(&self, active_only: bool) -> Result<Vec<TemplateSummary>, RegistryError>;

    /// Sorted ids of every template with a document body.
    fn ids(&self) -> Result<Vec<String>, RegistryError>;

    fn summary(&self, id: &str) -> Result<TemplateSummary, RegistryError>;

    fn schema(&self, id: &str) -> Result<TemplateSchema, RegistryError>;

    /// Raw `.docx` bytes of the template body.
    fn document(&self, id: &str) -> Result<Vec<u8>, RegistryError>;

    fn create(&self, template: NewTemplate) -> Result<TemplateSummary, RegistryError>;

    fn update(&self, id: &str, update: TemplateUpdate) -> Result<TemplateSummary, RegistryError>;

    /// Soft delete: the template stays stored but inactive.
    fn deactivate(&self, id: &str) -> Result<TemplateSummary, RegistryError> {
        self.update(
            id,
            TemplateUpdate {
                active: Some(false),
                ..TemplateUpdate::default()
            },
        )
    }
}
