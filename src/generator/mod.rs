//! Document and pack generation.

pub mod document;
pub mod pack;
pub mod validation;

use thiserror::Error;

use crate::docx::DocxError;
use crate::registry::RegistryError;

pub use document::{DocumentGenerator, GeneratedDocument};
pub use pack::{PackArtifact, PackDocument, PackGenerator};

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("template '{0}' not found")]
    TemplateNotFound(String),
    #[error("pack '{0}' not found")]
    PackNotFound(String),
    #[error("{0}")]
    InvalidManifest(String),
    #[error("template could not be processed: {0}")]
    Docx(#[from] DocxError),
    #[error("output I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive write failed: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error(transparent)]
    Registry(RegistryError),
}

impl From<RegistryError> for GeneratorError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NotFound(id) => GeneratorError::TemplateNotFound(id),
            RegistryError::PackNotFound(id) => GeneratorError::PackNotFound(id),
            e @ RegistryError::InvalidManifest { .. } => GeneratorError::InvalidManifest(e.to_string()),
            other => GeneratorError::Registry(other),
        }
    }
}

/// Absolute or relative download link for a generated file.
pub fn download_url(base_url: &str, filename: &str) -> String {
    format!("{}/download/{}", base_url.trim_end_matches('/'), filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url() {
        assert_eq!(download_url("", "a.docx"), "/download/a.docx");
        assert_eq!(
            download_url("https://x.example/", "a.zip"),
            "https://x.example/download/a.zip"
        );
    }

    #[test]
    fn test_registry_errors_map_to_generation_errors() {
        let e: GeneratorError = RegistryError::NotFound("t".into()).into();
        assert!(matches!(e, GeneratorError::TemplateNotFound(id) if id == "t"));
        let e: GeneratorError = RegistryError::PackNotFound("p".into()).into();
        assert!(matches!(e, GeneratorError::PackNotFound(_)));
    }
}
