use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{download_url, GeneratorError};
use crate::registry::TemplateRepository;
use crate::storage::{build_output_filename, OutputStore};
use crate::substitution::{fill_docx, Replacements, SubstitutionSummary};

const DOCX_EXT: &str = ".docx";

#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub filename: String,
    pub path: PathBuf,
    pub download_url: String,
    pub summary: SubstitutionSummary,
}

/// Fills one registry template and stores the result in the output area.
#[derive(Clone)]
pub struct DocumentGenerator {
    templates: Arc<dyn TemplateRepository>,
    output: OutputStore,
    base_url: String,
}

impl DocumentGenerator {
    pub fn new(templates: Arc<dyn TemplateRepository>, output: OutputStore, base_url: &str) -> Self {
        Self {
            templates,
            output,
            base_url: base_url.to_string(),
        }
    }

    /// Fill `template_id` and write it as `{prefix}_{random}.docx`.
    ///
    /// The prefix defaults to the template id. Nothing is written when the
    /// template cannot be resolved or parsed.
    pub fn generate(
        &self,
        template_id: &str,
        replacements: &Replacements,
        output_prefix: Option<&str>,
    ) -> Result<GeneratedDocument, GeneratorError> {
        let body = self.templates.document(template_id)?;
        let (filled, summary) = fill_docx(&body, replacements)?;

        fs::create_dir_all(self.output.documents_dir())?;
        let prefix = output_prefix
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(template_id);
        let filename = build_output_filename(prefix, DOCX_EXT);
        let path = self.output.document_path(&filename)?;
        fs::write(&path, filled)?;

        log::info!(
            "Generated '{}' from template '{}' (replaced={}, missing={})",
            filename,
            template_id,
            summary.replaced_count,
            summary.missing_keys.len()
        );

        Ok(GeneratedDocument {
            download_url: download_url(&self.base_url, &filename),
            filename,
            path,
            summary,
        })
    }
}

/// Fill the template at `template` and write it to `dest`.
pub fn render_file(
    template: &Path,
    replacements: &Replacements,
    dest: &Path,
) -> Result<SubstitutionSummary, GeneratorError> {
    let body = fs::read(template).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            GeneratorError::TemplateNotFound(template.display().to_string())
        }
        _ => GeneratorError::Io(e),
    })?;
    let (filled, summary) = fill_docx(&body, replacements)?;
    fs::write(dest, filled)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::docx::{build_test_docx, DocxPackage};
    use crate::registry::{MemoryTemplateRepository, NewTemplate, TemplateSchema};
    use serde_json::json;
    use std::time::Duration;

    fn setup(dir: &Path) -> DocumentGenerator {
        let repo = MemoryTemplateRepository::new();
        repo.create(NewTemplate {
            id: "demo".to_string(),
            schema: TemplateSchema::from_value(json!({"fields": [{"name": "NAME"}]})).unwrap(),
            document: build_test_docx(
                "<w:p><w:r><w:t>Hello ${NAME}, DNI ${DNI}</w:t></w:r></w:p>",
            ),
            active: true,
        })
        .unwrap();
        let output = OutputStore::new(&StorageConfig {
            template_root: dir.join("t"),
            packs_root: dir.join("p"),
            output_root: dir.join("out"),
            max_output_files: 100,
            max_output_age: Duration::from_secs(3600),
        });
        DocumentGenerator::new(Arc::new(repo), output, "")
    }

    #[test]
    fn test_generate_writes_filled_document() {
        let dir = tempfile::tempdir().unwrap();
        let generator = setup(dir.path());
        let replacements = Replacements::from_json(json!({"NAME": "Ana"}).as_object().unwrap());

        let doc = generator.generate("demo", &replacements, Some("Carta Ana")).unwrap();
        assert!(doc.filename.starts_with("Carta_Ana_"));
        assert!(doc.filename.ends_with(".docx"));
        assert_eq!(doc.download_url, format!("/download/{}", doc.filename));
        assert_eq!(doc.summary.replaced_keys, vec!["${NAME}"]);
        assert_eq!(doc.summary.missing_keys, vec!["${DNI}"]);

        let bytes = fs::read(&doc.path).unwrap();
        let text = DocxPackage::from_bytes(&bytes).unwrap().plain_text().unwrap();
        assert_eq!(text, "Hello Ana, DNI ${DNI}");
    }

    #[test]
    fn test_prefix_defaults_to_template_id() {
        let dir = tempfile::tempdir().unwrap();
        let generator = setup(dir.path());
        let doc = generator.generate("demo", &Replacements::new(), Some("  ")).unwrap();
        assert!(doc.filename.starts_with("demo_"));
    }

    #[test]
    fn test_unknown_template_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let generator = setup(dir.path());
        let result = generator.generate("missing", &Replacements::new(), None);
        assert!(matches!(result, Err(GeneratorError::TemplateNotFound(_))));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_render_file_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let result = render_file(
            &dir.path().join("nope.docx"),
            &Replacements::new(),
            &dir.path().join("out.docx"),
        );
        assert!(matches!(result, Err(GeneratorError::TemplateNotFound(_))));
    }
}
