//! Directory-per-template store.
//!
//! ```text
//! TEMPLATE_ROOT/
//!   {id}/schema.json
//!   {id}/template.docx
//!   {id}/meta.json
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::model::*;
use super::TemplateRepository;
use crate::storage::is_bare_filename;

const SCHEMA_FILE: &str = "schema.json";
const META_FILE: &str = "meta.json";
const DOCUMENT_FILE: &str = "template.docx";

/// Body file names checked in order before falling back to any `.docx`.
const DOCUMENT_CANDIDATES: [&str; 4] = [
    DOCUMENT_FILE,
    "plantilla.docx",
    "solicitud.docx",
    "plantilla_solicitud.docx",
];

#[derive(Debug, Clone)]
pub struct FsTemplateRepository {
    root: PathBuf,
}

impl FsTemplateRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for(&self, id: &str) -> Option<PathBuf> {
        if !is_bare_filename(id) || id.starts_with('.') {
            return None;
        }
        let dir = self.root.join(id);
        dir.is_dir().then_some(dir)
    }

    fn template_dirs(&self) -> Result<Vec<(String, PathBuf)>, RegistryError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') || !path.is_dir() {
                continue;
            }
            dirs.push((name, path));
        }
        dirs.sort();
        Ok(dirs)
    }

    fn load(&self, id: &str) -> Result<(PathBuf, TemplateSchema, TemplateMeta), RegistryError> {
        let dir = self
            .dir_for(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if find_document(&dir).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        let schema = read_schema(&dir).ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let meta = read_meta(&dir);
        Ok((dir, schema, meta))
    }
}

/// Locate the body of a template directory.
fn find_document(dir: &Path) -> Option<PathBuf> {
    for name in DOCUMENT_CANDIDATES {
        let path = dir.join(name);
        if path.is_file() {
            return Some(path);
        }
    }

    let mut docs: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.to_lowercase().ends_with(".docx") && !n.starts_with("~$"))
                .unwrap_or(false)
        })
        .collect();
    docs.sort();
    docs.into_iter().next()
}

fn read_schema(dir: &Path) -> Option<TemplateSchema> {
    let path = dir.join(SCHEMA_FILE);
    let text = fs::read_to_string(&path).ok()?;
    match TemplateSchema::parse(&text) {
        Ok(schema) => Some(schema),
        Err(e) => {
            log::warn!("Ignoring unreadable schema {}: {}", path.display(), e);
            None
        }
    }
}

fn read_meta(dir: &Path) -> TemplateMeta {
    let path = dir.join(META_FILE);
    match fs::read(&path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            log::debug!("Unreadable meta {}, assuming defaults: {}", path.display(), e);
            TemplateMeta::default()
        }),
        Err(_) => TemplateMeta::default(),
    }
}

/// Write through a sibling temp file so readers never see a partial file.
fn write_file(path: &Path, bytes: &[u8]) -> Result<(), RegistryError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| RegistryError::Io(e.error))?;
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), RegistryError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_file(path, &bytes)
}

impl TemplateRepository for FsTemplateRepository {
    fn list(&self, active_only: bool) -> Result<Vec<TemplateSummary>, RegistryError> {
        let mut summaries = Vec::new();
        for (id, dir) in self.template_dirs()? {
            if find_document(&dir).is_none() {
                continue;
            }
            let Some(schema) = read_schema(&dir) else {
                continue;
            };
            let meta = read_meta(&dir);
            if active_only && !meta.active {
                continue;
            }
            summaries.push(TemplateSummary::new(&id, &schema, &meta));
        }
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    fn ids(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self
            .template_dirs()?
            .into_iter()
            .filter(|(_, dir)| find_document(dir).is_some())
            .map(|(id, _)| id)
            .collect())
    }

    fn summary(&self, id: &str) -> Result<TemplateSummary, RegistryError> {
        let (_, schema, meta) = self.load(id)?;
        Ok(TemplateSummary::new(id, &schema, &meta))
    }

    fn schema(&self, id: &str) -> Result<TemplateSchema, RegistryError> {
        self.load(id).map(|(_, schema, _)| schema)
    }

    fn document(&self, id: &str) -> Result<Vec<u8>, RegistryError> {
        let path = self
            .dir_for(id)
            .and_then(|dir| find_document(&dir))
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        Ok(fs::read(path)?)
    }

    fn create(&self, template: NewTemplate) -> Result<TemplateSummary, RegistryError> {
        let id = normalize_template_id(&template.id)?;
        template.schema.validate()?;
        validate_document(&template.document)?;

        fs::create_dir_all(&self.root)?;
        let dir = self.root.join(&id);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(RegistryError::AlreadyExists(id));
            }
            Err(e) => return Err(e.into()),
        }

        let meta = TemplateMeta::created(template.active);
        write_json(&dir.join(SCHEMA_FILE), &template.schema)?;
        write_file(&dir.join(DOCUMENT_FILE), &template.document)?;
        write_json(&dir.join(META_FILE), &meta)?;

        log::info!("Created template '{}' (active={})", id, meta.active);
        Ok(TemplateSummary::new(&id, &template.schema, &meta))
    }

    fn update(&self, id: &str, update: TemplateUpdate) -> Result<TemplateSummary, RegistryError> {
        let id = normalize_template_id(id)?;
        let dir = self
            .dir_for(&id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        if let Some(schema) = &update.schema {
            schema.validate()?;
        }
        if let Some(document) = &update.document {
            validate_document(document)?;
        }
        let schema = match update.schema {
            Some(schema) => {
                write_json(&dir.join(SCHEMA_FILE), &schema)?;
                schema
            }
            None => read_schema(&dir).ok_or_else(|| {
                RegistryError::InvalidSchema(format!("template '{}' has no usable schema", id))
            })?,
        };
        if let Some(document) = &update.document {
            write_file(&dir.join(DOCUMENT_FILE), document)?;
        }

        let mut meta = read_meta(&dir);
        if let Some(active) = update.active {
            meta.active = active;
        }
        meta.touch();
        write_json(&dir.join(META_FILE), &meta)?;

        log::info!("Updated template '{}' (active={})", id, meta.active);
        Ok(TemplateSummary::new(&id, &schema, &meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::build_test_docx;
    use serde_json::json;

    fn schema(label: &str) -> TemplateSchema {
        TemplateSchema::from_value(json!({
            "label": label,
            "fields": [{"name": "NOMBRE", "required": true}]
        }))
        .unwrap()
    }

    fn new_template(id: &str, label: &str, active: bool) -> NewTemplate {
        NewTemplate {
            id: id.to_string(),
            schema: schema(label),
            document: build_test_docx("<w:p><w:r><w:t>${NOMBRE}</w:t></w:r></w:p>"),
            active,
        }
    }

    #[test]
    fn test_create_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsTemplateRepository::new(dir.path());

        let created = repo.create(new_template("carta-poder", "Carta", true)).unwrap();
        assert_eq!(created.id, "carta_poder");
        assert!(dir.path().join("carta_poder/schema.json").is_file());
        assert!(dir.path().join("carta_poder/template.docx").is_file());
        assert!(dir.path().join("carta_poder/meta.json").is_file());

        assert_eq!(repo.schema("carta_poder").unwrap().label.as_deref(), Some("Carta"));
        assert!(!repo.document("carta_poder").unwrap().is_empty());
        assert_eq!(repo.ids().unwrap(), vec!["carta_poder"]);
    }

    #[test]
    fn test_create_rejects_duplicates_and_bad_documents() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsTemplateRepository::new(dir.path());
        repo.create(new_template("a", "A", true)).unwrap();

        assert!(matches!(
            repo.create(new_template("a", "A", true)),
            Err(RegistryError::AlreadyExists(_))
        ));

        let mut bad = new_template("b", "B", true);
        bad.document = b"not a docx".to_vec();
        assert!(matches!(repo.create(bad), Err(RegistryError::InvalidDocument(_))));
        assert!(!dir.path().join("b").exists());
    }

    #[test]
    fn test_list_orders_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsTemplateRepository::new(dir.path());
        repo.create(new_template("z", "alpha", false)).unwrap();
        repo.create(new_template("y", "Beta", true)).unwrap();
        repo.create(new_template("x", "gamma", true)).unwrap();

        let all: Vec<_> = repo.list(false).unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(all, vec!["y", "x", "z"]);
        let active: Vec<_> = repo.list(true).unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(active, vec!["y", "x"]);
    }

    #[test]
    fn test_legacy_layout_is_recognised() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("beca");
        fs::create_dir_all(&legacy).unwrap();
        fs::write(legacy.join("solicitud.docx"), build_test_docx("")).unwrap();
        fs::write(legacy.join("schema.json"), r#"{"fields":[{"name":"A"}]}"#).unwrap();
        let bare = dir.path().join("demo");
        fs::create_dir_all(&bare).unwrap();
        fs::write(bare.join("zzz.docx"), build_test_docx("")).unwrap();
        fs::create_dir_all(dir.path().join(".hidden")).unwrap();

        let repo = FsTemplateRepository::new(dir.path());
        assert_eq!(repo.ids().unwrap(), vec!["beca", "demo"]);
        let listed = repo.list(true).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].label, "beca");
        assert!(listed[0].active);
        assert!(repo.document("demo").is_ok());
        assert!(matches!(repo.schema("demo"), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_update_is_partial() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsTemplateRepository::new(dir.path());
        let created = repo.create(new_template("t", "Old", true)).unwrap();

        let updated = repo
            .update(
                "t",
                TemplateUpdate {
                    schema: Some(schema("New")),
                    ..TemplateUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.label, "New");
        assert!(updated.active);
        assert_eq!(updated.created_at, created.created_at);

        let rejected = repo.update(
            "t",
            TemplateUpdate {
                document: Some(b"garbage".to_vec()),
                active: Some(false),
                ..TemplateUpdate::default()
            },
        );
        assert!(rejected.is_err());
        assert!(repo.summary("t").unwrap().active);
    }

    #[test]
    fn test_update_without_schema_leaves_meta_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("sin_schema");
        fs::create_dir_all(&legacy).unwrap();
        fs::write(legacy.join("template.docx"), build_test_docx("")).unwrap();
        let repo = FsTemplateRepository::new(dir.path());

        let result = repo.update(
            "sin_schema",
            TemplateUpdate {
                active: Some(false),
                ..TemplateUpdate::default()
            },
        );
        assert!(matches!(result, Err(RegistryError::InvalidSchema(_))));
        assert!(!legacy.join("meta.json").exists());
    }

    #[test]
    fn test_create_into_existing_directory_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("ocupado")).unwrap();
        let repo = FsTemplateRepository::new(dir.path());

        let result = repo.create(new_template("ocupado", "X", true));
        assert!(matches!(result, Err(RegistryError::AlreadyExists(_))));
        assert!(!dir.path().join("ocupado/template.docx").exists());
    }

    #[test]
    fn test_create_makes_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsTemplateRepository::new(dir.path().join("nuevo"));
        repo.create(new_template("t", "T", true)).unwrap();
        assert_eq!(repo.ids().unwrap(), vec!["t"]);
    }

    #[test]
    fn test_deactivate_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsTemplateRepository::new(dir.path());
        repo.create(new_template("t", "T", true)).unwrap();

        let summary = repo.deactivate("t").unwrap();
        assert!(!summary.active);
        assert!(dir.path().join("t/template.docx").is_file());
        assert!(repo.list(true).unwrap().is_empty());
        assert_eq!(repo.list(false).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_and_unsafe_ids() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsTemplateRepository::new(dir.path());
        assert!(matches!(repo.document("nope"), Err(RegistryError::NotFound(_))));
        assert!(matches!(repo.document("../x"), Err(RegistryError::NotFound(_))));
        assert!(matches!(repo.deactivate("nope"), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_missing_root_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsTemplateRepository::new(dir.path().join("absent"));
        assert!(repo.list(false).unwrap().is_empty());
        assert!(repo.ids().unwrap().is_empty());
    }
}
