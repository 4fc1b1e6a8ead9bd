//! Pack manifests.
//!
//! A pack lives in `PACKS_ROOT/{pack_id}/` next to the template files it
//! references, described by `pack.json`:
//!
//! ```json
//! {"label": "Alta", "docs": [{"template": "a.docx", "output": "A.docx"}]}
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::model::RegistryError;
use crate::storage::is_bare_filename;

pub const MANIFEST_FILE: &str = "pack.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PackEntry {
    /// Template file inside the pack directory.
    pub template: String,
    /// File name of the generated document inside the archive.
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackManifest {
    #[serde(default)]
    pub label: Option<String>,
    pub docs: Vec<PackEntry>,
}

impl PackManifest {
    /// Reject manifests that could never produce a complete archive.
    pub fn validate(&self, pack_id: &str) -> Result<(), RegistryError> {
        let invalid = |message: String| RegistryError::InvalidManifest {
            pack: pack_id.to_string(),
            message,
        };

        if self.docs.is_empty() {
            return Err(invalid("'docs' must list at least one document".to_string()));
        }

        let mut outputs = HashSet::new();
        for (i, doc) in self.docs.iter().enumerate() {
            if !is_bare_filename(&doc.template) {
                return Err(invalid(format!(
                    "docs[{}].template '{}' must be a plain file name",
                    i, doc.template
                )));
            }
            if !is_bare_filename(&doc.output) {
                return Err(invalid(format!(
                    "docs[{}].output '{}' must be a plain file name",
                    i, doc.output
                )));
            }
            if !outputs.insert(doc.output.as_str()) {
                return Err(invalid(format!(
                    "output name '{}' is used more than once",
                    doc.output
                )));
            }
        }
        Ok(())
    }
}

/// A loaded, validated pack.
#[derive(Debug, Clone)]
pub struct PackDefinition {
    pub id: String,
    pub dir: PathBuf,
    pub manifest: PackManifest,
}

impl PackDefinition {
    pub fn template_path(&self, entry: &PackEntry) -> PathBuf {
        self.dir.join(&entry.template)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PackSummary {
    pub id: String,
    pub label: String,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PackLibrary {
    root: PathBuf,
}

impl PackLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load(&self, pack_id: &str) -> Result<PackDefinition, RegistryError> {
        let not_found = || RegistryError::PackNotFound(pack_id.to_string());
        if !is_bare_filename(pack_id) || pack_id.starts_with('.') {
            return Err(not_found());
        }

        let dir = self.root.join(pack_id);
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(not_found());
        }

        let bytes = fs::read(&manifest_path)?;
        let manifest: PackManifest =
            serde_json::from_slice(&bytes).map_err(|e| RegistryError::InvalidManifest {
                pack: pack_id.to_string(),
                message: e.to_string(),
            })?;
        manifest.validate(pack_id)?;

        Ok(PackDefinition {
            id: pack_id.to_string(),
            dir,
            manifest,
        })
    }

    /// Every pack with a valid manifest, sorted by id.
    pub fn list(&self) -> Result<Vec<PackSummary>, RegistryError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut packs = Vec::new();
        for entry in entries.flatten() {
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !entry.path().is_dir() {
                continue;
            }
            match self.load(&id) {
                Ok(pack) => packs.push(PackSummary {
                    label: pack.manifest.label.clone().unwrap_or_else(|| id.clone()),
                    outputs: pack.manifest.docs.iter().map(|d| d.output.clone()).collect(),
                    id,
                }),
                Err(RegistryError::PackNotFound(_)) => {}
                Err(e) => log::warn!("Skipping pack '{}': {}", id, e),
            }
        }
        packs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(packs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_pack(root: &Path, id: &str, manifest: &str) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
    }

    #[test]
    fn test_load_valid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(
            dir.path(),
            "alta",
            r#"{"docs":[{"template":"a.docx","output":"A.docx"},{"template":"b.docx","output":"B.docx"}]}"#,
        );
        let pack = PackLibrary::new(dir.path()).load("alta").unwrap();
        assert_eq!(pack.manifest.docs.len(), 2);
        assert_eq!(
            pack.template_path(&pack.manifest.docs[0]),
            dir.path().join("alta").join("a.docx")
        );
    }

    #[test]
    fn test_missing_pack() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        let library = PackLibrary::new(dir.path());
        assert!(matches!(library.load("nope"), Err(RegistryError::PackNotFound(_))));
        assert!(matches!(library.load("empty"), Err(RegistryError::PackNotFound(_))));
        assert!(matches!(library.load("../x"), Err(RegistryError::PackNotFound(_))));
    }

    #[test]
    fn test_rejects_invalid_manifests() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(dir.path(), "empty_docs", r#"{"docs":[]}"#);
        write_pack(
            dir.path(),
            "dup",
            r#"{"docs":[{"template":"a.docx","output":"X.docx"},{"template":"b.docx","output":"X.docx"}]}"#,
        );
        write_pack(
            dir.path(),
            "escape",
            r#"{"docs":[{"template":"../../secret.docx","output":"X.docx"}]}"#,
        );
        write_pack(dir.path(), "broken", "{");

        let library = PackLibrary::new(dir.path());
        for id in ["empty_docs", "dup", "escape", "broken"] {
            assert!(
                matches!(library.load(id), Err(RegistryError::InvalidManifest { .. })),
                "{} should be rejected",
                id
            );
        }
        assert!(library.list().unwrap().is_empty());
    }

    #[test]
    fn test_list() {
        let dir = tempfile::tempdir().unwrap();
        write_pack(
            dir.path(),
            "b",
            r#"{"label":"Bravo","docs":[{"template":"t.docx","output":"o.docx"}]}"#,
        );
        write_pack(dir.path(), "a", r#"{"docs":[{"template":"t.docx","output":"o.docx"}]}"#);

        let packs = PackLibrary::new(dir.path()).list().unwrap();
        assert_eq!(packs.len(), 2);
        assert_eq!(packs[0].id, "a");
        assert_eq!(packs[0].label, "a");
        assert_eq!(packs[1].label, "Bravo");
        assert_eq!(packs[1].outputs, vec!["o.docx"]);
    }
}
