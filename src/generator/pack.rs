use std::fs::{self, File};
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;
use utoipa::ToSchema;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::document::render_file;
use super::{download_url, GeneratorError};
use crate::registry::PackLibrary;
use crate::storage::{sanitize_filename, OutputStore};
use crate::substitution::{Replacements, SubstitutionSummary};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PackDocument {
    pub output: String,
    pub summary: SubstitutionSummary,
}

#[derive(Debug, Clone)]
pub struct PackArtifact {
    pub pack_id: String,
    pub run_id: String,
    pub zip_name: String,
    pub zip_path: PathBuf,
    pub download_url: String,
    pub created_at: DateTime<Utc>,
    pub documents: Vec<PackDocument>,
}

/// Renders every document of a pack and bundles them into one archive.
#[derive(Debug, Clone)]
pub struct PackGenerator {
    packs: PackLibrary,
    output: OutputStore,
    base_url: String,
}

impl PackGenerator {
    pub fn new(packs: PackLibrary, output: OutputStore, base_url: &str) -> Self {
        Self {
            packs,
            output,
            base_url: base_url.to_string(),
        }
    }

    pub fn library(&self) -> &PackLibrary {
        &self.packs
    }

    /// Generate every document of `pack_id` with the same answers.
    ///
    /// All or nothing: documents are rendered into a scratch directory that
    /// is removed when the run ends, and the archive only appears under its
    /// final name once it is complete.
    pub fn generate_pack(
        &self,
        pack_id: &str,
        replacements: &Replacements,
    ) -> Result<PackArtifact, GeneratorError> {
        let pack = self.packs.load(pack_id)?;

        let run_id = Uuid::new_v4().simple().to_string();
        fs::create_dir_all(self.output.runs_dir())?;
        fs::create_dir_all(self.output.archives_dir())?;
        let run_dir = tempfile::Builder::new()
            .prefix(&format!("{}_", run_id))
            .tempdir_in(self.output.runs_dir())?;

        let mut rendered = Vec::with_capacity(pack.manifest.docs.len());
        for entry in &pack.manifest.docs {
            let dest = run_dir.path().join(&entry.output);
            let summary = render_file(&pack.template_path(entry), replacements, &dest)
                .map_err(|e| {
                    log::warn!("Pack '{}' aborted at '{}': {}", pack_id, entry.template, e);
                    match e {
                        GeneratorError::TemplateNotFound(_) => GeneratorError::TemplateNotFound(
                            format!("{}/{}", pack_id, entry.template),
                        ),
                        other => other,
                    }
                })?;
            rendered.push((dest, PackDocument {
                output: entry.output.clone(),
                summary,
            }));
        }

        let zip_name = format!("{}_{}.zip", sanitize_filename(pack_id, 60), run_id);
        let zip_path = self.output.archive_path(&zip_name)?;

        let mut tmp = NamedTempFile::new_in(self.output.archives_dir())?;
        {
            let mut writer = ZipWriter::new(tmp.as_file_mut());
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for (path, doc) in &rendered {
                writer.start_file(doc.output.as_str(), options)?;
                io::copy(&mut File::open(path)?, &mut writer)?;
            }
            writer.finish()?;
        }
        tmp.persist(&zip_path).map_err(|e| GeneratorError::Io(e.error))?;

        log::info!(
            "Generated pack '{}' as '{}' ({} documents)",
            pack_id,
            zip_name,
            rendered.len()
        );

        Ok(PackArtifact {
            pack_id: pack_id.to_string(),
            run_id,
            download_url: download_url(&self.base_url, &zip_name),
            zip_name,
            zip_path,
            created_at: Utc::now(),
            documents: rendered.into_iter().map(|(_, doc)| doc).collect(),
        })
    }
}
