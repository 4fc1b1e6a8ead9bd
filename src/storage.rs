//! Output area for generated artifacts.
//!
//! Single documents land directly in the output root, pack archives in
//! `zips/`, and pack runs use throwaway scratch directories under `runs/`.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::config::StorageConfig;

const ZIPS_DIR: &str = "zips";
const RUNS_DIR: &str = "runs";
const MAX_FILENAME_LEN: usize = 200;
const MAX_PREFIX_LEN: usize = 60;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9._-]+").unwrap();
    static ref REPEATED_UNDERSCORES: Regex = Regex::new(r"_{2,}").unwrap();
}

/// Normalise a name so it is safe to use as a file name.
///
/// Keeps letters, digits, dot, dash and underscore; everything else becomes
/// an underscore. Never returns an empty string.
pub fn sanitize_filename(name: &str, max_len: usize) -> String {
    let name = name.trim().replace(' ', "_");
    let name = UNSAFE_CHARS.replace_all(&name, "_");
    let name = REPEATED_UNDERSCORES.replace_all(&name, "_");
    let name = name.trim_matches(|c| c == '.' || c == '_' || c == '-');
    if name.is_empty() {
        return "file".to_string();
    }
    name.chars().take(max_len).collect()
}

/// Build a unique, human-readable file name: `{prefix}_{random}{ext}`.
pub fn build_output_filename(prefix: &str, ext: &str) -> String {
    let prefix = sanitize_filename(prefix, MAX_PREFIX_LEN);
    format!("{}_{}{}", prefix, Uuid::new_v4().simple(), ext)
}

/// Join `name` onto `base`, refusing anything that would escape `base`.
pub fn safe_join(base: &Path, name: &str) -> io::Result<PathBuf> {
    let candidate = Path::new(name);
    let escapes = candidate.components().any(|c| {
        !matches!(c, Component::Normal(_) | Component::CurDir)
    });
    if name.is_empty() || escapes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid path component: {}", name),
        ));
    }
    Ok(base.join(candidate))
}

/// True when `name` is a plain file name with no directory parts.
pub fn is_bare_filename(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains('\\')
}

/// Handle on the output directories.
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
    max_files: usize,
    max_age: std::time::Duration,
}

impl OutputStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.output_root.clone(),
            max_files: config.max_output_files,
            max_age: config.max_output_age,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.clone()
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.root.join(ZIPS_DIR)
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join(RUNS_DIR)
    }

    /// Create every output directory that does not exist yet.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(self.documents_dir())?;
        fs::create_dir_all(self.archives_dir())?;
        fs::create_dir_all(self.runs_dir())?;
        Ok(())
    }

    /// Path for a new document in the documents area.
    pub fn document_path(&self, filename: &str) -> io::Result<PathBuf> {
        safe_join(&self.documents_dir(), &sanitize_filename(filename, MAX_FILENAME_LEN))
    }

    /// Path for a new archive in the archives area.
    pub fn archive_path(&self, filename: &str) -> io::Result<PathBuf> {
        safe_join(&self.archives_dir(), &sanitize_filename(filename, MAX_FILENAME_LEN))
    }

    /// Locate a previously generated artifact by file name.
    pub fn resolve_download(&self, filename: &str) -> Option<PathBuf> {
        let clean = sanitize_filename(filename, MAX_FILENAME_LEN);
        if clean != filename {
            return None;
        }
        [self.documents_dir(), self.archives_dir()]
            .iter()
            .filter_map(|dir| safe_join(dir, &clean).ok())
            .find(|path| path.is_file())
    }

    /// Best-effort retention sweep over both artifact areas.
    ///
    /// Deletes files older than the age threshold, then the oldest remaining
    /// files until the count ceiling holds. Returns the number of deleted files.
    pub fn cleanup(&self) -> usize {
        let mut files = Vec::new();
        for dir in [self.documents_dir(), self.archives_dir()] {
            match collect_files(&dir) {
                Ok(mut found) => files.append(&mut found),
                Err(e) => log::debug!("cleanup skipped {}: {}", dir.display(), e),
            }
        }

        let now = SystemTime::now();
        let mut deleted = 0;
        let mut survivors = Vec::with_capacity(files.len());
        for (path, modified) in files {
            let age = now.duration_since(modified).unwrap_or_default();
            if age > self.max_age {
                if remove_quietly(&path) {
                    deleted += 1;
                }
            } else {
                survivors.push((path, modified));
            }
        }

        if survivors.len() > self.max_files {
            survivors.sort_by_key(|(_, modified)| *modified);
            let excess = survivors.len() - self.max_files;
            for (path, _) in survivors.into_iter().take(excess) {
                if remove_quietly(&path) {
                    deleted += 1;
                }
            }
        }

        if deleted > 0 {
            log::info!("Output cleanup removed {} file(s)", deleted);
        }
        deleted
    }
}

fn collect_files(dir: &Path) -> io::Result<Vec<(PathBuf, SystemTime)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let meta = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        if let Ok(modified) = meta.modified() {
            files.push((entry.path(), modified));
        }
    }
    Ok(files)
}

fn remove_quietly(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("cleanup could not remove {}: {}", path.display(), e);
            false
        }
    }
}
