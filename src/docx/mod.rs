//! Minimal OOXML word-processing package support.
//!
//! A `.docx` file is a zip archive of XML parts. [`DocxPackage`] keeps every
//! entry as raw bytes so a filled document is written back byte-identical
//! except for the text parts that were modified.

pub mod part;

use std::io::{Cursor, Read, Write};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub use part::{Block, DocumentPart, Paragraph, Table, TableCell, TableRow, TextRun};

/// Main document body part.
pub const MAIN_PART: &str = "word/document.xml";

/// Largest uncompressed size accepted for a single entry.
pub const MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

/// Largest uncompressed size accepted for a whole package.
pub const MAX_PACKAGE_BYTES: u64 = 128 * 1024 * 1024;

/// MIME type of a word-processing document.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("invalid docx archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("failed to read docx entry: {0}")]
    Io(#[from] std::io::Error),
    #[error("docx is missing required part '{0}'")]
    MissingPart(String),
    #[error("part '{part}' is not valid UTF-8")]
    Encoding { part: String },
    #[error("malformed XML in '{part}': {message}")]
    Xml { part: String, message: String },
    #[error("docx entry '{part}' exceeds the {limit} byte limit")]
    TooLarge { part: String, limit: u64 },
}

struct Entry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

/// An opened `.docx` package.
pub struct DocxPackage {
    entries: Vec<Entry>,
}

impl DocxPackage {
    /// Open a package from its raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        Self::from_bytes_limited(bytes, MAX_ENTRY_BYTES, MAX_PACKAGE_BYTES)
    }

    /// Declared sizes are checked up front and reads are capped at the limit.
    fn from_bytes_limited(bytes: &[u8], max_entry: u64, max_total: u64) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        let mut total: u64 = 0;

        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            let name = file.name().to_string();
            let remaining = max_total.saturating_sub(total);
            let limit = max_entry.min(remaining);
            let too_large = || DocxError::TooLarge {
                part: name.clone(),
                limit: if remaining < max_entry { max_total } else { max_entry },
            };
            if file.size() > limit {
                return Err(too_large());
            }

            let is_dir = file.is_dir();
            let mut data = Vec::new();
            file.take(limit + 1).read_to_end(&mut data)?;
            if data.len() as u64 > limit {
                return Err(too_large());
            }
            total += data.len() as u64;
            entries.push(Entry { name, is_dir, data });
        }

        let package = Self { entries };
        if package.entry(MAIN_PART).is_none() {
            return Err(DocxError::MissingPart(MAIN_PART.to_string()));
        }
        Ok(package)
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Names of the parts that carry user-visible text: the body, then
    /// headers and footers in archive order.
    pub fn text_part_names(&self) -> Vec<String> {
        let mut names = vec![MAIN_PART.to_string()];
        names.extend(
            self.entries
                .iter()
                .map(|e| e.name.as_str())
                .filter(|n| is_header_or_footer(n))
                .map(str::to_string),
        );
        names
    }

    /// Parse a text part into its structured form.
    pub fn part(&self, name: &str) -> Result<DocumentPart, DocxError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| DocxError::MissingPart(name.to_string()))?;
        let xml = String::from_utf8(entry.data.clone()).map_err(|_| DocxError::Encoding {
            part: name.to_string(),
        })?;
        DocumentPart::parse(xml).map_err(|message| DocxError::Xml {
            part: name.to_string(),
            message,
        })
    }

    /// Replace the contents of a text part.
    pub fn set_part(&mut self, name: &str, part: &DocumentPart) -> Result<(), DocxError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| DocxError::MissingPart(name.to_string()))?;
        entry.data = part.to_xml().into_bytes();
        Ok(())
    }

    /// Plain text of every text part, one line per paragraph.
    pub fn plain_text(&self) -> Result<String, DocxError> {
        let mut lines = Vec::new();
        for name in self.text_part_names() {
            lines.extend(self.part(&name)?.paragraph_texts());
        }
        Ok(lines.join("\n"))
    }

    /// Serialise the package back into `.docx` bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in &self.entries {
            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
            } else {
                writer.start_file(entry.name.as_str(), options)?;
                writer.write_all(&entry.data)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

fn is_header_or_footer(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    !file.contains('/')
        && file.ends_with(".xml")
        && (file.starts_with("header") || file.starts_with("footer"))
}

/// Build a `.docx` package from body XML fragments. Test support.
#[cfg(test)]
pub(crate) fn build_test_docx(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(br#"<?xml version="1.0"?><Types/>"#).unwrap();
    writer.start_file(MAIN_PART, options).unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}
