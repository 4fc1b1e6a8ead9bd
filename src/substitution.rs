//! Placeholder substitution.
//!
//! Replaces `${KEY}` tokens inside document text with caller-supplied values.
//! Tokens without a value are left exactly as they are so callers can report
//! what is still missing.

use std::collections::{BTreeMap, BTreeSet};
use std::io;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use serde_json::{Map, Serializer, Value};
use utoipa::ToSchema;

use crate::docx::{Block, DocumentPart, DocxError, DocxPackage, Paragraph};

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\$\{([A-Za-z0-9_.-]+)\}").unwrap();
}

/// Normalised replacement table keyed by full token (`${KEY}`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Replacements {
    values: BTreeMap<String, String>,
}

impl Replacements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object of field values.
    ///
    /// Keys may be bare (`NAME`) or already wrapped (`${NAME}`). `null`
    /// becomes an empty string, arrays and objects their JSON text with a
    /// space after each `,` and `:`.
    pub fn from_json(data: &Map<String, Value>) -> Self {
        let mut replacements = Self::new();
        for (key, value) in data {
            replacements.insert(key, stringify(value));
        }
        replacements
    }

    /// Insert a value; blank keys are ignored.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        if let Some(token) = normalize_key(key) {
            self.values.insert(token, value.into());
        }
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.values.get(token).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Wrap a key as `${KEY}` unless it already is.
pub fn normalize_key(key: &str) -> Option<String> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    if key.starts_with("${") && key.ends_with('}') {
        Some(key.to_string())
    } else {
        Some(format!("${{{}}}", key))
    }
}

/// Text form of a JSON value as used for substitution.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => spaced_json(value),
    }
}

/// Single-line JSON writing `", "` and `": "` between items.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

fn spaced_json(value: &Value) -> String {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, SpacedFormatter);
    if value.serialize(&mut serializer).is_err() {
        return value.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| value.to_string())
}

/// Outcome of substituting one piece of text.
#[derive(Debug, Default, PartialEq)]
pub struct TextSubstitution {
    pub text: String,
    /// Tokens replaced, one entry per occurrence.
    pub replaced: Vec<String>,
    /// Tokens left in place, one entry per occurrence.
    pub missing: Vec<String>,
}

/// Substitute every known token in `text` in a single pass.
pub fn substitute_text(text: &str, replacements: &Replacements) -> TextSubstitution {
    let mut replaced = Vec::new();
    let mut missing = Vec::new();
    let out = PLACEHOLDER_RE.replace_all(text, |caps: &Captures| {
        let token = caps[0].to_string();
        match replacements.get(&token) {
            Some(value) => {
                replaced.push(token);
                value.to_string()
            }
            None => {
                let kept = token.clone();
                missing.push(token);
                kept
            }
        }
    });
    TextSubstitution {
        text: out.into_owned(),
        replaced,
        missing,
    }
}

/// Tokens syntactically present in `text`.
pub fn find_placeholders(text: &str) -> Vec<String> {
    PLACEHOLDER_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Per-request substitution report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubstitutionSummary {
    /// Number of token occurrences replaced.
    pub replaced_count: usize,
    /// Distinct tokens that were replaced, sorted.
    pub replaced_keys: Vec<String>,
    /// Distinct tokens still present in the output, sorted.
    pub missing_keys: Vec<String>,
}

#[derive(Debug, Default)]
struct Tally {
    count: usize,
    replaced: BTreeSet<String>,
    missing: BTreeSet<String>,
}

impl Tally {
    fn absorb(&mut self, result: TextSubstitution) {
        self.count += result.replaced.len();
        self.replaced.extend(result.replaced);
        self.missing.extend(result.missing);
    }

    fn into_summary(self) -> SubstitutionSummary {
        SubstitutionSummary {
            replaced_count: self.count,
            replaced_keys: self.replaced.into_iter().collect(),
            missing_keys: self.missing.into_iter().collect(),
        }
    }
}

impl SubstitutionSummary {
    /// Combine the reports of several parts or documents.
    pub fn merge(&mut self, other: SubstitutionSummary) {
        self.replaced_count += other.replaced_count;
        let replaced: BTreeSet<String> = self
            .replaced_keys
            .drain(..)
            .chain(other.replaced_keys)
            .collect();
        let missing: BTreeSet<String> = self
            .missing_keys
            .drain(..)
            .chain(other.missing_keys)
            .collect();
        self.replaced_keys = replaced.into_iter().collect();
        self.missing_keys = missing.into_iter().collect();
    }
}

fn substitute_paragraph(paragraph: &mut Paragraph, replacements: &Replacements, tally: &mut Tally) {
    if paragraph.runs.is_empty() {
        return;
    }
    let original = paragraph.text();
    let result = substitute_text(&original, replacements);
    if result.text != original {
        paragraph.set_text(&result.text);
    }
    tally.absorb(result);
}

fn substitute_in(blocks: &mut [Block], replacements: &Replacements, tally: &mut Tally) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => substitute_paragraph(p, replacements, tally),
            Block::Table(table) => {
                for cell in table.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
                    substitute_in(&mut cell.blocks, replacements, tally);
                }
            }
        }
    }
}

/// Substitute tokens in a block tree, descending into nested tables.
pub fn substitute_blocks(blocks: &mut [Block], replacements: &Replacements) -> SubstitutionSummary {
    let mut tally = Tally::default();
    substitute_in(blocks, replacements, &mut tally);
    tally.into_summary()
}

/// Substitute tokens in a parsed text part.
pub fn substitute_part(part: &mut DocumentPart, replacements: &Replacements) -> SubstitutionSummary {
    substitute_blocks(&mut part.blocks, replacements)
}

/// Fill every text part of a `.docx` and return the new bytes.
///
/// Parts without any substitution are written back unchanged.
pub fn fill_docx(
    bytes: &[u8],
    replacements: &Replacements,
) -> Result<(Vec<u8>, SubstitutionSummary), DocxError> {
    let mut package = DocxPackage::from_bytes(bytes)?;
    let mut summary = SubstitutionSummary::default();
    for name in package.text_part_names() {
        let mut part = package.part(&name)?;
        let part_summary = substitute_part(&mut part, replacements);
        if part_summary.replaced_count > 0 {
            package.set_part(&name, &part)?;
        }
        summary.merge(part_summary);
    }
    Ok((package.to_bytes()?, summary))
}
