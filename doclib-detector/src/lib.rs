//! Duplicate text detection for `doclib-detector`.
//!
//! `detect_duplicates(root, format, directive_prefix, context)` reads every
//! document under `root` whose name ends with `format`, drops directive lines
//! (those starting with `directive_prefix`), splits the rest into paragraphs
//! and sentences, and reports each fragment signature seen more than once.
//!
//! A sentence's signature is the SHA-256 of its simplified text (whitespace
//! and ASCII punctuation removed, lower-cased), so reflowed or re-punctuated
//! copies still collide. A paragraph's signature hashes its sentence
//! signatures in order.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use doclib_core::layout::Layout;
use doclib_core::types::ProductCode;
use doclib_core::Settings;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Characters kept in a finding's preview.
pub const PREVIEW_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Granularity of the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    #[default]
    Sentence,
    Paragraph,
}

/// What to look for. Duplicates are the only supported target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Duplicate,
}

/// One fragment that occurs more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Hex digest shared by every occurrence.
    pub signature: String,
    /// First characters of the first occurrence.
    pub preview: String,
    pub occurrences: usize,
    /// Documents containing the fragment, sorted, without repeats.
    pub files: Vec<PathBuf>,
}

/// Result of a detection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub target: Target,
    pub context: Context,
    pub documents: usize,
    pub findings: Vec<Finding>,
}

/// A hashed piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub signature: String,
    pub text: String,
}

/// Errors from duplicate detection.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document root {path} does not exist; run checkout first")]
    MissingRoot { path: PathBuf },

    #[error("unknown {what} `{value}`")]
    Unknown { what: &'static str, value: String },
}

fn io_err(path: &Path, source: std::io::Error) -> DetectError {
    DetectError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl Context {
    pub fn name(&self) -> &'static str {
        match self {
            Context::Sentence => "sentence",
            Context::Paragraph => "paragraph",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Context {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sentence" => Ok(Context::Sentence),
            "paragraph" => Ok(Context::Paragraph),
            _ => Err(DetectError::Unknown {
                what: "context",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("duplicate")
    }
}

impl FromStr for Target {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "duplicate" => Ok(Target::Duplicate),
            _ => Err(DetectError::Unknown {
                what: "target",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Detect duplicates in the product's workspace documents.
pub fn detect(
    layout: &Layout,
    settings: &Settings,
    product: &ProductCode,
    target: Target,
    context: Context,
) -> Result<Detection, DetectError> {
    let root = layout.doc_root(&layout.product_workspace(product));
    match target {
        Target::Duplicate => detect_duplicates(
            &root,
            &settings.default_doc_format,
            &settings.directive.prefix,
            context,
        ),
    }
}

/// Detect duplicated fragments among the documents under `root`.
pub fn detect_duplicates(
    root: &Path,
    format: &str,
    directive_prefix: &str,
    context: Context,
) -> Result<Detection, DetectError> {
    if !root.is_dir() {
        return Err(DetectError::MissingRoot {
            path: root.to_path_buf(),
        });
    }
    let mut documents = Vec::new();
    collect_documents(root, format, &mut documents)?;
    documents.sort();

    let mut seen: BTreeMap<String, Occurrences> = BTreeMap::new();
    for path in &documents {
        let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        for fragment in fragments(&text, directive_prefix, context) {
            if !starts_alphanumeric(&fragment.text) {
                continue;
            }
            seen.entry(fragment.signature)
                .or_insert_with(|| Occurrences::new(&fragment.text))
                .record(path);
        }
    }

    let mut findings: Vec<Finding> = seen
        .into_iter()
        .filter(|(_, occ)| occ.count > 1)
        .map(|(signature, occ)| occ.into_finding(signature))
        .collect();
    findings.sort_by(|a, b| a.files.cmp(&b.files).then_with(|| a.preview.cmp(&b.preview)));
    tracing::info!(
        "{} documents, {} duplicated {}s",
        documents.len(),
        findings.len(),
        context
    );

    Ok(Detection {
        target: Target::Duplicate,
        context,
        documents: documents.len(),
        findings,
    })
}

/// Split `text` into hashed fragments of the requested granularity.
/// Lines starting with `directive_prefix` are markup, not prose.
pub fn fragments(text: &str, directive_prefix: &str, context: Context) -> Vec<Fragment> {
    let mut out = Vec::new();
    for paragraph in paragraphs(text, directive_prefix) {
        let sentences: Vec<Fragment> = sentences(&paragraph)
            .into_iter()
            .filter_map(|s| {
                let simplified = simplify(s);
                (!simplified.is_empty()).then(|| Fragment {
                    signature: digest(simplified.as_bytes()),
                    text: s.to_string(),
                })
            })
            .collect();
        match context {
            Context::Sentence => out.extend(sentences),
            Context::Paragraph if !sentences.is_empty() => {
                let joined: String = sentences.iter().map(|s| s.signature.as_str()).collect();
                out.push(Fragment {
                    signature: digest(joined.as_bytes()),
                    text: paragraph,
                });
            }
            Context::Paragraph => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

struct Occurrences {
    preview: String,
    count: usize,
    files: Vec<PathBuf>,
}

impl Occurrences {
    fn new(text: &str) -> Self {
        Self {
            preview: text.chars().take(PREVIEW_LEN).collect(),
            count: 0,
            files: Vec::new(),
        }
    }

    fn record(&mut self, path: &Path) {
        self.count += 1;
        if !self.files.iter().any(|f| f == path) {
            self.files.push(path.to_path_buf());
        }
    }

    fn into_finding(mut self, signature: String) -> Finding {
        self.files.sort();
        Finding {
            signature,
            preview: self.preview,
            occurrences: self.count,
            files: self.files,
        }
    }
}

fn collect_documents(dir: &Path, format: &str, out: &mut Vec<PathBuf>) -> Result<(), DetectError> {
    for entry in fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        if file_type.is_dir() {
            collect_documents(&path, format, out)?;
        } else if entry.file_name().to_string_lossy().ends_with(format) {
            out.push(path);
        }
    }
    Ok(())
}

/// Runs of non-blank lines, joined with single spaces. Skipped lines
/// neither contribute text nor end a paragraph.
fn paragraphs(text: &str, skip_prefix: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if !skip_prefix.is_empty() && line.starts_with(skip_prefix) {
            continue;
        }
        if line.is_empty() {
            if !current.is_empty() {
                out.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out
}

/// Split after `.`, `!` or `?` followed by whitespace or the end of text.
fn sentences(paragraph: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if at_boundary {
            let end = idx + c.len_utf8();
            let sentence = paragraph[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
    }
    let rest = paragraph[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

fn simplify(sentence: &str) -> String {
    sentence
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation())
        .flat_map(char::to_lowercase)
        .collect()
}

fn starts_alphanumeric(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_alphanumeric)
}

fn digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
