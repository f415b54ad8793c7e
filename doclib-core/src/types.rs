//! Domain types for the doclib asset registry.
//!
//! All path fields use `PathBuf`; relative library directories are stored as
//! `/`-separated strings so registry documents are portable between hosts.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Product identity. Always trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductCode(String);

impl ProductCode {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Version component of the product code: everything after the last
    /// `sep`, or the whole code when `sep` does not occur.
    pub fn version(&self, sep: &str) -> &str {
        match self.0.rfind(sep) {
            Some(idx) if !sep.is_empty() => &self.0[idx + sep.len()..],
            _ => &self.0,
        }
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProductCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ProductCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Ticket identifier (e.g. `ABC-123`). Always trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TicketId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for TicketId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Truncated digest of `(product, relative directory)`. Opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(pub String);

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ContentKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Registry key of an asset: `name + separator + content key`. Doubles as the
/// asset's file name inside the library directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub String);

impl Signature {
    pub fn compose(name: &str, key: &ContentKey, sep: &str) -> Self {
        Self(format!("{name}{sep}{}", key.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One tracked documentation file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// File name, e.g. `intro.md`.
    pub name: String,
    /// Directory relative to the product's document root (`""` for the root).
    pub target_subdirectory: String,
    pub content_key: ContentKey,
}

impl AssetRecord {
    pub fn new(
        name: impl Into<String>,
        target_subdirectory: impl Into<String>,
        content_key: ContentKey,
    ) -> Self {
        Self {
            name: name.into(),
            target_subdirectory: target_subdirectory.into(),
            content_key,
        }
    }

    pub fn signature(&self, sep: &str) -> Signature {
        Signature::compose(&self.name, &self.content_key, sep)
    }
}

/// Top level operations of the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationName {
    Add,
    Checkout,
    Checkin,
    Merge,
    Detect,
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationName::Add => write!(f, "add"),
            OperationName::Checkout => write!(f, "checkout"),
            OperationName::Checkin => write!(f, "checkin"),
            OperationName::Merge => write!(f, "merge"),
            OperationName::Detect => write!(f, "detect"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_code_is_normalized() {
        assert_eq!(ProductCode::from("  abc-2 ").as_str(), "ABC-2");
        assert_eq!(TicketId::from("abc-123").to_string(), "ABC-123");
    }

    #[test]
    fn product_version_uses_last_separator() {
        assert_eq!(ProductCode::from("abc-core-2").version("-"), "2");
        assert_eq!(ProductCode::from("abc").version("-"), "ABC");
    }

    #[test]
    fn signature_joins_name_and_key() {
        let record = AssetRecord::new("intro.md", "docs", ContentKey::from("1a2b3c4d"));
        assert_eq!(record.signature("-").as_str(), "intro.md-1a2b3c4d");
    }

    #[test]
    fn record_yaml_uses_field_names() {
        let record = AssetRecord::new("intro.md", "docs", ContentKey::from("1a2b3c4d"));
        let yaml = serde_yaml::to_string(&record).expect("serialize");
        assert!(yaml.contains("target_subdirectory: docs"));
        assert!(yaml.contains("content_key: 1a2b3c4d"));
        let back: AssetRecord = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(back, record);
    }
}
