//! Per-product signature registry.
//!
//! # Storage layout
//!
//! ```text
//! <data_dir>/meta/
//!   <product>.yaml        (signature -> record mapping)
//!   <product>.yaml.lock   (advisory lock file, holds the owner pid)
//! ```
//!
//! A registry is a plain value: construct it per operation, [`lock`] it,
//! [`load`] once, [`register`] as assets are discovered, [`save`] once.
//! Nothing is cached between operations.
//!
//! The lock is an OS advisory lock on `<product>.yaml.lock`. The kernel drops
//! it when the owning process exits, so a lock file left behind by a crashed
//! run never blocks the next one.
//!
//! [`lock`]: SignatureRegistry::lock
//! [`load`]: SignatureRegistry::load
//! [`register`]: SignatureRegistry::register
//! [`save`]: SignatureRegistry::save

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sha2::{Digest, Sha256};

use crate::config::Settings;
use crate::error::{io_err, RegistryError};
use crate::layout::Layout;
use crate::types::{AssetRecord, ContentKey, ProductCode, Signature};

// ---------------------------------------------------------------------------
// 1. Content keys
// ---------------------------------------------------------------------------

/// Digest of `(product, relative directory)` truncated to `key_length` hex chars.
///
/// Hashes the UTF-8 string `"<PRODUCT>/<relative_directory>"` with SHA-256.
/// Pure: identical inputs always give identical keys.
pub fn compute_key(product: &ProductCode, relative_directory: &str, key_length: usize) -> ContentKey {
    let digest = {
        let mut h = Sha256::new();
        h.update(product.as_str().as_bytes());
        h.update(b"/");
        h.update(relative_directory.as_bytes());
        hex::encode(h.finalize())
    };
    let len = key_length.min(digest.len());
    ContentKey(digest[..len].to_string())
}

// ---------------------------------------------------------------------------
// 2. Outcomes
// ---------------------------------------------------------------------------

/// Result of [`SignatureRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The signature was new; the record is now part of the registry.
    Inserted(Signature),
    /// A record with this signature exists already; nothing changed.
    AlreadyRegistered(Signature),
}

impl Registration {
    pub fn signature(&self) -> &Signature {
        match self {
            Registration::Inserted(s) | Registration::AlreadyRegistered(s) => s,
        }
    }
}

/// Result of [`SignatureRegistry::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The backing document existed and yielded this many records.
    Loaded(usize),
    /// No backing document yet; the registry is empty.
    Missing,
}

// ---------------------------------------------------------------------------
// 3. Registry
// ---------------------------------------------------------------------------

/// Content-addressable store of [`AssetRecord`]s for one product.
#[derive(Debug, Clone)]
pub struct SignatureRegistry {
    product: ProductCode,
    path: PathBuf,
    separator: String,
    key_length: usize,
    records: HashMap<Signature, AssetRecord>,
}

impl SignatureRegistry {
    pub fn new(
        product: ProductCode,
        path: PathBuf,
        separator: impl Into<String>,
        key_length: usize,
    ) -> Self {
        Self {
            product,
            path,
            separator: separator.into(),
            key_length,
            records: HashMap::new(),
        }
    }

    /// Empty registry backed by the product's document under `layout`.
    pub fn for_product(layout: &Layout, settings: &Settings, product: &ProductCode) -> Self {
        Self::new(
            product.clone(),
            layout.registry_path(product),
            settings.sep.code.clone(),
            settings.key_length,
        )
    }

    pub fn product(&self) -> &ProductCode {
        &self.product
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Content key of `relative_directory` within this registry's product.
    pub fn compute_key(&self, relative_directory: &str) -> ContentKey {
        compute_key(&self.product, relative_directory, self.key_length)
    }

    /// Insert `record` unless its signature is already present.
    pub fn register(&mut self, record: AssetRecord) -> Registration {
        let signature = record.signature(&self.separator);
        if self.records.contains_key(&signature) {
            tracing::debug!("already registered: {signature}");
            return Registration::AlreadyRegistered(signature);
        }
        tracing::debug!("registered: {signature}");
        self.records.insert(signature.clone(), record);
        Registration::Inserted(signature)
    }

    pub fn get(&self, signature: &Signature) -> Option<&AssetRecord> {
        self.records.get(signature)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, in no particular order.
    pub fn contents(&self) -> impl Iterator<Item = (&Signature, &AssetRecord)> {
        self.records.iter()
    }

    /// Merge the backing document into this registry.
    ///
    /// A missing document is not an error. Records go through [`register`],
    /// so a document can never introduce a duplicate signature.
    ///
    /// [`register`]: SignatureRegistry::register
    pub fn load(&mut self) -> Result<LoadStatus, RegistryError> {
        if !self.path.exists() {
            return Ok(LoadStatus::Missing);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(LoadStatus::Loaded(0));
        }
        let document: HashMap<String, AssetRecord> =
            serde_yaml::from_str(&contents).map_err(|source| RegistryError::Parse {
                path: self.path.clone(),
                source,
            })?;
        let count = document.len();
        for (_, record) in document {
            self.register(record);
        }
        Ok(LoadStatus::Loaded(count))
    }

    /// Take the exclusive lock on this registry's document.
    ///
    /// Hold the returned guard across `load` → `register` → `save` so that
    /// overlapping operations cannot drop each other's inserts.
    pub fn lock(&self) -> Result<RegistryLock, RegistryError> {
        RegistryLock::acquire(&self.path)
    }

    /// Atomically write the full mapping to the backing document.
    ///
    /// Write flow: serialize → `<path>.tmp` → `rename`, under `lock`. The
    /// `.tmp` sibling lives in the same directory as the target, so the
    /// rename never crosses filesystems.
    pub fn save(&self, lock: &RegistryLock) -> Result<(), RegistryError> {
        if lock.registry != self.path {
            return Err(RegistryError::WrongLock {
                path: self.path.clone(),
                lock: lock.path.clone(),
            });
        }
        let dir = registry_dir(&self.path)?;
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        // Sorted output keeps library commits diffable.
        let sorted: BTreeMap<&Signature, &AssetRecord> = self.records.iter().collect();
        let yaml = serde_yaml::to_string(&sorted)?;
        let tmp = sibling(&self.path, "tmp");
        std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        tracing::info!("saved registry: {} ({} records)", self.path.display(), self.len());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Exclusive advisory lock on a registry document, released on drop.
///
/// The lock file itself stays on disk; only the OS lock on it matters.
#[derive(Debug)]
pub struct RegistryLock {
    registry: PathBuf,
    path: PathBuf,
    file: File,
}

impl RegistryLock {
    fn acquire(registry_path: &Path) -> Result<Self, RegistryError> {
        let dir = registry_dir(registry_path)?;
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let path = sibling(registry_path, "lock");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;
        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(RegistryError::Locked {
                    path: registry_path.to_path_buf(),
                    lock: path,
                });
            }
            return Err(io_err(&path, e));
        }

        // Owner pid, for humans inspecting a busy registry.
        let owner = file
            .set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()));
        if let Err(e) = owner {
            tracing::debug!("cannot record lock owner in {}: {e}", path.display());
        }
        tracing::debug!("locked registry: {}", registry_path.display());
        Ok(Self {
            registry: registry_path.to_path_buf(),
            path,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn registry_dir(path: &Path) -> Result<&Path, RegistryError> {
    path.parent()
        .ok_or_else(|| io_err(path, std::io::Error::other("invalid registry path")))
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    PathBuf::from(format!("{}.{extension}", path.display()))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry_in(dir: &TempDir) -> SignatureRegistry {
        SignatureRegistry::new(
            ProductCode::from("abc"),
            dir.path().join("meta").join("abc.yaml"),
            "-",
            8,
        )
    }

    fn record(reg: &SignatureRegistry, name: &str, dir: &str) -> AssetRecord {
        AssetRecord::new(name, dir, reg.compute_key(dir))
    }

    #[test]
    fn key_is_deterministic_and_fixed_length() {
        let p = ProductCode::from("ABC");
        let a = compute_key(&p, "docs", 8);
        let b = compute_key(&p, "docs", 8);
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 8);
        assert!(a.0.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn key_depends_on_product_and_directory() {
        let abc = ProductCode::from("ABC");
        let xyz = ProductCode::from("XYZ");
        assert_ne!(compute_key(&abc, "docs", 16), compute_key(&xyz, "docs", 16));
        assert_ne!(compute_key(&abc, "docs", 16), compute_key(&abc, "guide", 16));
    }

    #[test]
    fn key_length_is_capped_at_digest_size() {
        let key = compute_key(&ProductCode::from("ABC"), "", 500);
        assert_eq!(key.0.len(), 64);
    }

    #[test]
    fn register_twice_is_rejected_without_change() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry_in(&tmp);
        let rec = record(&reg, "intro.md", "docs");

        assert!(matches!(reg.register(rec.clone()), Registration::Inserted(_)));
        assert_eq!(reg.len(), 1);
        assert!(matches!(
            reg.register(rec),
            Registration::AlreadyRegistered(_)
        ));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn same_name_in_different_directories_coexists() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry_in(&tmp);
        let a = record(&reg, "index.md", "guide");
        let b = record(&reg, "index.md", "api");
        reg.register(a);
        reg.register(b);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn load_missing_document_is_empty() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry_in(&tmp);
        assert_eq!(reg.load().unwrap(), LoadStatus::Missing);
        assert!(reg.is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry_in(&tmp);
        let rec = record(&reg, "intro.md", "docs");
        let sig = rec.signature("-");
        reg.register(rec.clone());
        let lock = reg.lock().expect("lock");
        reg.save(&lock).expect("save");

        let mut loaded = registry_in(&tmp);
        assert_eq!(loaded.load().unwrap(), LoadStatus::Loaded(1));
        assert_eq!(loaded.get(&sig), Some(&rec));
    }

    #[test]
    fn save_leaves_no_tmp_and_records_owner() {
        let tmp = TempDir::new().unwrap();
        let reg = registry_in(&tmp);
        let lock = reg.lock().expect("lock");
        reg.save(&lock).expect("save");
        assert!(reg.path().exists());
        assert!(!sibling(reg.path(), "tmp").exists());
        let owner = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
    }

    #[test]
    fn held_lock_blocks_second_locker() {
        let tmp = TempDir::new().unwrap();
        let reg = registry_in(&tmp);
        let _held = reg.lock().expect("first lock");

        let err = registry_in(&tmp).lock().unwrap_err();
        assert!(matches!(err, RegistryError::Locked { .. }), "got: {err}");
    }

    #[test]
    fn dropped_lock_can_be_retaken() {
        let tmp = TempDir::new().unwrap();
        let reg = registry_in(&tmp);
        drop(reg.lock().expect("first lock"));
        reg.lock().expect("second lock");
    }

    #[test]
    fn lock_for_other_registry_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let reg = registry_in(&tmp);
        let other = SignatureRegistry::new(
            ProductCode::from("xyz"),
            tmp.path().join("meta").join("xyz.yaml"),
            "-",
            8,
        );
        let lock = other.lock().expect("lock");
        let err = reg.save(&lock).unwrap_err();
        assert!(matches!(err, RegistryError::WrongLock { .. }), "got: {err}");
        assert!(!reg.path().exists());
    }

    #[test]
    fn empty_document_loads_as_zero_records() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry_in(&tmp);
        std::fs::create_dir_all(reg.path().parent().unwrap()).unwrap();
        std::fs::write(reg.path(), "\n").unwrap();
        assert_eq!(reg.load().unwrap(), LoadStatus::Loaded(0));
    }
}
