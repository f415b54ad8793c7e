//! Filesystem port and its local implementation.
//!
//! ## `LocalFs::copy` protocol
//!
//! 1. Read the source bytes.
//! 2. SHA-256 hash them and the destination's current bytes, if any.
//! 3. Identical digests → skip.
//! 4. Write to `<dst>.doclib.tmp`.
//! 5. Rename to the final path (atomic on POSIX).

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

/// One directory visited by [`Filesystem::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub dir: PathBuf,
    /// File names directly inside `dir`, sorted.
    pub files: Vec<String>,
}

/// Outcome of an individual file copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Destination was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// Destination already held identical bytes.
    Unchanged { path: PathBuf },
}

impl CopyOutcome {
    pub fn path(&self) -> &Path {
        match self {
            CopyOutcome::Written { path } | CopyOutcome::Unchanged { path } => path,
        }
    }
}

/// File access used by the orchestrator.
pub trait Filesystem {
    /// Every directory under `root` (inclusive) with its files. A missing root
    /// yields no entries.
    fn walk(&self, root: &Path) -> Result<Vec<WalkEntry>, SyncError>;

    /// Byte-preserving copy; parent directories of `to` are created.
    fn copy(&self, from: &Path, to: &Path) -> Result<CopyOutcome, SyncError>;

    fn make_dirs(&self, path: &Path) -> Result<(), SyncError>;

    fn read_to_string(&self, path: &Path) -> Result<String, SyncError>;
}

/// [`Filesystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl Filesystem for LocalFs {
    fn walk(&self, root: &Path) -> Result<Vec<WalkEntry>, SyncError> {
        let mut out = Vec::new();
        if !root.is_dir() {
            tracing::debug!("walk root missing: {}", root.display());
            return Ok(out);
        }
        walk_dir(root, &mut out)?;
        Ok(out)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<CopyOutcome, SyncError> {
        let tmp = PathBuf::from(format!("{}.doclib.tmp", to.display()));
        copy_with_tmp(from, to, &tmp)
    }

    fn make_dirs(&self, path: &Path) -> Result<(), SyncError> {
        std::fs::create_dir_all(path).map_err(|e| io_err(path, e))
    }

    fn read_to_string(&self, path: &Path) -> Result<String, SyncError> {
        std::fs::read_to_string(path).map_err(|e| io_err(path, e))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn walk_dir(dir: &Path, out: &mut Vec<WalkEntry>) -> Result<(), SyncError> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        if file_type.is_dir() {
            subdirs.push(path);
        } else if file_type.is_file() {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files.sort();
    subdirs.sort();
    out.push(WalkEntry {
        dir: dir.to_path_buf(),
        files,
    });
    for sub in subdirs {
        walk_dir(&sub, out)?;
    }
    Ok(())
}

fn digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

fn copy_with_tmp(from: &Path, to: &Path, tmp: &Path) -> Result<CopyOutcome, SyncError> {
    let content = std::fs::read(from).map_err(|e| io_err(from, e))?;

    if to.is_file() {
        let existing = std::fs::read(to).map_err(|e| io_err(to, e))?;
        if digest(&existing) == digest(&content) {
            tracing::debug!("unchanged: {}", to.display());
            return Ok(CopyOutcome::Unchanged {
                path: to.to_path_buf(),
            });
        }
    }

    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Some(tmp_parent) = tmp.parent() {
        std::fs::create_dir_all(tmp_parent).map_err(|e| io_err(tmp_parent, e))?;
    }
    std::fs::write(tmp, &content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, to) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(to, e));
    }

    tracing::debug!("copied: {} -> {}", from.display(), to.display());
    Ok(CopyOutcome::Written {
        path: to.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn source(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn first_copy_returns_written() {
        let tmp = TempDir::new().unwrap();
        let from = source(&tmp, "a.md", "hello");
        let to = tmp.path().join("lib").join("a.md-1234");
        let result = LocalFs.copy(&from, &to).unwrap();
        assert!(matches!(result, CopyOutcome::Written { .. }));
        assert_eq!(fs::read_to_string(&to).unwrap(), "hello");
    }

    #[test]
    fn second_copy_same_bytes_returns_unchanged() {
        let tmp = TempDir::new().unwrap();
        let from = source(&tmp, "a.md", "same");
        let to = tmp.path().join("b.md");
        LocalFs.copy(&from, &to).unwrap();
        let result = LocalFs.copy(&from, &to).unwrap();
        assert!(matches!(result, CopyOutcome::Unchanged { .. }));
    }

    #[test]
    fn changed_source_returns_written() {
        let tmp = TempDir::new().unwrap();
        let from = source(&tmp, "a.md", "v1");
        let to = tmp.path().join("b.md");
        LocalFs.copy(&from, &to).unwrap();
        fs::write(&from, "v2").unwrap();
        let result = LocalFs.copy(&from, &to).unwrap();
        assert!(matches!(result, CopyOutcome::Written { .. }));
        assert_eq!(fs::read_to_string(&to).unwrap(), "v2");
    }

    #[test]
    fn bytes_are_preserved() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("crlf.md");
        fs::write(&from, b"line1\r\nline2\r\n\xff").unwrap();
        let to = tmp.path().join("out.md");
        LocalFs.copy(&from, &to).unwrap();
        assert_eq!(fs::read(&to).unwrap(), b"line1\r\nline2\r\n\xff");
    }

    #[test]
    fn tmp_file_removed_after_copy() {
        let tmp = TempDir::new().unwrap();
        let from = source(&tmp, "a.md", "data");
        let to = tmp.path().join("clean.md");
        LocalFs.copy(&from, &to).unwrap();
        let tmp_path = PathBuf::from(format!("{}.doclib.tmp", to.display()));
        assert!(!tmp_path.exists(), ".doclib.tmp must be cleaned up");
    }

    #[test]
    fn missing_source_is_an_io_error_with_path() {
        let tmp = TempDir::new().unwrap();
        let err = LocalFs
            .copy(&tmp.path().join("nope.md"), &tmp.path().join("out.md"))
            .unwrap_err();
        assert!(err.to_string().contains("nope.md"));
    }

    #[test]
    fn walk_lists_every_directory_in_order() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("b/c")).unwrap();
        fs::create_dir_all(tmp.path().join("a")).unwrap();
        fs::write(tmp.path().join("root.md"), "").unwrap();
        fs::write(tmp.path().join("a/x.md"), "").unwrap();
        fs::write(tmp.path().join("b/c/z.rst"), "").unwrap();
        fs::write(tmp.path().join("b/c/y.md"), "").unwrap();

        let entries = LocalFs.walk(tmp.path()).unwrap();
        let dirs: Vec<_> = entries
            .iter()
            .map(|e| e.dir.strip_prefix(tmp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            dirs,
            vec![
                PathBuf::from(""),
                PathBuf::from("a"),
                PathBuf::from("b"),
                PathBuf::from("b/c"),
            ]
        );
        assert_eq!(entries[0].files, vec!["root.md"]);
        assert_eq!(entries[3].files, vec!["y.md", "z.rst"]);
    }

    #[test]
    fn walk_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(LocalFs.walk(&tmp.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let from = source(&root, "new.md", "new content");
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();
        let to = readonly_dir.join("file.md");
        fs::write(&to, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("file.md.doclib.tmp");
        let result = copy_with_tmp(&from, &to, &tmp_path);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Running as root ignores directory permissions.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&to).unwrap(), "original");
            assert!(!tmp_path.exists(), ".doclib.tmp should be cleaned up");
        }
    }
}
