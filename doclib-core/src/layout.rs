//! On-disk layout of the library, the registry documents and the workspace.
//!
//! ```text
//! <data_dir>/
//!   <lib>/<signature>                 (library copies, one per asset)
//!   <meta>/<product>.<suffix>         (registry document, product lower-cased)
//! <workspace>/
//!   <PRODUCT>/<doc_source>/<target_subdirectory>/<name>
//! ```

use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::ConfigError;
use crate::types::{AssetRecord, ProductCode, Signature};

/// Resolved directory layout for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    data_dir: PathBuf,
    workspace_dir: PathBuf,
    meta_dir_name: String,
    lib_dir_name: String,
    doc_source_dir_name: String,
    data_file_suffix: String,
}

impl Layout {
    /// Build the layout, filling unset roots from platform defaults.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let data_dir = match &settings.path.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .map(|dir| dir.join("doclib"))
                .ok_or(ConfigError::NoDefaultDir { what: "data directory" })?,
        };
        let workspace_dir = match &settings.path.workspace {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .map(|dir| dir.join("doclib-workspace"))
                .ok_or(ConfigError::NoDefaultDir { what: "workspace directory" })?,
        };
        Ok(Self::new(data_dir, workspace_dir, settings))
    }

    /// Explicit roots; names and suffix still come from `settings`.
    pub fn new(data_dir: PathBuf, workspace_dir: PathBuf, settings: &Settings) -> Self {
        Self {
            data_dir,
            workspace_dir,
            meta_dir_name: settings.dir_name.meta.clone(),
            lib_dir_name: settings.dir_name.lib.clone(),
            doc_source_dir_name: settings.dir_name.doc_source.clone(),
            data_file_suffix: settings.data_file_suffix.clone(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// `<data_dir>/<lib>`
    pub fn library_dir(&self) -> PathBuf {
        self.data_dir.join(&self.lib_dir_name)
    }

    /// `<data_dir>/<meta>`
    pub fn meta_dir(&self) -> PathBuf {
        self.data_dir.join(&self.meta_dir_name)
    }

    /// `<data_dir>/<meta>/<product lower-case>.<suffix>`. Pure, no I/O.
    pub fn registry_path(&self, product: &ProductCode) -> PathBuf {
        self.meta_dir().join(format!(
            "{}.{}",
            product.as_str().to_lowercase(),
            self.data_file_suffix
        ))
    }

    /// `<data_dir>/<lib>/<signature>`
    pub fn library_file(&self, signature: &Signature) -> PathBuf {
        self.library_dir().join(signature.as_str())
    }

    /// `<workspace>/<PRODUCT>`
    pub fn product_workspace(&self, product: &ProductCode) -> PathBuf {
        self.workspace_dir.join(product.as_str())
    }

    /// `<source>/<doc_source>`, where a tree walk starts.
    pub fn doc_root(&self, tree: &Path) -> PathBuf {
        if self.doc_source_dir_name.is_empty() {
            tree.to_path_buf()
        } else {
            tree.join(&self.doc_source_dir_name)
        }
    }

    /// `<workspace>/<PRODUCT>/<doc_source>/<target_subdirectory>`
    pub fn workspace_dir_for(&self, product: &ProductCode, record: &AssetRecord) -> PathBuf {
        join_relative(
            &self.doc_root(&self.product_workspace(product)),
            &record.target_subdirectory,
        )
    }

    /// `<workspace>/<PRODUCT>/<doc_source>/<target_subdirectory>/<name>`
    pub fn workspace_file(&self, product: &ProductCode, record: &AssetRecord) -> PathBuf {
        self.workspace_dir_for(product, record).join(&record.name)
    }
}

/// Join a `/`-separated relative directory onto `base`.
pub fn join_relative(base: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(base.to_path_buf(), |path, segment| path.join(segment))
}
