//! Settings layout.
//!
//! Settings come from one YAML document. Every section is `#[serde(default)]`
//! so a partial file only overrides what it names. File lookup order is
//! decided by [`Settings::resolve`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Directory name under the platform config dir that holds `options.yaml`.
pub const SETTINGS_DIR: &str = "doclib";
pub const SETTINGS_FILE: &str = "options.yaml";

/// Runtime settings shared by every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Suffix a registry record's name must end with to take part in `merge`.
    pub default_doc_format: String,
    /// Extensions (without the dot) collected by `add` and `checkin`.
    pub doc_file_extensions: Vec<String>,
    /// Number of hex characters kept from the content digest.
    pub key_length: usize,
    /// Extension of registry documents, e.g. `abc.yaml`.
    pub data_file_suffix: String,
    pub require_project_code_in_ticket: bool,
    /// Look tickets up in Jira before falling back to manual entry.
    pub allow_remote_requests: bool,
    /// Open a ticket branch in the workspace repository on checkout.
    pub git_in_workspace: bool,
    pub jira_site: Option<String>,
    pub request_timeout_secs: u64,
    pub main_branch: String,
    pub branch_match: BranchMatch,
    pub path: PathSettings,
    pub dir_name: DirNames,
    pub sep: Separators,
    pub directive: DirectiveSettings,
    pub message: MessageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_doc_format: ".md".to_string(),
            doc_file_extensions: vec!["md".to_string(), "rst".to_string(), "txt".to_string()],
            key_length: 8,
            data_file_suffix: "yaml".to_string(),
            require_project_code_in_ticket: false,
            allow_remote_requests: false,
            git_in_workspace: true,
            jira_site: None,
            request_timeout_secs: 10,
            main_branch: "main".to_string(),
            branch_match: BranchMatch::default(),
            path: PathSettings::default(),
            dir_name: DirNames::default(),
            sep: Separators::default(),
            directive: DirectiveSettings::default(),
            message: MessageSettings::default(),
        }
    }
}

/// How `checkin` treats several branches starting with the ticket id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BranchMatch {
    /// Take the first match in lexical order.
    #[default]
    FirstMatch,
    /// Refuse to continue when more than one branch matches.
    Strict,
}

/// Root directories. `None` falls back to a platform default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PathSettings {
    /// Holds the library, the registry documents and the library repository.
    pub data_dir: Option<PathBuf>,
    /// Holds one checkout directory per product.
    pub workspace: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirNames {
    pub meta: String,
    pub lib: String,
    /// Document root inside a source tree or a product checkout. May be empty.
    pub doc_source: String,
}

impl Default for DirNames {
    fn default() -> Self {
        Self {
            meta: "meta".to_string(),
            lib: "lib".to_string(),
            doc_source: "docs".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Separators {
    /// Joins signatures, ticket ids and branch name segments.
    pub code: String,
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            code: "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectiveSettings {
    pub prefix: String,
    pub name_space_sep: String,
    pub value_sep: String,
    pub default_name_space: String,
}

impl Default for DirectiveSettings {
    fn default() -> Self {
        Self {
            prefix: "..".to_string(),
            name_space_sep: ":".to_string(),
            value_sep: "=".to_string(),
            default_name_space: "dl".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageSettings {
    pub screen_width: usize,
    pub horizontal_line: String,
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            screen_width: 79,
            horizontal_line: "-".to_string(),
        }
    }
}

impl FromStr for Settings {
    type Err = serde_yaml::Error;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        // An empty document is valid and means "all defaults".
        if data.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_yaml::from_str(data)
    }
}

impl Settings {
    /// Read and validate settings from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = contents.parse().map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolve settings for one invocation.
    ///
    /// An explicit path must exist. Without one, `<config_dir>/doclib/options.yaml`
    /// is used when present, defaults otherwise.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_settings_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                tracing::debug!("no settings file found, using defaults");
                Ok(Settings::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=64).contains(&self.key_length) {
            return Err(ConfigError::Invalid {
                field: "key_length",
                reason: format!("{} is outside 1..=64", self.key_length),
            });
        }
        let non_empty = [
            ("sep.code", &self.sep.code),
            ("directive.prefix", &self.directive.prefix),
            ("directive.name_space_sep", &self.directive.name_space_sep),
            ("directive.value_sep", &self.directive.value_sep),
            ("data_file_suffix", &self.data_file_suffix),
            ("main_branch", &self.main_branch),
        ];
        for (field, value) in non_empty {
            if value.is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must not be empty".to_string(),
                });
            }
        }
        if self.directive.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "directive.prefix",
                reason: "must be a single token".to_string(),
            });
        }
        Ok(())
    }

    /// Whether `file_name` carries one of the collected document extensions.
    ///
    /// The extension is the text after the last `.`; a name without a dot is
    /// compared as a whole.
    pub fn is_doc_file(&self, file_name: &str) -> bool {
        let ext = file_name.rsplit('.').next().unwrap_or(file_name);
        self.doc_file_extensions.iter().any(|e| e == ext)
    }
}

/// `<config_dir>/doclib/options.yaml`, when the platform has a config dir.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
}
