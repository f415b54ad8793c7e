//! Line grammar for directives embedded in documents.
//!
//! ```text
//! <prefix> <namespace><ns-sep><attribute>[<value-sep>ignored] <value> <value> ...
//! ```
//!
//! Matching is case-insensitive: the line is lower-cased before tokenizing.

use doclib_core::config::{DirectiveSettings, Settings};

use crate::error::DirectiveError;

/// Separators and prefix the parser runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveRules {
    pub prefix: String,
    pub name_space_sep: String,
    pub value_sep: String,
    /// Namespace of the `product` and `version` agents.
    pub default_name_space: String,
}

impl DirectiveRules {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::from(&settings.directive)
    }

    /// `namespace + ns-sep + attribute`, lower-cased.
    pub fn group_key(&self, namespace: &str, attribute: &str) -> String {
        format!("{namespace}{}{attribute}", self.name_space_sep).to_lowercase()
    }
}

impl From<&DirectiveSettings> for DirectiveRules {
    fn from(d: &DirectiveSettings) -> Self {
        Self {
            prefix: d.prefix.clone(),
            name_space_sep: d.name_space_sep.clone(),
            value_sep: d.value_sep.clone(),
            default_name_space: d.default_name_space.clone(),
        }
    }
}

impl Default for DirectiveRules {
    fn default() -> Self {
        Self::from(&DirectiveSettings::default())
    }
}

/// One parsed directive line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub prefix: String,
    pub namespace: String,
    pub attribute: String,
    pub values: Vec<String>,
}

impl Directive {
    pub fn group_key(&self, rules: &DirectiveRules) -> String {
        rules.group_key(&self.namespace, &self.attribute)
    }

    /// Values joined with a single space.
    pub fn joined_values(&self) -> String {
        self.values.join(" ")
    }
}

/// Parse one line. Never panics; anything that is not a directive is an `Err`.
pub fn parse_line(line: &str, rules: &DirectiveRules) -> Result<Directive, DirectiveError> {
    let lowered = line.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(DirectiveError::TooFewTokens {
            found: tokens.len(),
        });
    }
    if tokens[0] != rules.prefix {
        return Err(DirectiveError::PrefixMismatch {
            expected: rules.prefix.clone(),
            found: tokens[0].to_string(),
        });
    }

    let (namespace, rest) = tokens[1]
        .split_once(rules.name_space_sep.as_str())
        .unwrap_or((tokens[1], ""));
    // Anything after the value separator is dropped.
    let attribute = rest
        .split_once(rules.value_sep.as_str())
        .map_or(rest, |(before, _)| before);

    Ok(Directive {
        prefix: tokens[0].to_string(),
        namespace: namespace.to_string(),
        attribute: attribute.to_string(),
        values: tokens[2..].iter().map(|t| t.to_string()).collect(),
    })
}
