//! Agent table: directive group keys bound to effect-producing handlers.
//!
//! | Kind    | Namespace           | Attribute | Effect                          |
//! |---------|---------------------|-----------|---------------------------------|
//! | Auto    | `only`              | *(none)*  | copy document to sibling products |
//! | Product | default (`dl`)      | `product` | observe                         |
//! | Version | default (`dl`)      | `version` | observe                         |
//!
//! Handlers never touch the filesystem. They return [`Effect`]s which the
//! caller applies.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use doclib_core::types::ProductCode;

use crate::error::AgentError;
use crate::index::DirectiveIndex;
use crate::parser::DirectiveRules;

// ---------------------------------------------------------------------------
// AgentKind
// ---------------------------------------------------------------------------

/// Namespace of the Auto agent.
pub const AUTO_NAME_SPACE: &str = "only";

/// Built-in agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentKind {
    Auto,
    Product,
    Version,
}

impl AgentKind {
    /// All agent variants in a stable order.
    pub fn all() -> &'static [AgentKind] {
        &[AgentKind::Auto, AgentKind::Product, AgentKind::Version]
    }

    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::Auto => "auto",
            AgentKind::Product => "product",
            AgentKind::Version => "version",
        }
    }

    pub fn attribute(&self) -> &'static str {
        match self {
            AgentKind::Auto => "",
            AgentKind::Product => "product",
            AgentKind::Version => "version",
        }
    }

    pub fn name_space<'a>(&self, rules: &'a DirectiveRules) -> &'a str {
        match self {
            AgentKind::Auto => AUTO_NAME_SPACE,
            AgentKind::Product | AgentKind::Version => &rules.default_name_space,
        }
    }

    /// Group key this agent is bound to, e.g. `only:` or `dl:product`.
    pub fn key(&self, rules: &DirectiveRules) -> String {
        rules.group_key(self.name_space(rules), self.attribute())
    }

    fn handler(&self) -> Handler {
        match self {
            AgentKind::Auto => auto_agent,
            AgentKind::Product | AgentKind::Version => observe_agent,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AgentKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentKind::all()
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AgentError::UnknownKind(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Handler contract
// ---------------------------------------------------------------------------

/// What an agent run sees of the world.
#[derive(Debug, Clone, Copy)]
pub struct AgentEnv<'a> {
    /// Product the merge runs for.
    pub product: &'a ProductCode,
    pub code_sep: &'a str,
    /// Directory holding one tree per product (`<workspace>/<PRODUCT>/...`).
    pub workspace: &'a Path,
}

/// The document an agent is invoked for.
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    /// Workspace path of the document.
    pub path: &'a Path,
}

/// Side effect requested by an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Copy `from` verbatim to `to`, creating parent directories.
    Copy {
        from: PathBuf,
        to: PathBuf,
        sibling: ProductCode,
    },
    /// Record that the agent saw `values`; no filesystem change.
    Observe {
        key: String,
        document: PathBuf,
        values: Vec<String>,
    },
}

/// `(environment, document, group key, value set) -> effects`.
pub type Handler =
    fn(&AgentEnv<'_>, &Document<'_>, &str, &BTreeSet<String>) -> Result<Vec<Effect>, AgentError>;

/// Outcome of one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRun {
    pub key: String,
    pub agent: String,
    pub outcome: Result<Vec<Effect>, AgentError>,
}

// ---------------------------------------------------------------------------
// AgentTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    handler: Handler,
}

/// Group key → handler. Keys absent from the table are inert.
#[derive(Debug, Clone, Default)]
pub struct AgentTable {
    entries: BTreeMap<String, Entry>,
}

impl AgentTable {
    /// Table with every built-in agent.
    pub fn standard(rules: &DirectiveRules) -> Self {
        Self::with_kinds(rules, AgentKind::all())
    }

    /// Table restricted to `kinds`.
    pub fn with_kinds(rules: &DirectiveRules, kinds: &[AgentKind]) -> Self {
        let mut table = Self::default();
        for kind in kinds {
            table.register(kind.key(rules), kind.name(), kind.handler());
        }
        table
    }

    /// Bind `handler` to `key`, replacing any previous binding.
    pub fn register(&mut self, key: impl Into<String>, name: impl Into<String>, handler: Handler) {
        self.entries.insert(
            key.into().to_lowercase(),
            Entry {
                name: name.into(),
                handler,
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every handler whose key occurs in `index`, once each.
    pub fn dispatch(
        &self,
        env: &AgentEnv<'_>,
        document: &Document<'_>,
        index: &DirectiveIndex,
    ) -> Vec<AgentRun> {
        index
            .iter()
            .filter_map(|(key, values)| {
                let entry = self.entries.get(key)?;
                tracing::debug!(
                    "agent {} on {} ({} value sets)",
                    entry.name,
                    document.path.display(),
                    values.len()
                );
                Some(AgentRun {
                    key: key.to_string(),
                    agent: entry.name.clone(),
                    outcome: (entry.handler)(env, document, key, values),
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Built-in handlers
// ---------------------------------------------------------------------------

/// Copy the document into every listed sibling product, never the current one.
fn auto_agent(
    env: &AgentEnv<'_>,
    document: &Document<'_>,
    _key: &str,
    values: &BTreeSet<String>,
) -> Result<Vec<Effect>, AgentError> {
    let mut seen = HashSet::new();
    let mut effects = Vec::new();
    for token in values.iter().flat_map(|v| v.split_whitespace()) {
        let sibling = ProductCode::new(token);
        if &sibling == env.product {
            tracing::trace!("auto: skipping current product {sibling}");
            continue;
        }
        if !seen.insert(sibling.clone()) {
            continue;
        }
        let to = substitute_product(env.workspace, document.path, env.product, &sibling)?;
        effects.push(Effect::Copy {
            from: document.path.to_path_buf(),
            to,
            sibling,
        });
    }
    Ok(effects)
}

fn observe_agent(
    env: &AgentEnv<'_>,
    document: &Document<'_>,
    key: &str,
    values: &BTreeSet<String>,
) -> Result<Vec<Effect>, AgentError> {
    tracing::info!(
        "{key} on {} (version {}): {:?}",
        document.path.display(),
        env.product.version(env.code_sep),
        values
    );
    Ok(vec![Effect::Observe {
        key: key.to_string(),
        document: document.path.to_path_buf(),
        values: values.iter().cloned().collect(),
    }])
}

/// Swap the product directory directly under `workspace` for `sibling`.
/// Deeper components are kept as they are, even when they spell a product.
fn substitute_product(
    workspace: &Path,
    path: &Path,
    product: &ProductCode,
    sibling: &ProductCode,
) -> Result<PathBuf, AgentError> {
    let not_in_product = || AgentError::ProductNotInPath {
        path: path.to_path_buf(),
        product: product.to_string(),
    };
    let inside = path
        .strip_prefix(workspace.join(product.as_str()))
        .map_err(|_| not_in_product())?;
    if inside.as_os_str() == OsStr::new("") {
        return Err(not_in_product());
    }
    Ok(workspace.join(sibling.as_str()).join(inside))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn well_known_keys() {
        let rules = DirectiveRules::default();
        assert_eq!(AgentKind::Auto.key(&rules), "only:");
        assert_eq!(AgentKind::Product.key(&rules), "dl:product");
        assert_eq!(AgentKind::Version.key(&rules), "dl:version");
    }

    #[test]
    fn keys_follow_configured_separator() {
        let rules = DirectiveRules {
            name_space_sep: "/".to_string(),
            default_name_space: "Doc".to_string(),
            ..DirectiveRules::default()
        };
        assert_eq!(AgentKind::Version.key(&rules), "doc/version");
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Auto".parse::<AgentKind>().unwrap(), AgentKind::Auto);
        assert!(matches!(
            "nope".parse::<AgentKind>(),
            Err(AgentError::UnknownKind(_))
        ));
    }

    #[test]
    fn substitutes_only_the_product_directory() {
        let target = substitute_product(
            Path::new("/ws"),
            Path::new("/ws/ABC/docs/ABC/intro.md"),
            &ProductCode::from("ABC"),
            &ProductCode::from("XYZ"),
        )
        .unwrap();
        assert_eq!(target, PathBuf::from("/ws/XYZ/docs/ABC/intro.md"));
    }

    #[test]
    fn workspace_named_like_product_is_left_alone() {
        let target = substitute_product(
            Path::new("/home/ABC/ws"),
            Path::new("/home/ABC/ws/ABC/intro.md"),
            &ProductCode::from("ABC"),
            &ProductCode::from("XYZ"),
        )
        .unwrap();
        assert_eq!(target, PathBuf::from("/home/ABC/ws/XYZ/intro.md"));
    }

    #[test]
    fn substitution_requires_product_directory() {
        let err = substitute_product(
            Path::new("/ws"),
            Path::new("/ws/ABCD/intro.md"),
            &ProductCode::from("ABC"),
            &ProductCode::from("XYZ"),
        )
        .unwrap_err();
        assert!(matches!(err, AgentError::ProductNotInPath { .. }));
    }

    #[test]
    fn auto_dedupes_siblings_and_skips_self() {
        let product = ProductCode::from("ABC");
        let env = AgentEnv {
            product: &product,
            code_sep: "-",
            workspace: Path::new("/ws"),
        };
        let doc = Document {
            path: Path::new("/ws/ABC/docs/intro.md"),
        };
        let effects = auto_agent(&env, &doc, "only:", &values(&["xyz abc", "abc xyz qrs"])).unwrap();
        let targets: Vec<_> = effects
            .iter()
            .map(|e| match e {
                Effect::Copy { to, .. } => to.clone(),
                other => panic!("unexpected effect {other:?}"),
            })
            .collect();
        assert_eq!(
            targets,
            vec![
                PathBuf::from("/ws/XYZ/docs/intro.md"),
                PathBuf::from("/ws/QRS/docs/intro.md"),
            ]
        );
    }

    #[test]
    fn unknown_keys_are_inert() {
        let rules = DirectiveRules::default();
        let table = AgentTable::standard(&rules);
        let mut index = DirectiveIndex::default();
        index.insert("foo:bar", "baz");

        let product = ProductCode::from("ABC");
        let env = AgentEnv {
            product: &product,
            code_sep: "-",
            workspace: Path::new("/ws"),
        };
        let doc = Document {
            path: Path::new("/ws/ABC/intro.md"),
        };
        assert!(table.dispatch(&env, &doc, &index).is_empty());
    }

    #[test]
    fn restricted_table_only_runs_included_kinds() {
        let rules = DirectiveRules::default();
        let table = AgentTable::with_kinds(&rules, &[AgentKind::Version]);
        assert_eq!(table.len(), 1);
        assert!(table.contains("dl:version"));
        assert!(!table.contains("only:"));
    }
}
