//! Per-document grouping of directives by their group key.

use std::collections::{BTreeMap, BTreeSet};

use crate::parser::{parse_line, DirectiveRules};

/// Group key → distinct joined-value strings, for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveIndex {
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl DirectiveIndex {
    /// Index every directive line of `text`. Other lines are skipped.
    pub fn from_text(text: &str, rules: &DirectiveRules) -> Self {
        Self::build(text.lines(), rules)
    }

    pub fn build<'a>(lines: impl IntoIterator<Item = &'a str>, rules: &DirectiveRules) -> Self {
        let mut index = Self::default();
        for (number, line) in lines.into_iter().enumerate() {
            match parse_line(line, rules) {
                Ok(directive) => {
                    let key = directive.group_key(rules);
                    index.insert(key, directive.joined_values());
                }
                Err(e) => tracing::trace!("line {}: not a directive ({e})", number + 1),
            }
        }
        index
    }

    /// Returns `false` when the exact value string was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.groups.entry(key.into()).or_default().insert(value.into())
    }

    pub fn get(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
# Title

.. only: xyz qrs
Some prose that mentions .. only: inline.
.. only: xyz qrs
.. ONLY: qrs xyz
.. dl:product abc
";

    #[test]
    fn groups_and_dedupes_exact_phrasings() {
        let index = DirectiveIndex::from_text(DOC, &DirectiveRules::default());
        assert_eq!(index.len(), 2);

        let only = index.get("only:").expect("only group");
        // Reordered values are a different phrasing.
        assert_eq!(only.len(), 2);
        assert!(only.contains("xyz qrs"));
        assert!(only.contains("qrs xyz"));

        let product = index.get("dl:product").expect("product group");
        assert_eq!(product.iter().collect::<Vec<_>>(), vec!["abc"]);
    }

    #[test]
    fn document_without_directives_is_empty() {
        let index = DirectiveIndex::from_text("plain\n\ntext\n", &DirectiveRules::default());
        assert!(index.is_empty());
    }

    #[test]
    fn insert_reports_duplicates() {
        let mut index = DirectiveIndex::default();
        assert!(index.insert("only:", "abc"));
        assert!(!index.insert("only:", "abc"));
    }
}
