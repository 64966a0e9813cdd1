//! Column resolution: visible grid columns minus exclusions
//!
//! Exclusions are normalized to snake case before they are compared with
//! column keys, so `userName` excludes the `user_name` column.

use crate::types::{ColumnSpec, Headings};
use tracing::debug;

/// Ordered set of excluded column keys
///
/// Entries are kept as given; merging is additive and keeps duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    keys: Vec<String>,
}

impl ExclusionSet {
    /// Create an empty exclusion set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one key
    pub fn insert(&mut self, key: impl Into<String>) {
        self.keys.push(key.into());
    }

    /// Append keys after the existing ones
    pub fn extend<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
    }

    /// Raw keys in insertion order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Keys normalized to the column naming convention
    pub fn normalized(&self) -> Vec<String> {
        self.keys.iter().map(|k| snake_case(k)).collect()
    }

    /// Check if a column key is excluded
    pub fn excludes(&self, column_key: &str) -> bool {
        self.keys.iter().any(|k| snake_case(k) == column_key)
    }

    /// Get number of raw entries
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if no exclusions are set
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ExclusionSet {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Convert a key to snake case.
///
/// Strings made only of lowercase ASCII letters are returned unchanged.
/// Otherwise each whitespace-separated word is capitalized, whitespace is
/// dropped, `_` is inserted before every uppercase letter that follows
/// another character, and the result is lowercased.
pub fn snake_case(value: &str) -> String {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_lowercase()) {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 4);
    let mut word_start = true;
    for c in value.chars() {
        if c.is_whitespace() {
            word_start = true;
            continue;
        }
        let c = if word_start { c.to_ascii_uppercase() } else { c };
        word_start = false;
        if c.is_ascii_uppercase() && !out.is_empty() {
            out.push('_');
        }
        out.push(c);
    }

    out.to_lowercase()
}

/// Remove excluded columns, keeping the original order
pub fn resolve_columns(visible: &[ColumnSpec], exclusions: &ExclusionSet) -> Headings {
    let excluded = exclusions.normalized();

    visible
        .iter()
        .filter(|column| !excluded.iter().any(|e| e == &column.key))
        .map(|column| (column.key.clone(), column.label.clone()))
        .collect()
}

/// Resolves columns once and serves the cached result afterwards
#[derive(Debug, Default)]
pub struct ColumnResolver {
    cached: Option<Headings>,
}

impl ColumnResolver {
    /// Create a resolver with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve on first call; later calls return the cached headings
    /// and ignore their arguments.
    pub fn resolve(&mut self, visible: &[ColumnSpec], exclusions: &ExclusionSet) -> &Headings {
        self.cached.get_or_insert_with(|| {
            let headings = resolve_columns(visible, exclusions);
            debug!(
                visible = visible.len(),
                excluded = visible.len() - headings.len(),
                "Resolved export columns"
            );
            headings
        })
    }

    /// Cached headings, if resolved
    pub fn cached(&self) -> Option<&Headings> {
        self.cached.as_ref()
    }

    /// Check if columns were resolved
    pub fn is_resolved(&self) -> bool {
        self.cached.is_some()
    }

    /// Drop the cache so the next call resolves again
    pub fn clear(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("id", "ID"),
            ColumnSpec::new("user_name", "User"),
            ColumnSpec::new("addr.city", "City"),
        ]
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("name"), "name");
        assert_eq!(snake_case("userName"), "user_name");
        assert_eq!(snake_case("UserName"), "user_name");
        assert_eq!(snake_case("First Name"), "first_name");
        assert_eq!(snake_case("addr.city"), "addr.city");
        assert_eq!(snake_case("user_name"), "user_name");
        assert_eq!(snake_case("ABC"), "a_b_c");
        assert_eq!(snake_case(""), "");
    }

    #[test]
    fn test_resolve_without_exclusions() {
        let headings = resolve_columns(&columns(), &ExclusionSet::new());
        let keys: Vec<_> = headings.keys().cloned().collect();
        assert_eq!(keys, vec!["id", "user_name", "addr.city"]);
        assert_eq!(headings["addr.city"], "City");
    }

    #[test]
    fn test_resolve_normalizes_exclusions() {
        let exclusions: ExclusionSet = ["userName", "addr.city"].into_iter().collect();
        let headings = resolve_columns(&columns(), &exclusions);
        assert_eq!(headings.keys().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_unknown_exclusion_is_ignored() {
        let exclusions: ExclusionSet = ["missing"].into_iter().collect();
        let headings = resolve_columns(&columns(), &exclusions);
        assert_eq!(headings.len(), 3);
    }

    #[test]
    fn test_resolver_caches_first_result() {
        let mut resolver = ColumnResolver::new();
        let first = resolver.resolve(&columns(), &ExclusionSet::new()).clone();

        let exclusions: ExclusionSet = ["id"].into_iter().collect();
        let second = resolver.resolve(&columns()[..1], &exclusions).clone();

        assert_eq!(first, second);
        assert!(resolver.is_resolved());

        resolver.clear();
        assert!(!resolver.is_resolved());
    }

    #[test]
    fn test_exclusion_set_is_additive() {
        let mut set = ExclusionSet::new();
        set.insert("a");
        set.extend(["b", "a"]);
        assert_eq!(set.keys(), &["a", "b", "a"]);
        assert!(set.excludes("b"));
        assert!(!set.excludes("c"));
    }
}
