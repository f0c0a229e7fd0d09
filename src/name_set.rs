//! Ordered, deduplicated sets of names.
//!
//! Settings arrive either as arrays or as comma-separated strings, and catalog
//! lookups come back page by page with possible repeats. Both are normalized
//! into a `NameSet` once, at ingestion.

use serde::Serialize;
use std::collections::HashSet;

/// An insertion-ordered set of trimmed, non-empty names.
///
/// # Examples
///
/// ```
/// use scene_renamer::NameSet;
///
/// let set = NameSet::from_csv(" Acme, Beta ,,Acme");
/// assert_eq!(set.len(), 2);
/// assert!(set.contains("Beta"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NameSet {
    items: Vec<String>,
    #[serde(skip)]
    index: HashSet<String>,
}

impl NameSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-separated list, dropping blank entries.
    pub fn from_csv(value: &str) -> Self {
        value.split(',').collect()
    }

    /// Inserts a name after trimming it. Returns false for blanks and repeats.
    pub fn insert(&mut self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref().trim();
        if name.is_empty() || self.index.contains(name) {
            return false;
        }
        self.index.insert(name.to_string());
        self.items.push(name.to_string());
        true
    }

    /// Exact membership test on the trimmed name.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains(name.trim())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.items.iter()
    }

    /// Returns the same names in lexical order.
    pub fn sorted(mut self) -> Self {
        self.items.sort();
        self
    }
}

impl<S: AsRef<str>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = NameSet::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

impl<S: AsRef<str>> Extend<S> for NameSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name);
        }
    }
}

impl<'a> IntoIterator for &'a NameSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_csv_trims_and_drops_blanks() {
        let set = NameSet::from_csv("  a , b,, ,c ");
        let names: Vec<_> = set.iter().cloned().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_insert_keeps_first_occurrence_order() {
        let set: NameSet = ["zeta", "alpha", "zeta", "beta"].into_iter().collect();
        let names: Vec<_> = set.iter().cloned().collect();
        assert_eq!(names, vec!["zeta", "alpha", "beta"]);
    }

    #[test]
    fn test_sorted() {
        let set: NameSet = ["b", "c", "a"].into_iter().collect();
        let names: Vec<_> = set.sorted().iter().cloned().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_contains_is_exact() {
        let set = NameSet::from_csv("Acme");
        assert!(set.contains("Acme"));
        assert!(set.contains(" Acme "));
        assert!(!set.contains("acme"));
        assert!(!set.contains("Acme Studios"));
    }
}
