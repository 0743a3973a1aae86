//! Typed frontmatter values and the insertion-ordered metadata map.

use serde::{Deserialize, Serialize};

/// A single frontmatter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MetaValue {
    String(String),
    Number(u64),
    Bool(bool),
    List(Vec<String>),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<u64> {
        match self {
            MetaValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            MetaValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::String(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::String(s)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

impl From<u64> for MetaValue {
    fn from(n: u64) -> Self {
        MetaValue::Number(n)
    }
}

impl From<Vec<String>> for MetaValue {
    fn from(items: Vec<String>) -> Self {
        MetaValue::List(items)
    }
}

impl From<Vec<&str>> for MetaValue {
    fn from(items: Vec<&str>) -> Self {
        MetaValue::List(items.into_iter().map(String::from).collect())
    }
}

/// Frontmatter fields in the order they were first inserted.
///
/// Re-inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    entries: Vec<(String, MetaValue)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut MetaValue> {
        self.position(key).map(|i| &mut self.entries[i].1)
    }

    /// Inserts or replaces a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Option<MetaValue> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Removes a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

impl<K: Into<String>, V: Into<MetaValue>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut meta = Metadata::new();
        for (k, v) in iter {
            meta.insert(k, v);
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order() {
        let mut meta = Metadata::new();
        meta.insert("title", "About");
        meta.insert("draft", true);
        meta.insert("order", 3u64);

        let keys: Vec<&str> = meta.keys().collect();
        assert_eq!(keys, vec!["title", "draft", "order"]);
    }

    #[test]
    fn test_reinsert_replaces_in_place() {
        let mut meta = Metadata::new();
        meta.insert("title", "Old");
        meta.insert("draft", true);

        let previous = meta.insert("title", "New");

        assert_eq!(previous, Some(MetaValue::from("Old")));
        assert_eq!(meta.keys().collect::<Vec<_>>(), vec!["title", "draft"]);
        assert_eq!(meta.get("title").and_then(MetaValue::as_str), Some("New"));
    }

    #[test]
    fn test_absent_differs_from_empty() {
        let mut meta = Metadata::new();
        meta.insert("tags", Vec::<String>::new());

        assert!(meta.contains_key("tags"));
        assert!(!meta.contains_key("author"));
        assert_eq!(meta.get("tags").and_then(MetaValue::as_list), Some(&[][..]));
    }

    #[test]
    fn test_remove() {
        let mut meta: Metadata = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        assert_eq!(meta.remove("b"), Some(MetaValue::from("2")));
        assert_eq!(meta.remove("b"), None);
        assert_eq!(meta.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_json_roundtrip_keeps_order_and_types() {
        let mut meta = Metadata::new();
        meta.insert("zeta", "last-alpha-first");
        meta.insert("alpha", 7u64);
        meta.insert("tags", vec!["a", "b"]);
        meta.insert("draft", false);

        let json = serde_json::to_string(&meta).unwrap();
        let back: Metadata = serde_json::from_str(&json).unwrap();

        assert_eq!(back, meta);
        assert_eq!(back.keys().next(), Some("zeta"));
    }
}
