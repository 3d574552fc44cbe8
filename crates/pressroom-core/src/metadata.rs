//! Page metadata map.
//!
//! Front matter is kept as an ordered map of YAML values so that two maps
//! holding equal entries compare and serialize identically no matter how
//! they were built.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Well-known metadata keys.
pub mod keys {
    pub const TITLE: &str = "title";
    pub const DATE: &str = "date";
    pub const SLUG: &str = "slug";
    pub const CATEGORY: &str = "category";
    pub const LANGUAGE: &str = "language";
    pub const TEMPLATE: &str = "template";
    pub const TYPE: &str = "type";
    pub const URL: &str = "url";
    pub const SAVE_AS: &str = "save_as";
    pub const DIR: &str = "dir";
}

/// Ordered metadata map parsed from front matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Value>);

impl Metadata {
    /// Create an empty metadata map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a value rendered as a plain string.
    ///
    /// Strings are returned as-is, numbers and booleans are stringified and a
    /// list yields its first element. Null and mapping values yield `None`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(scalar_to_string)
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Insert a value only when the key is absent.
    pub fn insert_default(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.entry(key.into()).or_insert_with(|| value.into());
    }

    /// Remove a value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.get_str(keys::TITLE)
    }

    #[must_use]
    pub fn slug(&self) -> Option<String> {
        self.non_empty(keys::SLUG)
    }

    #[must_use]
    pub fn language(&self) -> Option<String> {
        self.non_empty(keys::LANGUAGE)
    }

    #[must_use]
    pub fn template(&self) -> Option<String> {
        self.non_empty(keys::TEMPLATE)
    }

    /// The explicit content type (`type` key).
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.non_empty(keys::TYPE)
    }

    /// Explicit URL override.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.get_str(keys::URL)
    }

    /// Explicit save path override.
    #[must_use]
    pub fn save_as(&self) -> Option<String> {
        self.non_empty(keys::SAVE_AS)
    }

    /// Raw date value as written in front matter.
    #[must_use]
    pub fn date(&self) -> Option<String> {
        self.non_empty(keys::DATE)
    }

    /// Category name or path; a list of categories yields the first one.
    #[must_use]
    pub fn category(&self) -> Option<String> {
        self.non_empty(keys::CATEGORY)
    }

    fn non_empty(&self, key: &str) -> Option<String> {
        self.get_str(key).filter(|s| !s.trim().is_empty())
    }
}

impl From<BTreeMap<String, Value>> for Metadata {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Render a scalar YAML value as a string.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Sequence(items) => items.first().and_then(scalar_to_string),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Mapping(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_accessors() {
        let meta: Metadata = serde_yaml::from_str(
            r#"
title: Hello
slug: hello
weight: 3
draft: false
category: [tech, rust]
"#,
        )
        .unwrap();

        assert_eq!(meta.title().as_deref(), Some("Hello"));
        assert_eq!(meta.slug().as_deref(), Some("hello"));
        assert_eq!(meta.get_str("weight").as_deref(), Some("3"));
        assert_eq!(meta.get_str("draft").as_deref(), Some("false"));
        assert_eq!(meta.category().as_deref(), Some("tech"));
        assert!(meta.language().is_none());
    }

    #[test]
    fn test_blank_values_are_absent() {
        let meta: Metadata = [("slug", "  "), ("template", "")].into_iter().collect();
        assert!(meta.slug().is_none());
        assert!(meta.template().is_none());
    }

    #[test]
    fn test_equal_regardless_of_insertion_order() {
        let mut a = Metadata::new();
        a.insert("slug", "x");
        a.insert("category", "blog");

        let mut b = Metadata::new();
        b.insert("category", "blog");
        b.insert("slug", "x");

        assert_eq!(a, b);
        assert_eq!(
            serde_yaml::to_string(&a).unwrap(),
            serde_yaml::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_insert_default_keeps_existing() {
        let mut meta: Metadata = [("slug", "custom")].into_iter().collect();
        meta.insert_default("slug", "stem");
        meta.insert_default("language", "en");
        assert_eq!(meta.slug().as_deref(), Some("custom"));
        assert_eq!(meta.language().as_deref(), Some("en"));
    }

    #[test]
    fn test_mapping_is_not_a_scalar() {
        let meta: Metadata = serde_yaml::from_str("author:\n  name: Ann\n").unwrap();
        assert!(meta.get_str("author").is_none());
        assert!(meta.contains_key("author"));
    }
}
