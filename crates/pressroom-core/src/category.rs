//! Hierarchical categories.
//!
//! Categories are addressed by a `/`-separated path such as `blog/rust`.
//! Resolution normalizes the path and caches one [`Category`] per normalized
//! key, so `"blog/rust"`, `"/blog//rust/"` and `" blog / rust "` all resolve
//! to equal values.

use std::{collections::BTreeMap, fmt, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

/// Separator between category path segments.
pub const SEPARATOR: char = '/';

/// A node in the category hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    /// Last path segment (empty for the root).
    pub name: String,

    /// Normalized full path, e.g. `blog/rust`.
    pub full_path: String,

    /// Full path of the parent; `None` only for the root.
    pub parent: Option<String>,

    /// Display title, defaults to `name`.
    pub title: String,

    /// Optional description from the definition file.
    pub description: Option<String>,
}

impl Category {
    /// The root category.
    #[must_use]
    pub fn root() -> Self {
        Self {
            name: String::new(),
            full_path: String::new(),
            parent: None,
            title: String::new(),
            description: None,
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.full_path.is_empty()
    }

    /// Path segments from the top level down.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.full_path.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Number of segments; the root has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Full paths of every ancestor, top level first, excluding the root.
    #[must_use]
    pub fn ancestors(&self) -> Vec<String> {
        let segments: Vec<&str> = self.segments().collect();
        (1..segments.len())
            .map(|n| segments[..n].join("/"))
            .collect()
    }
}

/// One entry of the category definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    /// Category path.
    pub path: String,

    /// Display title.
    #[serde(default)]
    pub title: Option<String>,

    /// Description.
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DefinitionFile {
    #[serde(default, rename = "category")]
    categories: Vec<CategoryDefinition>,
}

/// Normalize a category name or path.
///
/// Splits on `/`, trims every segment and drops empty ones.
pub fn normalize_category_path(input: &str) -> String {
    input
        .split(SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolves and caches categories.
pub struct CategoryResolver {
    cache: scc::HashMap<String, Arc<Category>>,
    definitions: BTreeMap<String, CategoryDefinition>,
}

impl Default for CategoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CategoryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryResolver")
            .field("cached", &self.cache.len())
            .field("definitions", &self.definitions.len())
            .finish()
    }
}

impl CategoryResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: scc::HashMap::new(),
            definitions: BTreeMap::new(),
        }
    }

    /// Create a resolver seeded with definitions.
    #[must_use]
    pub fn with_definitions(definitions: impl IntoIterator<Item = CategoryDefinition>) -> Self {
        let mut resolver = Self::new();
        resolver.set_definitions(definitions);
        resolver
    }

    /// Load the category hierarchy definition file.
    ///
    /// The file holds `[[category]]` tables with a `path` and an optional
    /// `title` and `description`.
    pub fn load_definitions(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to read category file: {}", path.display()),
                e,
            )
        })?;
        let file: DefinitionFile = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse category file: {}", path.display()),
                e,
            )
        })?;

        debug!(
            path = %path.display(),
            count = file.categories.len(),
            "loaded category definitions"
        );
        self.set_definitions(file.categories);
        Ok(())
    }

    fn set_definitions(&mut self, definitions: impl IntoIterator<Item = CategoryDefinition>) {
        self.definitions = definitions
            .into_iter()
            .map(|def| (normalize_category_path(&def.path), def))
            .collect();
        self.cache.clear_sync();

        let paths: Vec<String> = self.definitions.keys().cloned().collect();
        for path in paths {
            self.get_or_create_category(&path);
        }
    }

    /// Resolve a category by name or path, creating and caching it on first use.
    ///
    /// Parents are resolved as well so the hierarchy is complete.
    pub fn get_or_create_category(&self, name_or_path: &str) -> Arc<Category> {
        let key = normalize_category_path(name_or_path);
        if let Some(entry) = self.cache.get_sync(&key) {
            return Arc::clone(entry.get());
        }

        let category = Arc::new(self.build(&key));
        if let Some(parent) = category.parent.as_deref()
            && !parent.is_empty()
        {
            self.get_or_create_category(parent);
        }

        // A concurrent insert of the same key holds an equal value.
        let _ = self.cache.insert_sync(key, Arc::clone(&category));
        category
    }

    fn build(&self, key: &str) -> Category {
        if key.is_empty() {
            return Category::root();
        }

        let (parent, name) = match key.rsplit_once(SEPARATOR) {
            Some((parent, name)) => (parent.to_string(), name.to_string()),
            None => (String::new(), key.to_string()),
        };
        let definition = self.definitions.get(key);

        Category {
            title: definition
                .and_then(|d| d.title.clone())
                .unwrap_or_else(|| name.clone()),
            description: definition.and_then(|d| d.description.clone()),
            name,
            full_path: key.to_string(),
            parent: Some(parent),
        }
    }

    /// Whether a normalized path has been resolved.
    #[must_use]
    pub fn is_cached(&self, name_or_path: &str) -> bool {
        self.cache
            .get_sync(&normalize_category_path(name_or_path))
            .is_some()
    }

    /// Loaded definitions, by normalized path.
    #[must_use]
    pub fn definitions(&self) -> &BTreeMap<String, CategoryDefinition> {
        &self.definitions
    }

    /// Number of cached categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop cached categories; definitions are kept.
    pub fn clear(&self) {
        self.cache.clear_sync();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_category_path() {
        assert_eq!(normalize_category_path("blog"), "blog");
        assert_eq!(normalize_category_path("/blog//rust/"), "blog/rust");
        assert_eq!(normalize_category_path(" blog / rust "), "blog/rust");
        assert_eq!(normalize_category_path(""), "");
        assert_eq!(normalize_category_path("///"), "");
    }

    #[test]
    fn test_empty_input_is_root() {
        let resolver = CategoryResolver::new();
        let root = resolver.get_or_create_category("");
        assert!(root.is_root());
        assert_eq!(root.parent, None);
        assert_eq!(root.depth(), 0);
    }

    #[test]
    fn test_equivalent_inputs_resolve_equal() {
        let resolver = CategoryResolver::new();
        let a = resolver.get_or_create_category("blog/rust");
        let b = resolver.get_or_create_category("/blog//rust/");

        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.full_path, "blog/rust");
        assert_eq!(a.name, "rust");
        assert_eq!(a.parent.as_deref(), Some("blog"));
    }

    #[test]
    fn test_parents_are_cached() {
        let resolver = CategoryResolver::new();
        let leaf = resolver.get_or_create_category("a/b/c");

        assert_eq!(leaf.ancestors(), vec!["a", "a/b"]);
        assert!(resolver.is_cached("a"));
        assert!(resolver.is_cached("a/b"));
        assert_eq!(resolver.len(), 3);

        let top = resolver.get_or_create_category("a");
        assert_eq!(top.parent.as_deref(), Some(""));
    }

    #[test]
    fn test_structural_equality_across_resolvers() {
        let first = CategoryResolver::new().get_or_create_category("news");
        let second = CategoryResolver::new().get_or_create_category("news/");
        assert_eq!(*first, *second);
    }

    #[test]
    fn test_load_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("categories.toml");
        std::fs::write(
            &path,
            r#"
[[category]]
path = "blog/rust"
title = "Rust Articles"
description = "Systems programming"

[[category]]
path = "/news/"
"#,
        )
        .unwrap();

        let mut resolver = CategoryResolver::new();
        resolver.load_definitions(&path).unwrap();

        assert_eq!(resolver.definitions().len(), 2);
        let rust = resolver.get_or_create_category("blog/rust");
        assert_eq!(rust.title, "Rust Articles");
        assert_eq!(rust.description.as_deref(), Some("Systems programming"));
        assert_eq!(resolver.get_or_create_category("news").title, "news");
        assert!(resolver.is_cached("blog"));
    }

    #[test]
    fn test_clear_keeps_definitions() {
        let resolver = CategoryResolver::with_definitions([CategoryDefinition {
            path: "docs".to_string(),
            title: Some("Documentation".to_string()),
            description: None,
        }]);
        resolver.clear();

        assert!(resolver.is_empty());
        assert_eq!(resolver.get_or_create_category("docs").title, "Documentation");
    }

    #[test]
    fn test_missing_definition_file() {
        let mut resolver = CategoryResolver::new();
        let err = resolver
            .load_definitions(Path::new("/nonexistent/categories.toml"))
            .unwrap_err();
        assert!(err.is_config());
    }
}
