//! HTML template contract and the default interpolation renderer.
//!
//! The default renderer is deliberately small: `{{ path }}` interpolation over
//! the render context, with dotted paths into nested objects and a trailing
//! `?` marking a variable as optional. There is no control flow.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use pressroom_core::{CategoryResolver, Metadata};

/// Template rendering errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Missing required variable.
    #[error("missing required variable: {0}")]
    MissingVariable(String),

    /// Template not found.
    #[error("template not found: {0}")]
    NotFound(String),

    /// Invalid template syntax.
    #[error("invalid template syntax: {0}")]
    InvalidSyntax(String),

    /// Template file could not be read.
    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Context could not be converted for interpolation.
    #[error("failed to serialize render context: {0}")]
    Context(#[from] serde_json::Error),
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Renders a named template against a page context.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, context: &RenderContext) -> Result<String>;
}

/// The page part of a render context.
#[derive(Debug, Clone, Serialize)]
pub struct PageContext {
    pub source_path: String,
    pub title: String,
    pub slug: String,
    pub url: String,
    pub language: String,
    pub content_type: String,
    pub output_path: String,
    pub metadata: Metadata,
    pub content: String,
    /// Resolved `category`, `null` when the page has none.
    pub category: Option<CategoryContext>,
}

/// A page category with its ancestors, top level first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryContext {
    pub name: String,
    pub full_path: String,
    pub title: String,
    pub description: Option<String>,
    pub ancestors: Vec<CategoryLink>,
}

/// One ancestor of a [`CategoryContext`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryLink {
    pub full_path: String,
    pub title: String,
}

impl CategoryContext {
    /// Resolve a category name or path. The root category yields `None`.
    pub fn resolve(categories: &CategoryResolver, name_or_path: &str) -> Option<Self> {
        let category = categories.get_or_create_category(name_or_path);
        if category.is_root() {
            return None;
        }

        let ancestors = category
            .ancestors()
            .iter()
            .map(|path| {
                let ancestor = categories.get_or_create_category(path);
                CategoryLink {
                    full_path: ancestor.full_path.clone(),
                    title: ancestor.title.clone(),
                }
            })
            .collect();

        Some(Self {
            name: category.name.clone(),
            full_path: category.full_path.clone(),
            title: category.title.clone(),
            description: category.description.clone(),
            ancestors,
        })
    }
}

/// One entry of `available_translations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationLink {
    pub language: String,
    pub url: String,
    pub title: String,
}

/// Everything a template sees when rendering one page.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    pub page: PageContext,
    pub site_name: String,
    pub site_url: String,
    pub static_url: String,
    /// Page HTML after parsing and plugin processing.
    pub page_content: String,
    /// Head markup contributed by plugins.
    pub page_head_content: String,
    /// Language code to URL of each translation.
    pub translations: BTreeMap<String, String>,
    pub available_translations: Vec<TranslationLink>,
}

impl RenderContext {
    /// The context as a JSON tree for path lookups.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// A template supporting `{{ variable }}` interpolation.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    content: String,
}

impl Template {
    /// Create a new template with the given name and content.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Get the template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the template against a JSON context.
    ///
    /// `{{ a.b }}` looks up nested keys (array elements by index). Strings are
    /// inserted as-is, other scalars stringified, `null` as nothing, arrays
    /// and objects as JSON. Inserted values are never re-scanned.
    pub fn render(&self, context: &Value) -> Result<String> {
        let mut result = self.content.clone();
        let mut pos = 0;

        while let Some(start) = result[pos..].find("{{") {
            let start = pos + start;
            let end = result[start..]
                .find("}}")
                .ok_or_else(|| TemplateError::InvalidSyntax("unclosed {{ delimiter".to_string()))?;
            let end = start + end + 2;

            let var_name = result[start + 2..end - 2].trim();

            // Check for optional variable syntax: {{ variable? }}
            let (var_name, optional) = if let Some(stripped) = var_name.strip_suffix('?') {
                (stripped.trim(), true)
            } else {
                (var_name, false)
            };
            if var_name.is_empty() {
                return Err(TemplateError::InvalidSyntax(format!(
                    "empty variable in template {}",
                    self.name
                )));
            }

            let value = match lookup(context, var_name) {
                Some(v) => display_value(v),
                None if optional => String::new(),
                None => return Err(TemplateError::MissingVariable(var_name.to_string())),
            };

            result.replace_range(start..end, &value);
            pos = start + value.len();
        }

        Ok(result)
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Templates loaded from a directory, addressed by relative file name.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

impl TemplateRegistry {
    /// Create a registry holding only the built-in `page.html`.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register(Template::new(DEFAULT_TEMPLATE_NAME, DEFAULT_PAGE_TEMPLATE));
        registry
    }

    /// Load every `*.html` file under `dir`, on top of the built-ins.
    ///
    /// Templates are named by their path relative to `dir`, e.g.
    /// `page.html` or `blog/post.html`. A missing directory leaves only the
    /// built-ins.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::new();
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "template directory not found, using built-in templates");
            return Ok(registry);
        }

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| TemplateError::Io {
                path: e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf),
                source: e.into(),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != "html") {
                continue;
            }

            let Ok(relative) = path.strip_prefix(dir) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let content = fs::read_to_string(path).map_err(|source| TemplateError::Io {
                path: path.to_path_buf(),
                source,
            })?;

            debug!(template = %name, "loaded template");
            registry.register(Template::new(name, content));
        }

        Ok(registry)
    }

    /// Register a template.
    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    /// Get a template by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateRenderer for TemplateRegistry {
    fn render(&self, name: &str, context: &RenderContext) -> Result<String> {
        let template = self
            .get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;
        template.render(&context.to_value()?)
    }
}

/// Name of the built-in fallback template.
pub const DEFAULT_TEMPLATE_NAME: &str = "page.html";

/// Built-in page template.
pub const DEFAULT_PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ page.language }}">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{ page.title }} | {{ site_name }}</title>
    <link rel="canonical" href="{{ site_url }}/{{ page.url }}">
    {{ page_head_content }}
</head>
<body>
    <article class="page">
        <h1>{{ page.title }}</h1>
        <div class="content">
            {{ page_content }}
        </div>
    </article>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn sample_context() -> RenderContext {
        RenderContext {
            page: PageContext {
                source_path: "about.md".to_string(),
                title: "About".to_string(),
                slug: "about".to_string(),
                url: "about.html".to_string(),
                language: "en".to_string(),
                content_type: "page".to_string(),
                output_path: "/out/about.html".to_string(),
                metadata: [("title", "About")].into_iter().collect(),
                content: "# About".to_string(),
                category: None,
            },
            site_name: "Example".to_string(),
            site_url: "https://example.com".to_string(),
            static_url: "/static".to_string(),
            page_content: "<p>{{ not a variable }}</p>".to_string(),
            page_head_content: String::new(),
            translations: BTreeMap::from([("fr".to_string(), "/fr/about.html".to_string())]),
            available_translations: vec![TranslationLink {
                language: "fr".to_string(),
                url: "/fr/about.html".to_string(),
                title: "À propos".to_string(),
            }],
        }
    }

    #[test]
    fn test_template_simple_render() {
        let template = Template::new("test", "Hello, {{ name }}!");
        let result = template.render(&json!({ "name": "World" })).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_dotted_paths_and_scalars() {
        let template = Template::new(
            "test",
            "{{ a.b }} {{ list.1 }} {{ flag }} {{ count }} [{{ nothing }}]",
        );
        let ctx = json!({ "a": { "b": "deep" }, "list": ["x", "y"], "flag": true, "count": 3, "nothing": null });
        assert_eq!(template.render(&ctx).unwrap(), "deep y true 3 []");
    }

    #[test]
    fn test_template_optional_variable() {
        let template = Template::new("test", "Hello{{ suffix? }}!");
        assert_eq!(template.render(&json!({})).unwrap(), "Hello!");
        assert_eq!(
            template.render(&json!({ "suffix": ", World" })).unwrap(),
            "Hello, World!"
        );
    }

    #[test]
    fn test_template_missing_required_variable() {
        let template = Template::new("test", "Hello, {{ page.missing }}!");
        let result = template.render(&json!({ "page": {} }));
        assert!(matches!(result, Err(TemplateError::MissingVariable(v)) if v == "page.missing"));
    }

    #[test]
    fn test_invalid_syntax() {
        let template = Template::new("test", "Hello, {{ name");
        assert!(matches!(
            template.render(&json!({})),
            Err(TemplateError::InvalidSyntax(_))
        ));
        let empty = Template::new("test", "{{ }}");
        assert!(matches!(
            empty.render(&json!({})),
            Err(TemplateError::InvalidSyntax(_))
        ));
    }

    #[test]
    fn test_inserted_values_are_not_rescanned() {
        let registry = TemplateRegistry::new();
        let html = registry.render("page.html", &sample_context()).unwrap();
        assert!(html.contains("<p>{{ not a variable }}</p>"));
        assert!(html.contains("<title>About | Example</title>"));
        assert!(html.contains("href=\"https://example.com/about.html\""));
    }

    #[test]
    fn test_translation_lookups() {
        let template = Template::new(
            "t",
            "{{ translations.fr }} {{ available_translations.0.title }} {{ translations.de? }}",
        );
        let ctx = sample_context().to_value().unwrap();
        assert_eq!(template.render(&ctx).unwrap(), "/fr/about.html À propos ");
    }

    #[test]
    fn test_category_context() {
        use pressroom_core::category::CategoryDefinition;

        let categories = CategoryResolver::with_definitions([
            CategoryDefinition {
                path: "guides".to_string(),
                title: Some("Guides".to_string()),
                description: None,
            },
            CategoryDefinition {
                path: "guides/rust".to_string(),
                title: Some("Rust Guides".to_string()),
                description: Some("Learning Rust".to_string()),
            },
        ]);

        let category = CategoryContext::resolve(&categories, " guides / rust / async ").unwrap();
        assert_eq!(category.full_path, "guides/rust/async");
        assert_eq!(category.title, "async");
        assert_eq!(
            category.ancestors,
            vec![
                CategoryLink {
                    full_path: "guides".to_string(),
                    title: "Guides".to_string(),
                },
                CategoryLink {
                    full_path: "guides/rust".to_string(),
                    title: "Rust Guides".to_string(),
                },
            ]
        );

        assert!(CategoryContext::resolve(&categories, "/").is_none());
    }

    #[test]
    fn test_missing_category_renders_empty() {
        let template = Template::new("t", "[{{ page.category.title? }}]");
        let ctx = sample_context().to_value().unwrap();
        assert_eq!(template.render(&ctx).unwrap(), "[]");
    }

    #[test]
    fn test_registry_not_found() {
        let registry = TemplateRegistry::new();
        let result = registry.render("missing.html", &sample_context());
        assert!(matches!(result, Err(TemplateError::NotFound(name)) if name == "missing.html"));
    }

    #[test]
    fn test_load_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("blog")).unwrap();
        fs::write(dir.path().join("page.html"), "custom {{ page.title }}").unwrap();
        fs::write(dir.path().join("blog/post.html"), "post {{ page.slug }}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = TemplateRegistry::load_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.render("page.html", &sample_context()).unwrap(),
            "custom About"
        );
        assert_eq!(
            registry.render("blog/post.html", &sample_context()).unwrap(),
            "post about"
        );
    }

    #[test]
    fn test_load_missing_dir_keeps_builtin() {
        let registry = TemplateRegistry::load_dir(Path::new("/nonexistent/templates")).unwrap();
        assert!(registry.get(DEFAULT_TEMPLATE_NAME).is_some());
    }
}
