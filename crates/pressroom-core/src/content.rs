//! The page entity.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{error::Result, frontmatter::parse_frontmatter, metadata::Metadata};

/// A content unit discovered in the source tree.
///
/// Pages are created during discovery and rebuilt from scratch on every
/// build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// Path relative to the source root, `/`-separated. Unique within a build.
    pub source_path: String,

    /// Raw body text with the front matter removed.
    pub content: String,

    /// Front matter as written.
    pub metadata: Metadata,

    /// Resolved language code.
    pub language: String,

    /// Content type used for routing.
    pub content_type: String,

    /// URL relative to the site root.
    pub url: String,

    /// Absolute output file, assigned by the router.
    pub output_path: PathBuf,

    /// Language code to site-absolute URL of each translation.
    pub translations: BTreeMap<String, String>,
}

impl Page {
    /// Create a page from its relative path and raw file contents.
    pub fn from_source(source_path: impl Into<String>, raw: &str) -> Result<Self> {
        let source_path = source_path.into();
        let (metadata, content) = parse_frontmatter(raw, Path::new(&source_path))?;
        Ok(Self::new(source_path, content, metadata))
    }

    /// Create a page from already separated parts.
    #[must_use]
    pub fn new(source_path: impl Into<String>, content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            source_path: source_path.into(),
            content: content.into(),
            metadata,
            language: String::new(),
            content_type: String::new(),
            url: String::new(),
            output_path: PathBuf::new(),
            translations: BTreeMap::new(),
        }
    }

    /// File name without its extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        }
    }

    /// Lowercased file extension, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(self.file_name())
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
    }

    /// Directory segments of the source path.
    pub fn dir_segments(&self) -> impl Iterator<Item = &str> {
        let dir = self
            .source_path
            .rsplit_once('/')
            .map_or("", |(dir, _)| dir);
        dir.split('/').filter(|s| !s.is_empty())
    }

    fn file_name(&self) -> &str {
        self.source_path
            .rsplit_once('/')
            .map_or(self.source_path.as_str(), |(_, name)| name)
    }

    /// Title from metadata, else the file stem.
    #[must_use]
    pub fn title(&self) -> String {
        self.metadata
            .title()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.stem().to_string())
    }

    /// Slug from metadata, else the file stem.
    #[must_use]
    pub fn slug(&self) -> String {
        self.metadata
            .slug()
            .unwrap_or_else(|| self.stem().to_string())
    }

    /// Template name from metadata.
    #[must_use]
    pub fn template(&self) -> Option<String> {
        self.metadata.template()
    }

    pub fn set_output_path(&mut self, path: impl Into<PathBuf>) {
        self.output_path = path.into();
    }

    /// The page URL as a site-absolute path.
    #[must_use]
    pub fn absolute_url(&self) -> String {
        crate::router::site_absolute(&self.url)
    }

    /// URL of the translation in `language`, if one exists.
    #[must_use]
    pub fn translation(&self, language: &str) -> Option<&str> {
        self.translations.get(language).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_source() {
        let page = Page::from_source(
            "blog/hello-world.md",
            "---\ntitle: Hello\ncategory: blog\n---\n\n# Hi",
        )
        .unwrap();

        assert_eq!(page.source_path, "blog/hello-world.md");
        assert_eq!(page.title(), "Hello");
        assert_eq!(page.slug(), "hello-world");
        assert_eq!(page.content, "# Hi");
        assert_eq!(page.metadata.category().as_deref(), Some("blog"));
        assert!(page.translations.is_empty());
    }

    #[test]
    fn test_path_helpers() {
        let page = Page::new("fr/docs/Guide.Intro.MD", "", Metadata::new());
        assert_eq!(page.stem(), "Guide.Intro");
        assert_eq!(page.extension().as_deref(), Some("md"));
        assert_eq!(page.dir_segments().collect::<Vec<_>>(), vec!["fr", "docs"]);

        let top = Page::new("about.md", "", Metadata::new());
        assert_eq!(top.dir_segments().count(), 0);
        assert_eq!(top.title(), "about");
    }

    #[test]
    fn test_dotfile_stem() {
        let page = Page::new(".hidden", "", Metadata::new());
        assert_eq!(page.stem(), ".hidden");
        assert_eq!(page.extension(), None);
    }

    #[test]
    fn test_slug_from_metadata() {
        let metadata: Metadata = [("slug", "custom")].into_iter().collect();
        let page = Page::new("posts/original.md", "", metadata);
        assert_eq!(page.slug(), "custom");
    }

    #[test]
    fn test_malformed_frontmatter_names_file() {
        let err = Page::from_source("broken.md", "---\ntitle: x\n").unwrap_err();
        assert!(err.to_string().contains("broken.md"));
    }
}
