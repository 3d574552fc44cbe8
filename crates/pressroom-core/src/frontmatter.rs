//! Front matter parsing for content files.

use std::path::Path;

use serde_yaml::Value;

use crate::{
    error::{CoreError, Result},
    metadata::Metadata,
};

/// Delimiter types for front matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontmatterFormat {
    /// YAML front matter delimited by `---`.
    Yaml,
    /// TOML front matter delimited by `+++`.
    Toml,
}

impl FrontmatterFormat {
    /// Get the delimiter string for this format.
    pub fn delimiter(&self) -> &'static str {
        match self {
            Self::Yaml => "---",
            Self::Toml => "+++",
        }
    }

    fn detect(first_line: &str) -> Option<Self> {
        match first_line.trim_end() {
            "---" => Some(Self::Yaml),
            "+++" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// A front matter block split from its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split<'a> {
    pub format: FrontmatterFormat,
    pub header: &'a str,
    pub body: &'a str,
}

/// Split content into front matter and body.
///
/// The opening delimiter must be the first line of the file (a UTF-8 BOM is
/// tolerated) and the block ends at the next line consisting only of the same
/// delimiter. Returns `Ok(None)` when the file has no front matter and an
/// error when the block is opened but never closed.
pub fn split_frontmatter<'a>(content: &'a str, path: &Path) -> Result<Option<Split<'a>>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let (first_line, rest) = match content.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (content, ""),
    };
    let Some(format) = FrontmatterFormat::detect(first_line) else {
        return Ok(None);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == format.delimiter() {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok(Some(Split {
                format,
                header,
                body,
            }));
        }
        offset += line.len();
    }

    Err(CoreError::frontmatter(
        path,
        format!("front matter opened with `{}` is never closed", format.delimiter()),
    ))
}

/// Parse front matter from a string, returning metadata and the body.
///
/// Content without a front matter block yields empty metadata and the full
/// text as body. An empty block yields empty metadata.
pub fn parse_frontmatter(content: &str, path: &Path) -> Result<(Metadata, String)> {
    let Some(split) = split_frontmatter(content, path)? else {
        return Ok((Metadata::default(), content.to_string()));
    };

    let body = split.body.trim().to_string();
    if split.header.trim().is_empty() {
        return Ok((Metadata::default(), body));
    }

    let metadata: Metadata = match split.format {
        FrontmatterFormat::Yaml => serde_yaml::from_str(split.header)
            .map_err(|e| CoreError::frontmatter(path, e.to_string()))?,
        FrontmatterFormat::Toml => {
            let table: toml::Table = toml::from_str(split.header)
                .map_err(|e| CoreError::frontmatter(path, e.to_string()))?;
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_yaml(value)))
                .collect()
        }
    };

    Ok((metadata, body))
}

/// Convert a TOML value into the YAML value tree metadata is stored as.
///
/// Datetimes become their RFC 3339 string, the same shape a YAML date has.
fn toml_to_yaml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Sequence(items.into_iter().map(toml_to_yaml).collect()),
        toml::Value::Table(table) => Value::Mapping(
            table
                .into_iter()
                .map(|(key, value)| (Value::String(key), toml_to_yaml(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_yaml_frontmatter() {
        let content = "---\ntitle: \"Hello World\"\ndate: 2024-01-14\n---\n\nThis is the body content.";

        let split = split_frontmatter(content, Path::new("a.md"))
            .unwrap()
            .expect("split");
        assert_eq!(split.format, FrontmatterFormat::Yaml);
        assert!(split.header.contains("title:"));
        assert!(split.body.trim_start().starts_with("This is the body"));
    }

    #[test]
    fn test_split_toml_frontmatter() {
        let content = "+++\ntitle = \"Hello World\"\n+++\nBody";

        let split = split_frontmatter(content, Path::new("a.md"))
            .unwrap()
            .expect("split");
        assert_eq!(split.format, FrontmatterFormat::Toml);
        assert!(split.header.contains("title ="));
        assert_eq!(split.body, "Body");
    }

    #[test]
    fn test_no_frontmatter() {
        let content = "Just some content without front matter.";
        assert!(split_frontmatter(content, Path::new("a.md")).unwrap().is_none());

        let (meta, body) = parse_frontmatter(content, Path::new("a.md")).unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_dashes_inside_body_are_not_a_delimiter() {
        let content = "---\ntitle: Rules\n---\nabove\n\n---\n\nbelow";
        let (meta, body) = parse_frontmatter(content, Path::new("a.md")).unwrap();
        assert_eq!(meta.title().as_deref(), Some("Rules"));
        assert!(body.contains("above"));
        assert!(body.contains("below"));
    }

    #[test]
    fn test_parse_yaml_frontmatter() {
        let content = r#"---
title: "Test Post"
date: 2024-01-14
slug: test-post
category: blog/rust
tags:
  - rust
  - test
---

Content here."#;

        let (meta, body) = parse_frontmatter(content, Path::new("test.md")).unwrap();

        assert_eq!(meta.title().as_deref(), Some("Test Post"));
        assert_eq!(meta.date().as_deref(), Some("2024-01-14"));
        assert_eq!(meta.slug().as_deref(), Some("test-post"));
        assert_eq!(meta.category().as_deref(), Some("blog/rust"));
        assert_eq!(meta.get_str("tags").as_deref(), Some("rust"));
        assert_eq!(body, "Content here.");
    }

    #[test]
    fn test_parse_toml_frontmatter() {
        let content = "+++\ntitle = \"Test Post\"\nlanguage = \"fr\"\n+++\n\nContent here.";

        let (meta, body) = parse_frontmatter(content, Path::new("test.md")).unwrap();

        assert_eq!(meta.title().as_deref(), Some("Test Post"));
        assert_eq!(meta.language().as_deref(), Some("fr"));
        assert_eq!(body, "Content here.");
    }

    #[test]
    fn test_toml_dates_are_strings() {
        let content = "+++\ndate = 2024-05-01\nupdated = 2024-05-02T08:30:00Z\ntags = [\"a\", \"b\"]\n+++\nBody";

        let (meta, _) = parse_frontmatter(content, Path::new("post.md")).unwrap();

        assert_eq!(meta.date().as_deref(), Some("2024-05-01"));
        assert_eq!(meta.get_str("updated").as_deref(), Some("2024-05-02T08:30:00Z"));
        assert_eq!(meta.get_str("tags").as_deref(), Some("a"));
    }

    #[test]
    fn test_empty_block() {
        let (meta, body) = parse_frontmatter("---\n---\nBody", Path::new("a.md")).unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_unterminated_block() {
        let err = parse_frontmatter("---\ntitle: x\nno end", Path::new("post.md")).unwrap_err();
        assert!(matches!(err, CoreError::Frontmatter { .. }));
        assert!(err.to_string().contains("post.md"));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = parse_frontmatter("---\ntitle: [unclosed\n---\nBody", Path::new("bad.md"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Frontmatter { .. }));
    }

    #[test]
    fn test_scalar_header_is_rejected() {
        let err =
            parse_frontmatter("---\njust a string\n---\nBody", Path::new("bad.md")).unwrap_err();
        assert!(matches!(err, CoreError::Frontmatter { .. }));
    }
}
