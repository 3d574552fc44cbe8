//! RSS feed generation.
//!
//! The `rss` plugin writes an RSS 2.0 feed of the most recent dated pages
//! after the build. Options under `[plugins.rss]`:
//!
//! - `limit`: maximum number of items (default 10)
//! - `file`: feed file name relative to the output directory (default `feed.xml`)

use std::{fs, path::PathBuf};

use chrono::{NaiveDate, Utc};
use rss::{ChannelBuilder, GuidBuilder, Item, ItemBuilder};
use thiserror::Error;
use tracing::{debug, info};

use pressroom_core::{
    Config, Page,
    config::PluginOptions,
    metadata::scalar_to_string,
    router::parse_date,
};

use crate::{
    plugin::{self, BuildHooks, Plugin, PluginError},
    site::Site,
};

/// RSS generation errors.
#[derive(Debug, Error)]
pub enum RssError {
    /// A plugin option has the wrong shape.
    #[error("invalid option `{0}`")]
    Option(&'static str),

    /// The output directory is not set.
    #[error("output directory is not set")]
    NoOutputDir,

    /// The feed file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for RSS operations.
pub type Result<T> = std::result::Result<T, RssError>;

/// Post-build plugin writing an RSS feed.
#[derive(Debug)]
pub struct RssPlugin {
    limit: usize,
    file: String,
}

impl Default for RssPlugin {
    fn default() -> Self {
        Self {
            limit: 10,
            file: "feed.xml".to_string(),
        }
    }
}

impl RssPlugin {
    pub const NAME: &'static str = "rss";

    pub fn new() -> Self {
        Self::default()
    }

    /// Feed file name relative to the output directory.
    pub fn file_name(&self) -> &str {
        &self.file
    }

    fn configure(&mut self, options: &PluginOptions) -> Result<()> {
        if let Some(limit) = options.get("limit") {
            let limit = limit.as_u64().ok_or(RssError::Option("limit"))?;
            self.limit = usize::try_from(limit).map_err(|_| RssError::Option("limit"))?;
        }
        if let Some(file) = options.get("file") {
            self.file = scalar_to_string(file)
                .filter(|f| !f.trim().is_empty())
                .ok_or(RssError::Option("file"))?;
        }
        Ok(())
    }

    /// Generate the feed XML: dated pages, newest first, at most `limit`.
    pub fn generate(&self, site: &Site) -> String {
        let config = site.config();
        let mut dated: Vec<(NaiveDate, &Page)> = site
            .pages()
            .filter_map(|page| {
                let date = page.metadata.date().and_then(|raw| parse_date(&raw))?;
                Some((date, page))
            })
            .collect();
        dated.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.url.cmp(&b.1.url)));
        dated.truncate(self.limit);

        debug!(count = dated.len(), limit = self.limit, "generating RSS feed");

        let items: Vec<Item> = dated
            .into_iter()
            .map(|(date, page)| page_to_item(config, page, date))
            .collect();

        let channel = ChannelBuilder::default()
            .title(&config.site.name)
            .link(config.url_for(""))
            .description(
                config
                    .site
                    .description
                    .as_deref()
                    .unwrap_or(&config.site.name),
            )
            .language(Some(config.site.default_language.clone()))
            .last_build_date(Some(Utc::now().to_rfc2822()))
            .items(items)
            .build();

        channel.to_string()
    }

    /// Generate the feed and write it into the site's output directory.
    pub fn write(&self, site: &Site) -> Result<PathBuf> {
        let output = site.output_dir().ok_or(RssError::NoOutputDir)?;
        let path = output.join(&self.file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| RssError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, self.generate(site)).map_err(|source| RssError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

impl Plugin for RssPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, options: &PluginOptions) -> plugin::Result<()> {
        self.configure(options)
            .map_err(|e| PluginError::new(Self::NAME, e.to_string()))
    }

    fn process_content(&self, html: String) -> String {
        html
    }

    fn build_hooks(&mut self) -> Option<&mut dyn BuildHooks> {
        Some(self)
    }
}

impl BuildHooks for RssPlugin {
    fn post_build(&mut self, site: &Site) -> plugin::Result<()> {
        let path = self
            .write(site)
            .map_err(|e| PluginError::new(Self::NAME, e.to_string()))?;
        info!(path = %path.display(), "wrote RSS feed");
        Ok(())
    }
}

fn page_to_item(config: &Config, page: &Page, date: NaiveDate) -> Item {
    let url = config.url_for(&page.url);
    let guid = GuidBuilder::default().value(&url).permalink(true).build();

    let mut builder = ItemBuilder::default();
    builder.title(Some(page.title()));
    builder.link(Some(url));
    builder.guid(Some(guid));

    if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
        builder.pub_date(Some(midnight.and_utc().to_rfc2822()));
    }

    if let Some(desc) = page
        .metadata
        .get_str("description")
        .or_else(|| page.metadata.get_str("summary"))
    {
        builder.description(Some(desc));
    }

    if let Some(author) = page
        .metadata
        .get_str("author")
        .or_else(|| config.site.author.clone())
    {
        builder.author(Some(author));
    }

    let categories: Vec<_> = tags(page)
        .into_iter()
        .map(|tag| rss::Category {
            name: tag,
            domain: None,
        })
        .collect();
    if !categories.is_empty() {
        builder.categories(categories);
    }

    builder.build()
}

/// `tags` as a list, or as a single comma-separated string.
fn tags(page: &Page) -> Vec<String> {
    match page.metadata.get("tags") {
        Some(value) if value.is_sequence() => value
            .as_sequence()
            .into_iter()
            .flatten()
            .filter_map(scalar_to_string)
            .collect(),
        Some(value) => scalar_to_string(value)
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use pressroom_core::Metadata;

    use super::*;

    fn options(pairs: &[(&str, serde_yaml::Value)]) -> PluginOptions {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_configure() {
        let mut plugin = RssPlugin::new();
        plugin
            .configure(&options(&[
                ("limit", serde_yaml::Value::from(3)),
                ("file", serde_yaml::Value::from("blog/rss.xml")),
            ]))
            .unwrap();
        assert_eq!(plugin.limit, 3);
        assert_eq!(plugin.file_name(), "blog/rss.xml");

        let err = RssPlugin::new()
            .configure(&options(&[("limit", serde_yaml::Value::from("many"))]))
            .unwrap_err();
        assert!(matches!(err, RssError::Option("limit")));
    }

    #[test]
    fn test_page_to_item() {
        let mut config = Config::new("Test Blog", "https://example.com");
        config.site.author = Some("Site Author".to_string());

        let mut metadata = Metadata::new();
        metadata.insert("title", "First Post");
        metadata.insert("description", "Hello");
        metadata.insert("tags", "rust, web");
        let mut page = Page::new("posts/first.md", "", metadata);
        page.url = "posts/2024/05/first.html".to_string();

        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let item = page_to_item(&config, &page, date);

        assert_eq!(item.title(), Some("First Post"));
        assert_eq!(
            item.link(),
            Some("https://example.com/posts/2024/05/first.html")
        );
        assert_eq!(item.description(), Some("Hello"));
        assert_eq!(item.author(), Some("Site Author"));
        assert!(item.pub_date().unwrap().contains("May 2024 00:00:00"));
        let names: Vec<_> = item.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["rust", "web"]);
    }
}
