//! Sitemap generation.
//!
//! The `sitemap` plugin writes `sitemap.xml` (or the `file` option of
//! `[plugins.sitemap]`) into the output directory once every page has been
//! written. Translation groups become `xhtml:link` alternates when the site
//! has more than one language.

use std::{fs, path::PathBuf};

use chrono::NaiveDate;
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

/// Sitemap generation errors.
#[derive(Debug, Error)]
pub enum SitemapError {
    /// A plugin option has the wrong shape.
    #[error("invalid option `{0}`")]
    Option(&'static str),

    /// The output directory is not set.
    #[error("output directory is not set")]
    NoOutputDir,

    /// The sitemap file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for sitemap operations.
pub type Result<T> = std::result::Result<T, SitemapError>;

/// Change frequency for sitemap entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFreq {
    Daily,
    Monthly,
    Yearly,
}

impl ChangeFreq {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// A sitemap URL entry.
#[derive(Debug, Clone)]
pub struct SitemapUrl {
    /// Absolute URL.
    pub loc: String,
    /// Last modification date, from `updated` or `date`.
    pub lastmod: Option<NaiveDate>,
    pub changefreq: ChangeFreq,
    /// Priority (0.0 to 1.0).
    pub priority: f32,
    /// Other language versions of the same page.
    pub alternates: Vec<AlternateLink>,
}

/// Alternate language link for a URL.
#[derive(Debug, Clone)]
pub struct AlternateLink {
    pub hreflang: String,
    pub href: String,
}

/// Post-build plugin writing `sitemap.xml`.
#[derive(Debug)]
pub struct SitemapPlugin {
    file: String,
}

impl Default for SitemapPlugin {
    fn default() -> Self {
        Self {
            file: Self::FILE_NAME.to_string(),
        }
    }
}

impl SitemapPlugin {
    pub const NAME: &'static str = "sitemap";
    pub const FILE_NAME: &'static str = "sitemap.xml";

    pub fn new() -> Self {
        Self::default()
    }

    /// Sitemap file name relative to the output directory.
    pub fn file_name(&self) -> &str {
        &self.file
    }

    /// Generate sitemap XML for every page of the site, ordered by URL.
    pub fn generate(&self, site: &Site) -> String {
        let config = site.config();
        let mut pages: Vec<&Page> = site.pages().collect();
        pages.sort_by(|a, b| a.url.cmp(&b.url));
        debug!(count = pages.len(), "generating sitemap");

        let multilingual = config.site.languages.len() > 1;
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9""#);
        if multilingual {
            xml.push_str(r#" xmlns:xhtml="http://www.w3.org/1999/xhtml""#);
        }
        xml.push_str(">\n");

        for page in pages {
            let mut url = page_to_url(config, page);
            if multilingual {
                url.alternates = site
                    .get_page_translations(page)
                    .into_iter()
                    .map(|p| AlternateLink {
                        hreflang: p.language.clone(),
                        href: config.url_for(&p.url),
                    })
                    .collect();
            }
            xml.push_str(&url_to_xml(&url));
        }

        xml.push_str("</urlset>\n");
        xml
    }

    /// Generate the sitemap and write it into the site's output directory.
    pub fn write(&self, site: &Site) -> Result<PathBuf> {
        let output = site.output_dir().ok_or(SitemapError::NoOutputDir)?;
        let path = output.join(&self.file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SitemapError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, self.generate(site)).map_err(|source| SitemapError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

impl Plugin for SitemapPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, options: &PluginOptions) -> plugin::Result<()> {
        if let Some(file) = options.get("file") {
            self.file = scalar_to_string(file)
                .filter(|f| !f.trim().is_empty())
                .ok_or_else(|| {
                    PluginError::new(Self::NAME, SitemapError::Option("file").to_string())
                })?;
        }
        Ok(())
    }

    fn process_content(&self, html: String) -> String {
        html
    }

    fn build_hooks(&mut self) -> Option<&mut dyn BuildHooks> {
        Some(self)
    }
}

impl BuildHooks for SitemapPlugin {
    fn post_build(&mut self, site: &Site) -> plugin::Result<()> {
        let path = self
            .write(site)
            .map_err(|e| PluginError::new(Self::NAME, e.to_string()))?;
        info!(path = %path.display(), "wrote sitemap");
        Ok(())
    }
}

fn page_to_url(config: &Config, page: &Page) -> SitemapUrl {
    let lastmod = page
        .metadata
        .get_str("updated")
        .or_else(|| page.metadata.date())
        .and_then(|raw| parse_date(&raw));

    let (changefreq, priority) = if is_home(config, page) {
        (ChangeFreq::Daily, 1.0)
    } else if page.metadata.date().is_some() {
        (ChangeFreq::Monthly, 0.8)
    } else {
        (ChangeFreq::Yearly, 0.5)
    };

    SitemapUrl {
        loc: config.url_for(&page.url),
        lastmod,
        changefreq,
        priority,
        alternates: Vec::new(),
    }
}

fn is_home(config: &Config, page: &Page) -> bool {
    let url = page.url.trim_matches('/');
    url.is_empty() || url == format!("{}.html", config.routing.default_page)
}

fn url_to_xml(url: &SitemapUrl) -> String {
    let mut xml = String::from("  <url>\n");
    xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&url.loc)));

    if let Some(lastmod) = url.lastmod {
        xml.push_str(&format!(
            "    <lastmod>{}</lastmod>\n",
            lastmod.format("%Y-%m-%d")
        ));
    }

    xml.push_str(&format!(
        "    <changefreq>{}</changefreq>\n",
        url.changefreq.as_str()
    ));
    xml.push_str(&format!("    <priority>{:.1}</priority>\n", url.priority));

    for alt in &url.alternates {
        xml.push_str(&format!(
            r#"    <xhtml:link rel="alternate" hreflang="{}" href="{}" />"#,
            escape_xml(&alt.hreflang),
            escape_xml(&alt.href)
        ));
        xml.push('\n');
    }

    xml.push_str("  </url>\n");
    xml
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
