//! Site configuration management.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Free-form options handed to a plugin when it is registered.
pub type PluginOptions = BTreeMap<String, serde_yaml::Value>;

/// Main configuration structure for Pressroom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site-wide settings.
    pub site: SiteConfig,

    /// Build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// URL and save-path routing settings.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Per-plugin option tables, keyed by plugin name.
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginOptions>,
}

/// Site-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site name shown in templates.
    pub name: String,

    /// Base URL for the site (e.g., "https://example.com").
    pub base_url: String,

    /// Default language code.
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Ordered list of configured languages.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Site description for meta tags.
    #[serde(default)]
    pub description: Option<String>,

    /// Site author name.
    #[serde(default)]
    pub author: Option<String>,
}

/// What the engine does when a single page fails to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageErrorPolicy {
    /// Abort the whole build on the first failing page.
    #[default]
    Abort,
    /// Log the failure and keep building the remaining pages.
    Continue,
}

/// Build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Directory holding content files.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Output directory for the generated site.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory holding page templates.
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,

    /// Directory mirrored into `<output_dir>/static`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Template used when a page does not name one.
    #[serde(default = "default_template")]
    pub default_template: String,

    /// URL prefix under which static assets are served.
    #[serde(default = "default_static_url")]
    pub static_url: String,

    /// Page failure policy.
    #[serde(default)]
    pub on_page_error: PageErrorPolicy,
}

/// Routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Strip `.html` from user-facing URLs.
    #[serde(default)]
    pub clean_urls: bool,

    /// Prefix URLs and save paths with the page language.
    #[serde(default = "default_true")]
    pub use_language_prefixes: bool,

    /// Leave the default language unprefixed.
    #[serde(default = "default_true")]
    pub exclude_default_lang_prefix: bool,

    /// Slug of the page served at the site root.
    #[serde(default = "default_page")]
    pub default_page: String,

    /// Optional category hierarchy definition file.
    #[serde(default)]
    pub categories_file: Option<PathBuf>,

    /// URL patterns per content type.
    #[serde(default)]
    pub urls: BTreeMap<String, String>,

    /// Save-path patterns per content type.
    #[serde(default)]
    pub save_as: BTreeMap<String, String>,
}

// Default value functions
fn default_language() -> String {
    "en".to_string()
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_template() -> String {
    "page.html".to_string()
}

fn default_static_url() -> String {
    "/static".to_string()
}

fn default_page() -> String {
    "index".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            template_dir: default_template_dir(),
            static_dir: default_static_dir(),
            default_template: default_template(),
            static_url: default_static_url(),
            on_page_error: PageErrorPolicy::default(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            clean_urls: false,
            use_language_prefixes: true,
            exclude_default_lang_prefix: true,
            default_page: default_page(),
            categories_file: None,
            urls: BTreeMap::new(),
            save_as: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Create a configuration with defaults for everything but the site identity.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            site: SiteConfig {
                name: name.into(),
                base_url: base_url.into(),
                default_language: default_language(),
                languages: default_languages(),
                description: None,
                author: None,
            },
            build: BuildConfig::default(),
            routing: RoutingConfig::default(),
            plugins: BTreeMap::new(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `PRESSROOM__SECTION__KEY` environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("PRESSROOM").separator("__"))
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and normalize the language list.
    pub fn validate(&mut self) -> Result<()> {
        if self.site.name.trim().is_empty() {
            return Err(CoreError::config("site.name cannot be empty"));
        }

        if self.site.base_url.trim().is_empty() {
            return Err(CoreError::config("site.base_url cannot be empty"));
        }

        if self.site.base_url.ends_with('/') {
            tracing::warn!("site.base_url should not have a trailing slash");
        }

        if self.site.default_language.trim().is_empty() {
            return Err(CoreError::config("site.default_language cannot be empty"));
        }

        let mut seen = Vec::with_capacity(self.site.languages.len());
        for lang in self.site.languages.drain(..) {
            if !seen.contains(&lang) {
                seen.push(lang);
            }
        }
        self.site.languages = seen;

        if !self.has_language(&self.site.default_language) {
            tracing::warn!(
                language = %self.site.default_language,
                "default language missing from site.languages, appending it"
            );
            let default = self.site.default_language.clone();
            self.site.languages.push(default);
        }

        Ok(())
    }

    /// Whether a language code is configured.
    pub fn has_language(&self, code: &str) -> bool {
        self.site.languages.iter().any(|l| l == code)
    }

    /// Options table for a plugin, empty when not configured.
    pub fn plugin_options(&self, name: &str) -> PluginOptions {
        self.plugins.get(name).cloned().unwrap_or_default()
    }

    /// Get the full URL for a path.
    ///
    /// Exactly one `/` separates the base URL from the path; an empty path
    /// yields the base URL itself.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.site.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}
