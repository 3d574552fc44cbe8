//! URL and save-path routing.
//!
//! Every content type maps to a pair of patterns, one for the user-facing URL
//! and one for the file written under the output directory. Patterns are
//! plain strings with `{name}` placeholders:
//!
//! ```text
//! posts/{year}/{month}/{slug}.html
//! {category_path}/{slug}.html
//! ```
//!
//! Placeholders resolve from page metadata. `year`, `month` and `day` are
//! derived from the `date` field when one is present, `category_path` is the
//! normalized path of the page category, and anything else is a plain
//! metadata lookup. A placeholder that cannot be resolved becomes an empty
//! string; routing never fails.
//!
//! Results are cached per content type, keyed only by the metadata fields the
//! selected pattern depends on.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::{
    category::{Category, CategoryResolver},
    config::Config,
    error::Result,
    metadata::{Metadata, keys},
};

/// Content type of a regular page.
pub const PAGE: &str = "page";

/// Placeholder filled with the resolved category path.
const CATEGORY_PATH: &str = "category_path";

/// Placeholders derived from the `date` field.
const DATE_PLACEHOLDERS: [&str; 3] = ["year", "month", "day"];

/// Built-in patterns for content types the configuration does not override.
pub const DEFAULT_PATTERNS: [(&str, &str); 7] = [
    ("page", "{category_path}/{slug}.html"),
    ("post", "posts/{year}/{month}/{slug}.html"),
    ("index", "{dir}/index.html"),
    ("tag", "tags/{slug}.html"),
    ("category", "category/{category_path}.html"),
    ("author", "authors/{slug}.html"),
    ("archive", "archive.html"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Placeholder(String),
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    tokens: Vec<Token>,
}

impl RoutePattern {
    /// Compile a pattern string.
    ///
    /// A `{` without a matching `}`, or an empty `{}`, is kept as literal text.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = pattern;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if !after[..close].trim().is_empty() => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(Token::Placeholder(after[..close].trim().to_string()));
                    rest = &after[close + 1..];
                }
                _ => {
                    literal.push('{');
                    rest = after;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Self {
            source: pattern.to_string(),
            tokens,
        }
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Placeholder(name) => Some(name.as_str()),
            Token::Literal(_) => None,
        })
    }

    /// Whether the pattern references a placeholder.
    #[must_use]
    pub fn references(&self, name: &str) -> bool {
        self.placeholders().any(|p| p == name)
    }

    /// Substitute every placeholder with the value returned by `resolve`.
    pub fn substitute(&self, mut resolve: impl FnMut(&str) -> String) -> String {
        let mut out = String::with_capacity(self.source.len());
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Placeholder(name) => out.push_str(&resolve(name)),
            }
        }
        out
    }
}

/// Snapshot of routing settings for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterPolicy {
    /// Strip `.html` from URLs.
    pub clean_urls: bool,
    /// Prefix routes with the page language.
    pub use_language_prefixes: bool,
    /// Leave the default language unprefixed.
    pub exclude_default_lang_prefix: bool,
    /// Language assumed when metadata has none.
    pub default_language: String,
    /// Slug of the page served at the site root.
    pub default_page: String,
    /// URL patterns per content type.
    pub url_patterns: BTreeMap<String, String>,
    /// Save-path patterns per content type.
    pub save_as_patterns: BTreeMap<String, String>,
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            clean_urls: false,
            use_language_prefixes: true,
            exclude_default_lang_prefix: true,
            default_language: "en".to_string(),
            default_page: "index".to_string(),
            url_patterns: default_patterns(),
            save_as_patterns: default_patterns(),
        }
    }
}

/// The built-in pattern table.
pub fn default_patterns() -> BTreeMap<String, String> {
    DEFAULT_PATTERNS
        .iter()
        .map(|(ty, pattern)| (ty.to_string(), pattern.to_string()))
        .collect()
}

impl RouterPolicy {
    /// Build a policy from the site configuration.
    ///
    /// Configured patterns are layered over the built-in table.
    pub fn from_config(config: &Config) -> Self {
        let routing = &config.routing;
        let mut url_patterns = default_patterns();
        url_patterns.extend(routing.urls.clone());
        let mut save_as_patterns = default_patterns();
        save_as_patterns.extend(routing.save_as.clone());

        Self {
            clean_urls: routing.clean_urls,
            use_language_prefixes: routing.use_language_prefixes,
            exclude_default_lang_prefix: routing.exclude_default_lang_prefix,
            default_language: config.site.default_language.clone(),
            default_page: routing.default_page.clone(),
            url_patterns,
            save_as_patterns,
        }
    }

    /// Set the URL and save-path pattern for one content type.
    #[must_use]
    pub fn with_pattern(mut self, content_type: &str, pattern: &str) -> Self {
        self.url_patterns
            .insert(content_type.to_string(), pattern.to_string());
        self.save_as_patterns
            .insert(content_type.to_string(), pattern.to_string());
        self
    }

    #[must_use]
    pub fn with_clean_urls(mut self, clean_urls: bool) -> Self {
        self.clean_urls = clean_urls;
        self
    }

    /// The language prefix for a page language, if one applies.
    #[must_use]
    pub fn language_prefix<'a>(&self, language: &'a str) -> Option<&'a str> {
        if !self.use_language_prefixes {
            return None;
        }
        if language == self.default_language && self.exclude_default_lang_prefix {
            return None;
        }
        Some(language)
    }
}

/// Cache key: content type plus the values of the fields a pattern depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RouteKey {
    content_type: String,
    fields: Vec<(String, Option<String>)>,
}

impl RouteKey {
    fn new(content_type: &str, pattern: &RoutePattern, metadata: &Metadata) -> Self {
        let mut names: BTreeSet<&str> = pattern.placeholders().collect();
        names.insert(keys::SLUG);
        names.insert(keys::LANGUAGE);
        if names.contains(CATEGORY_PATH) {
            names.insert(keys::CATEGORY);
        }
        if DATE_PLACEHOLDERS.iter().any(|p| names.contains(p)) {
            names.insert(keys::DATE);
        }

        Self {
            content_type: content_type.to_string(),
            fields: names
                .into_iter()
                .map(|name| (name.to_string(), metadata.get_str(name)))
                .collect(),
        }
    }
}

#[derive(Clone, Copy)]
enum Table {
    Url,
    SaveAs,
}

/// Computes URLs and output paths for content.
pub struct Router {
    policy: RouterPolicy,
    url_patterns: HashMap<String, RoutePattern>,
    save_as_patterns: HashMap<String, RoutePattern>,
    slug_fallback: RoutePattern,
    empty_pattern: RoutePattern,
    categories: CategoryResolver,
    url_cache: scc::HashMap<RouteKey, String>,
    save_as_cache: scc::HashMap<RouteKey, String>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("policy", &self.policy)
            .field("categories", &self.categories)
            .field("cached_urls", &self.url_cache.len())
            .field("cached_save_paths", &self.save_as_cache.len())
            .finish()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterPolicy::default())
    }
}

impl Router {
    /// Create a router for a policy.
    #[must_use]
    pub fn new(policy: RouterPolicy) -> Self {
        Self {
            url_patterns: compile(&policy.url_patterns),
            save_as_patterns: compile(&policy.save_as_patterns),
            policy,
            slug_fallback: RoutePattern::parse("{slug}.html"),
            empty_pattern: RoutePattern::parse(""),
            categories: CategoryResolver::new(),
            url_cache: scc::HashMap::new(),
            save_as_cache: scc::HashMap::new(),
        }
    }

    /// Create a router from the site configuration, loading the category
    /// definition file when one is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut router = Self::new(RouterPolicy::from_config(config));
        if let Some(path) = &config.routing.categories_file {
            router.categories.load_definitions(path)?;
        }
        Ok(router)
    }

    /// Use an existing category resolver.
    #[must_use]
    pub fn with_categories(mut self, categories: CategoryResolver) -> Self {
        self.categories = categories;
        self.clear_cache();
        self
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> &RouterPolicy {
        &self.policy
    }

    /// The category resolver.
    #[must_use]
    pub fn categories(&self) -> &CategoryResolver {
        &self.categories
    }

    /// Resolve a category through the shared resolver.
    pub fn category(&self, name_or_path: &str) -> Arc<Category> {
        self.categories.get_or_create_category(name_or_path)
    }

    /// Replace the policy. Both route caches are cleared, so nothing computed
    /// under the previous policy is returned afterwards.
    pub fn update_config(&mut self, policy: RouterPolicy) {
        self.url_patterns = compile(&policy.url_patterns);
        self.save_as_patterns = compile(&policy.save_as_patterns);
        self.policy = policy;
        self.clear_cache();
        debug!("router policy updated");
    }

    /// Drop every cached route and resolved category.
    pub fn clear_cache(&self) {
        self.url_cache.clear_sync();
        self.save_as_cache.clear_sync();
        self.categories.clear();
    }

    /// Number of cached URLs.
    #[must_use]
    pub fn cached_urls(&self) -> usize {
        self.url_cache.len()
    }

    /// Number of cached save paths.
    #[must_use]
    pub fn cached_save_paths(&self) -> usize {
        self.save_as_cache.len()
    }

    /// The user-facing URL for content, relative to the site root.
    ///
    /// An explicit `url` in metadata is returned verbatim. The root page
    /// resolves to `""` (or `"{lang}/"` when a language prefix applies).
    pub fn get_url(&self, content_type: &str, metadata: &Metadata) -> String {
        if let Some(url) = metadata.url() {
            return url;
        }

        let pattern = self.select(Table::Url, content_type, metadata);
        let key = RouteKey::new(content_type, pattern, metadata);
        if let Some(entry) = self.url_cache.get_sync(&key) {
            return entry.get().clone();
        }

        let url = self.compute_url(content_type, pattern, metadata);
        let _ = self.url_cache.insert_sync(key, url.clone());
        url
    }

    /// The file path for content, relative to the output directory.
    ///
    /// Never strips `.html`; the root page is always `index.html`. An explicit
    /// `save_as` in metadata is returned verbatim.
    pub fn get_save_as(&self, content_type: &str, metadata: &Metadata) -> String {
        if let Some(save_as) = metadata.save_as() {
            return save_as;
        }

        let pattern = self.select(Table::SaveAs, content_type, metadata);
        let key = RouteKey::new(content_type, pattern, metadata);
        if let Some(entry) = self.save_as_cache.get_sync(&key) {
            return entry.get().clone();
        }

        let save_as = self.compute_save_as(content_type, pattern, metadata);
        let _ = self.save_as_cache.insert_sync(key, save_as.clone());
        save_as
    }

    /// The absolute output file for content.
    ///
    /// An absolute save path (explicit override) is returned unmodified.
    pub fn get_output_path(
        &self,
        base_dir: &Path,
        content_type: &str,
        metadata: &Metadata,
    ) -> PathBuf {
        let save_as = self.get_save_as(content_type, metadata);
        let path = Path::new(&save_as);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    fn select(&self, table: Table, content_type: &str, metadata: &Metadata) -> &RoutePattern {
        let patterns = match table {
            Table::Url => &self.url_patterns,
            Table::SaveAs => &self.save_as_patterns,
        };
        match patterns.get(content_type) {
            Some(pattern) => pattern,
            None if metadata.slug().is_some() => &self.slug_fallback,
            None => &self.empty_pattern,
        }
    }

    fn is_root(&self, content_type: &str, metadata: &Metadata) -> bool {
        content_type == PAGE
            && metadata
                .slug()
                .is_some_and(|slug| slug == self.policy.default_page)
    }

    fn compute_url(&self, content_type: &str, pattern: &RoutePattern, metadata: &Metadata) -> String {
        let mut path = if self.is_root(content_type, metadata) {
            String::new()
        } else {
            self.expand(pattern, metadata)
        };

        if self.policy.clean_urls
            && let Some(stripped) = path.strip_suffix(".html")
        {
            path = stripped.to_string();
        }

        let language = self.language_of(metadata);
        match self.policy.language_prefix(&language) {
            Some(lang) if path.is_empty() || (self.policy.clean_urls && path == "index") => {
                format!("{lang}/")
            }
            Some(lang) => format!("{lang}/{path}"),
            None => path,
        }
    }

    fn compute_save_as(
        &self,
        content_type: &str,
        pattern: &RoutePattern,
        metadata: &Metadata,
    ) -> String {
        let mut path = if self.is_root(content_type, metadata) {
            "index.html".to_string()
        } else {
            self.expand(pattern, metadata)
        };

        if path.is_empty() {
            path = "index.html".to_string();
        } else if !path.ends_with(".html") {
            path.push_str("/index.html");
        }

        let language = self.language_of(metadata);
        match self.policy.language_prefix(&language) {
            Some(lang) => format!("{lang}/{path}"),
            None => path,
        }
    }

    fn language_of(&self, metadata: &Metadata) -> String {
        metadata
            .language()
            .unwrap_or_else(|| self.policy.default_language.clone())
    }

    /// Substitute placeholders and normalize the result.
    fn expand(&self, pattern: &RoutePattern, metadata: &Metadata) -> String {
        let category_path = metadata
            .category()
            .map(|name| self.categories.get_or_create_category(&name).full_path.clone());
        let date = metadata.date();
        let parsed_date = date.as_deref().and_then(|raw| {
            let parsed = parse_date(raw);
            if parsed.is_none() && DATE_PLACEHOLDERS.iter().any(|p| pattern.references(p)) {
                warn!(date = raw, pattern = pattern.as_str(), "unparseable date in route");
            }
            parsed
        });

        let substituted = pattern.substitute(|name| {
            if DATE_PLACEHOLDERS.contains(&name) && date.is_some() {
                return parsed_date
                    .map(|d| format_date_part(d, name))
                    .unwrap_or_default();
            }
            if name == CATEGORY_PATH
                && let Some(path) = &category_path
            {
                return path.clone();
            }
            metadata.get_str(name).unwrap_or_else(|| {
                debug!(
                    placeholder = name,
                    pattern = pattern.as_str(),
                    "unresolved route placeholder"
                );
                String::new()
            })
        });

        normalize_path(&substituted)
    }
}

fn compile(table: &BTreeMap<String, String>) -> HashMap<String, RoutePattern> {
    table
        .iter()
        .map(|(ty, pattern)| (ty.clone(), RoutePattern::parse(pattern)))
        .collect()
}

/// Collapse repeated separators and drop leading and trailing ones.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Turn a site-relative URL into a site-absolute one.
///
/// Leading slashes collapse to one, so an explicit `url` override written as
/// `/about/` never becomes protocol-relative. URLs with a scheme are kept.
pub fn site_absolute(url: &str) -> String {
    if url.contains("://") {
        return url.to_string();
    }
    format!("/{}", url.trim_start_matches('/'))
}

/// Parse a front matter date.
///
/// Accepts `YYYY-MM-DD`, RFC 3339, and `YYYY-MM-DD HH:MM[:SS]` with either a
/// space or `T` separator.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn format_date_part(date: NaiveDate, part: &str) -> String {
    let format = match part {
        "year" => "%Y",
        "month" => "%m",
        _ => "%d",
    };
    date.format(format).to_string()
}
