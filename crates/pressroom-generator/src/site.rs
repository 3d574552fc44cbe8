//! Content repository.
//!
//! Walks the source tree, builds [`Page`]s, resolves their language and
//! routes, and indexes translations. Pages are keyed by their `/`-separated
//! path relative to the source root and iterate in path order.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use pressroom_core::{
    Config, CoreError, Metadata, Page, Router, config::PageErrorPolicy, metadata::keys,
};
use pressroom_parser::ParserRegistry;

use crate::assets::is_hidden;

/// Site errors.
#[derive(Debug, Error)]
pub enum SiteError {
    /// A required directory was never configured.
    #[error("{0} directory is not set")]
    DirectoryNotSet(&'static str),

    /// A configured directory does not exist.
    #[error("{kind} directory does not exist: {path}")]
    MissingDirectory { kind: &'static str, path: PathBuf },

    /// The source tree could not be walked.
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// A content file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Two pages resolve to the same output file.
    #[error("{page} and {kept} both write {}", .output.display())]
    OutputCollision {
        output: PathBuf,
        kept: String,
        page: String,
    },

    /// Front matter or routing setup failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SiteError {
    /// Whether the error concerns site setup rather than one page.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::DirectoryNotSet(_) | Self::MissingDirectory { .. } | Self::Walk { .. } => true,
            Self::Core(e) => e.is_config(),
            Self::Read { .. } | Self::OutputCollision { .. } => false,
        }
    }
}

/// Result type for site operations.
pub type Result<T> = std::result::Result<T, SiteError>;

/// Pages of one logical piece of content, by language.
pub type TranslationGroup = BTreeMap<String, String>;

/// The set of pages making up one build.
#[derive(Debug)]
pub struct Site {
    config: Config,
    router: Router,
    source_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    template_dir: Option<PathBuf>,
    pages: BTreeMap<String, Page>,
    groups: BTreeMap<String, TranslationGroup>,
    group_of: HashMap<String, String>,
    skipped: Vec<String>,
}

impl Site {
    /// Create an empty site. Directories must be set before loading pages.
    pub fn new(config: Config) -> Result<Self> {
        let router = Router::from_config(&config)?;
        Ok(Self {
            config,
            router,
            source_dir: None,
            output_dir: None,
            template_dir: None,
            pages: BTreeMap::new(),
            groups: BTreeMap::new(),
            group_of: HashMap::new(),
            skipped: Vec::new(),
        })
    }

    /// Assign the working directories. Validation happens at load time.
    pub fn set_directories(
        &mut self,
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        templates: impl Into<PathBuf>,
    ) {
        self.source_dir = Some(source.into());
        self.output_dir = Some(output.into());
        self.template_dir = Some(templates.into());
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn template_dir(&self) -> Option<&Path> {
        self.template_dir.as_deref()
    }

    /// The source directory, checked to exist.
    pub fn require_source_dir(&self) -> Result<&Path> {
        let dir = self
            .source_dir
            .as_deref()
            .ok_or(SiteError::DirectoryNotSet("source"))?;
        if !dir.is_dir() {
            return Err(SiteError::MissingDirectory {
                kind: "source",
                path: dir.to_path_buf(),
            });
        }
        Ok(dir)
    }

    /// The output directory; it is created by the engine if absent.
    pub fn require_output_dir(&self) -> Result<&Path> {
        self.output_dir
            .as_deref()
            .ok_or(SiteError::DirectoryNotSet("output"))
    }

    /// Drop every page and the translation index.
    pub fn clear(&mut self) {
        self.pages.clear();
        self.groups.clear();
        self.group_of.clear();
        self.skipped.clear();
    }

    /// Discover every page with a registered parser and index translations.
    ///
    /// Returns the number of pages loaded. Under the `continue` page error
    /// policy, unreadable pages and pages whose output file is already
    /// claimed are logged and skipped instead of failing.
    pub fn load_pages(&mut self, parsers: &ParserRegistry) -> Result<usize> {
        self.clear();
        let source = self.require_source_dir()?.to_path_buf();
        let output = self.require_output_dir()?.to_path_buf();
        let best_effort = self.config.build.on_page_error == PageErrorPolicy::Continue;

        info!(dir = %source.display(), "discovering content");

        let mut claimed: HashMap<PathBuf, String> = HashMap::new();

        let walker = WalkDir::new(&source)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker {
            let entry = entry.map_err(|e| SiteError::Walk {
                path: e.path().map_or_else(|| source.clone(), Path::to_path_buf),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let supported = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| parsers.supports(ext));
            if !supported {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&source) else {
                continue;
            };
            let relative = relative_key(relative);

            let loaded = self.load_page(entry.path(), &relative, &output).and_then(|page| {
                match claimed.get(&page.output_path) {
                    Some(kept) => Err(SiteError::OutputCollision {
                        output: page.output_path.clone(),
                        kept: kept.clone(),
                        page: relative.clone(),
                    }),
                    None => Ok(page),
                }
            });

            match loaded {
                Ok(page) => {
                    claimed.insert(page.output_path.clone(), relative.clone());
                    debug!(
                        page = %page.source_path,
                        language = %page.language,
                        content_type = %page.content_type,
                        url = %page.url,
                        "discovered page"
                    );
                    self.pages.insert(relative, page);
                }
                Err(e) if best_effort => {
                    warn!(page = %relative, error = %e, "skipping page");
                    self.skipped.push(relative);
                }
                Err(e) => return Err(e),
            }
        }

        self.index_translations();
        info!(
            pages = self.pages.len(),
            groups = self.groups.len(),
            "content discovery complete"
        );
        Ok(self.pages.len())
    }

    fn load_page(&self, path: &Path, relative: &str, output: &Path) -> Result<Page> {
        let bytes = fs::read(path).map_err(|source| SiteError::Read {
            path: relative.to_string(),
            source,
        })?;
        let raw = String::from_utf8(bytes)
            .map_err(|_| CoreError::content(relative, "file is not valid UTF-8"))?;
        let mut page = Page::from_source(relative, &raw)?;

        page.language = self.resolve_language(&page);
        page.content_type = Self::determine_content_type(&page);

        let routing = self.routing_metadata(&page);
        page.url = self.router.get_url(&page.content_type, &routing);
        let output_path = self
            .router
            .get_output_path(output, &page.content_type, &routing);
        page.set_output_path(output_path);

        Ok(page)
    }

    /// Language of a page: explicit metadata, else a configured language
    /// directory at the top of its path, else the default language.
    pub fn resolve_language(&self, page: &Page) -> String {
        if let Some(language) = page.metadata.language() {
            return language;
        }
        self.language_segment(page)
            .map(str::to_string)
            .unwrap_or_else(|| self.config.site.default_language.clone())
    }

    /// The leading path segment if it names a configured language.
    fn language_segment<'a>(&self, page: &'a Page) -> Option<&'a str> {
        page.dir_segments()
            .next()
            .filter(|s| is_language_code(s) && self.config.has_language(s))
    }

    /// Classify a page for routing.
    ///
    /// An explicit `type` wins; otherwise pages under a `posts` directory are
    /// posts, `index` files are indexes and everything else is a page.
    pub fn determine_content_type(page: &Page) -> String {
        if let Some(content_type) = page.metadata.content_type() {
            return content_type;
        }
        if page.dir_segments().any(|s| s == "posts") {
            return "post".to_string();
        }
        if page.stem() == "index" {
            return "index".to_string();
        }
        "page".to_string()
    }

    /// Metadata as the router sees it: front matter plus the derived slug,
    /// language and language-neutral directory.
    fn routing_metadata(&self, page: &Page) -> Metadata {
        let mut metadata = page.metadata.clone();
        metadata.insert_default(keys::SLUG, page.slug());
        metadata.insert(keys::LANGUAGE, page.language.clone());

        let skip = usize::from(self.language_segment(page).is_some());
        let dir = page.dir_segments().skip(skip).collect::<Vec<_>>().join("/");
        metadata.insert_default(keys::DIR, dir);
        metadata
    }

    /// Path of a page with its language directory removed.
    fn group_key(&self, page: &Page) -> String {
        match self.language_segment(page) {
            Some(segment) => page.source_path[segment.len() + 1..].to_string(),
            None => page.source_path.clone(),
        }
    }

    fn index_translations(&mut self) {
        for page in self.pages.values() {
            if !self.config.has_language(&page.language) {
                continue;
            }
            let key = self.group_key(page);
            let group = self.groups.entry(key.clone()).or_default();
            if let Some(holder) = group.get(&page.language) {
                warn!(
                    page = %page.source_path,
                    holder = %holder,
                    language = %page.language,
                    "duplicate translation, excluding page from its group"
                );
                continue;
            }
            group.insert(page.language.clone(), page.source_path.clone());
            self.group_of.insert(page.source_path.clone(), key);
        }

        let mut links: Vec<(String, BTreeMap<String, String>)> = Vec::new();
        for group in self.groups.values() {
            for (language, member) in group {
                let translations = group
                    .iter()
                    .filter(|(other, _)| *other != language)
                    .filter_map(|(other, path)| {
                        self.pages
                            .get(path)
                            .map(|p| (other.clone(), p.absolute_url()))
                    })
                    .collect();
                links.push((member.clone(), translations));
            }
        }
        for (member, translations) in links {
            if let Some(page) = self.pages.get_mut(&member) {
                page.translations = translations;
            }
        }
    }

    /// Translations of a page in configured-language order.
    pub fn get_page_translations(&self, page: &Page) -> Vec<&Page> {
        let Some(group) = self
            .group_of
            .get(&page.source_path)
            .and_then(|key| self.groups.get(key))
        else {
            return Vec::new();
        };

        self.config
            .site
            .languages
            .iter()
            .filter(|lang| **lang != page.language)
            .filter_map(|lang| group.get(lang))
            .filter_map(|path| self.pages.get(path))
            .collect()
    }

    /// Language code to site-absolute URL of each translation.
    pub fn get_page_translation_urls(&self, page: &Page) -> BTreeMap<String, String> {
        self.get_page_translations(page)
            .into_iter()
            .map(|p| (p.language.clone(), p.absolute_url()))
            .collect()
    }

    /// Absolute URL for a site path.
    pub fn get_url(&self, path: &str) -> String {
        self.config.url_for(path)
    }

    pub fn get_page(&self, relative_path: &str) -> Option<&Page> {
        self.pages.get(relative_path)
    }

    /// Pages in path order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    /// Translation groups keyed by language-neutral path.
    pub fn translation_groups(&self) -> &BTreeMap<String, TranslationGroup> {
        &self.groups
    }

    /// Pages skipped during the last discovery.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

fn is_language_code(segment: &str) -> bool {
    (2..=3).contains(&segment.len()) && segment.bytes().all(|b| b.is_ascii_lowercase())
}

fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn bilingual_config() -> Config {
        let mut config = Config::new("Test", "https://example.com");
        config.site.languages = vec!["en".to_string(), "fr".to_string()];
        config
    }

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn site_with(files: &[(&str, &str)], config: Config) -> (TempDir, Site) {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("content");
        fs::create_dir_all(&source).unwrap();
        for (path, content) in files {
            write(&source, path, content);
        }

        let mut site = Site::new(config).unwrap();
        site.set_directories(&source, dir.path().join("public"), dir.path().join("templates"));
        site.load_pages(&ParserRegistry::with_defaults()).unwrap();
        (dir, site)
    }

    #[test]
    fn test_determine_content_type() {
        let typed: Metadata = [("type", "author")].into_iter().collect();
        assert_eq!(Site::determine_content_type(&Page::new("x.md", "", typed)), "author");
        assert_eq!(
            Site::determine_content_type(&Page::new("blog/posts/a.md", "", Metadata::new())),
            "post"
        );
        assert_eq!(
            Site::determine_content_type(&Page::new("fr/index.md", "", Metadata::new())),
            "index"
        );
        assert_eq!(
            Site::determine_content_type(&Page::new("posts.md", "", Metadata::new())),
            "page"
        );
    }

    #[test]
    fn test_language_resolution() {
        let (_dir, site) = site_with(
            &[
                ("about.md", "About"),
                ("fr/about.md", "À propos"),
                ("de/uber.md", "Über"),
                ("api/intro.md", "Intro"),
                ("guide.md", "---\nlanguage: fr\n---\nGuide"),
            ],
            bilingual_config(),
        );

        assert_eq!(site.get_page("about.md").unwrap().language, "en");
        assert_eq!(site.get_page("fr/about.md").unwrap().language, "fr");
        // not a configured language
        assert_eq!(site.get_page("de/uber.md").unwrap().language, "en");
        assert_eq!(site.get_page("api/intro.md").unwrap().language, "en");
        assert_eq!(site.get_page("guide.md").unwrap().language, "fr");
    }

    #[test]
    fn test_round_trip_and_filtering() {
        let (_dir, site) = site_with(
            &[
                ("a.md", "A"),
                ("b/c.markdown", "C"),
                ("raw.html", "<p>raw</p>"),
                ("notes.txt", "skip"),
                (".drafts/hidden.md", "skip"),
            ],
            bilingual_config(),
        );

        let paths: Vec<_> = site.pages().map(|p| p.source_path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b/c.markdown", "raw.html"]);
        for path in paths {
            assert_eq!(site.get_page(path).unwrap().source_path, path);
        }
    }

    #[test]
    fn test_index_translations_example() {
        let (dir, site) = site_with(
            &[("index.md", "Home"), ("fr/index.md", "Accueil")],
            bilingual_config(),
        );

        let en = site.get_page("index.md").unwrap();
        let fr = site.get_page("fr/index.md").unwrap();
        assert_eq!(en.translation("fr"), Some("/fr/index.html"));
        assert_eq!(fr.translation("en"), Some("/index.html"));
        assert_eq!(en.output_path, dir.path().join("public/index.html"));
        assert_eq!(fr.output_path, dir.path().join("public/fr/index.html"));
    }

    #[test]
    fn test_translations_are_reciprocal() {
        let mut config = bilingual_config();
        config.site.languages.push("es".to_string());
        let (_dir, site) = site_with(
            &[
                ("about.md", "About"),
                ("fr/about.md", "À propos"),
                ("es/about.md", "Acerca"),
                ("fr/only-french.md", "Seul"),
                ("docs/guide.md", "Guide"),
                ("fr/docs/guide.md", "Guide FR"),
            ],
            config,
        );

        for page in site.pages() {
            for other in site.get_page_translations(page) {
                let back: Vec<_> = site
                    .get_page_translations(other)
                    .into_iter()
                    .map(|p| p.source_path.clone())
                    .collect();
                assert!(back.contains(&page.source_path), "{} -> {}", page.source_path, other.source_path);
            }
        }

        let about = site.get_page("about.md").unwrap();
        let langs: Vec<_> = site
            .get_page_translations(about)
            .into_iter()
            .map(|p| p.language.as_str())
            .collect();
        assert_eq!(langs, vec!["fr", "es"]);
        assert!(site.get_page("fr/only-french.md").unwrap().translations.is_empty());
        assert_eq!(
            site.get_page_translation_urls(site.get_page("docs/guide.md").unwrap()),
            BTreeMap::from([("fr".to_string(), "/fr/guide.html".to_string())])
        );
    }

    #[test]
    fn test_duplicate_language_is_excluded() {
        let (_dir, site) = site_with(
            &[
                ("fr/page.md", "Un"),
                ("page.md", "---\nlanguage: fr\nsave_as: deux.html\n---\nDeux"),
            ],
            bilingual_config(),
        );
        let group = &site.translation_groups()["page.md"];
        assert_eq!(group.get("fr").map(String::as_str), Some("fr/page.md"));
        assert!(site.get_page("page.md").unwrap().translations.is_empty());
        assert!(site.get_page("fr/page.md").unwrap().translations.is_empty());
    }

    #[test]
    fn test_routing_metadata_does_not_leak_into_page() {
        let (_dir, site) = site_with(&[("docs/index.md", "Docs")], bilingual_config());
        let page = site.get_page("docs/index.md").unwrap();
        assert_eq!(page.url, "docs/index.html");
        assert!(page.metadata.is_empty());
    }

    #[test]
    fn test_post_and_category_routes() {
        let (_dir, site) = site_with(
            &[
                ("posts/launch.md", "---\ndate: 2024-05-01\n---\nLaunch"),
                ("posts/notes.md", "+++\ndate = 2024-06-02\n+++\nNotes"),
                ("guides/setup.md", "---\ncategory: docs/start\nslug: setup-guide\n---\nSetup"),
            ],
            bilingual_config(),
        );
        assert_eq!(site.get_page("posts/launch.md").unwrap().url, "posts/2024/05/launch.html");
        assert_eq!(site.get_page("posts/notes.md").unwrap().url, "posts/2024/06/notes.html");
        assert_eq!(site.get_page("guides/setup.md").unwrap().url, "docs/start/setup-guide.html");
    }

    #[test]
    fn test_missing_directories() {
        let mut site = Site::new(bilingual_config()).unwrap();
        let err = site.load_pages(&ParserRegistry::with_defaults()).unwrap_err();
        assert!(matches!(err, SiteError::DirectoryNotSet("source")));
        assert!(err.is_configuration());

        site.set_directories("/nonexistent/content", "/tmp/out", "/tmp/tpl");
        let err = site.load_pages(&ParserRegistry::with_defaults()).unwrap_err();
        assert!(matches!(err, SiteError::MissingDirectory { kind: "source", .. }));
    }

    #[test]
    fn test_bad_frontmatter_fails_or_skips() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "good.md", "Good");
        write(dir.path(), "bad.md", "---\ntitle: [oops\n---\nBad");

        let mut site = Site::new(bilingual_config()).unwrap();
        site.set_directories(dir.path(), dir.path().join("out"), dir.path().join("tpl"));
        let err = site.load_pages(&ParserRegistry::with_defaults()).unwrap_err();
        assert!(err.to_string().contains("bad.md"));
        assert!(!err.is_configuration());

        let mut config = bilingual_config();
        config.build.on_page_error = PageErrorPolicy::Continue;
        let mut site = Site::new(config).unwrap();
        site.set_directories(dir.path(), dir.path().join("out"), dir.path().join("tpl"));
        assert_eq!(site.load_pages(&ParserRegistry::with_defaults()).unwrap(), 1);
        assert_eq!(site.skipped(), ["bad.md".to_string()]);
    }

    #[test]
    fn test_output_collision() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "docs/guide.md", "Docs guide");
        write(dir.path(), "guide.md", "Guide");

        let mut site = Site::new(bilingual_config()).unwrap();
        site.set_directories(dir.path(), dir.path().join("out"), dir.path().join("tpl"));
        let err = site.load_pages(&ParserRegistry::with_defaults()).unwrap_err();
        assert!(matches!(
            &err,
            SiteError::OutputCollision { kept, page, .. } if kept == "docs/guide.md" && page == "guide.md"
        ));
        assert!(err.to_string().contains("guide.html"));

        let mut config = bilingual_config();
        config.build.on_page_error = PageErrorPolicy::Continue;
        let mut site = Site::new(config).unwrap();
        site.set_directories(dir.path(), dir.path().join("out"), dir.path().join("tpl"));
        assert_eq!(site.load_pages(&ParserRegistry::with_defaults()).unwrap(), 1);
        assert!(site.get_page("docs/guide.md").is_some());
        assert_eq!(site.skipped(), ["guide.md".to_string()]);
    }

    #[test]
    fn test_invalid_utf8_is_content_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("binary.md"), [0xff, 0xfe, 0x00]).unwrap();

        let mut site = Site::new(bilingual_config()).unwrap();
        site.set_directories(dir.path(), dir.path().join("out"), dir.path().join("tpl"));
        let err = site.load_pages(&ParserRegistry::with_defaults()).unwrap_err();
        assert!(matches!(err, SiteError::Core(CoreError::Content { .. })));
        assert!(err.to_string().contains("binary.md"));
    }

    #[test]
    fn test_url_override_translation_is_site_absolute() {
        let (_dir, site) = site_with(
            &[
                ("about.md", "---\nurl: /company/about/\nsave_as: company/about/index.html\n---\nAbout"),
                ("fr/about.md", "À propos"),
            ],
            bilingual_config(),
        );

        let fr = site.get_page("fr/about.md").unwrap();
        assert_eq!(fr.translation("en"), Some("/company/about/"));
        let en = site.get_page("about.md").unwrap();
        assert_eq!(en.translation("fr"), Some("/fr/about.html"));
    }

    #[test]
    fn test_get_url() {
        let site = Site::new(bilingual_config()).unwrap();
        assert_eq!(site.get_url("/fr/about.html"), "https://example.com/fr/about.html");
        assert_eq!(site.get_url(""), "https://example.com");
    }
}
