//! Build orchestration.
//!
//! One call to [`Engine::build`] runs every stage in order:
//!
//! 1. validate directories and create the output directory
//! 2. plugin `pre_build` hooks
//! 3. full page discovery
//! 4. per-page transform (parse, plugins, render), in parallel
//! 5. page writes, in parallel
//! 6. plugin `post_build` hooks
//! 7. static asset sync and manifest
//!
//! Stage 4 starts only after discovery has finished. Stage 5 starts only once
//! every page has rendered, so a fail-fast build that hits a broken page
//! leaves no new pages behind.
//! Stages 6 and 7 run after every page worker has been joined.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use rayon::prelude::*;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use pressroom_core::{Config, CoreError, Page, config::PageErrorPolicy};
use pressroom_parser::{ContentParser, ParserRegistry};

use crate::{
    assets::{AssetError, AssetSync},
    plugin::{self, Plugin, PluginError},
    site::{Site, SiteError},
    template::{
        CategoryContext, PageContext, RenderContext, TemplateError, TemplateRegistry,
        TemplateRenderer, TranslationLink,
    },
};

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Missing or unusable directories and similar setup problems.
    #[error("configuration error: {0}")]
    Config(String),

    /// A page could not be parsed.
    #[error("content error in {path}: {message}")]
    Content { path: String, message: String },

    /// A page could not be rendered.
    #[error("render error in {path}: {source}")]
    Render {
        path: String,
        #[source]
        source: TemplateError,
    },

    /// Writing output failed.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Asset sync failed.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// A plugin hook failed.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// The build was cancelled.
    #[error("build cancelled")]
    Cancelled,

    /// Discovery failed.
    #[error(transparent)]
    Site(#[from] SiteError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Broad classification of a [`BuildError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Content,
    Render,
    Io,
    Plugin,
    Cancelled,
}

impl BuildError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Content { .. } => ErrorKind::Content,
            Self::Render { .. } => ErrorKind::Render,
            Self::Io { .. } | Self::Asset(_) => ErrorKind::Io,
            Self::Plugin(_) => ErrorKind::Plugin,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Site(e) if e.is_configuration() => ErrorKind::Configuration,
            Self::Site(_) => ErrorKind::Content,
            Self::Core(e) if e.is_config() => ErrorKind::Configuration,
            Self::Core(_) => ErrorKind::Content,
        }
    }

    /// Relative source path of the page the error belongs to, if any.
    pub fn page(&self) -> Option<&str> {
        match self {
            Self::Content { path, .. } | Self::Render { path, .. } => Some(path.as_str()),
            Self::Site(SiteError::Read { path, .. })
            | Self::Site(SiteError::OutputCollision { page: path, .. }) => Some(path.as_str()),
            Self::Site(SiteError::Core(
                CoreError::Content { path, .. } | CoreError::Frontmatter { path, .. },
            )) => path.to_str(),
            _ => None,
        }
    }
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Build statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Number of pages written.
    pub pages: usize,

    /// Pages skipped under the `continue` error policy.
    pub failed: usize,

    /// Number of static files copied.
    pub assets: usize,

    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

/// Shared cancellation flag for a running build.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(BuildError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Drives the build pipeline.
pub struct Engine {
    site: Site,
    parsers: ParserRegistry,
    plugins: Vec<Box<dyn Plugin>>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
    static_dir: PathBuf,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("site", &self.site)
            .field("parsers", &self.parsers)
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("custom_renderer", &self.renderer.is_some())
            .field("static_dir", &self.static_dir)
            .finish()
    }
}

impl Engine {
    /// Create an engine with directories taken from the configuration and
    /// the default parsers.
    pub fn new(config: Config) -> Result<Self> {
        let build = config.build.clone();
        let mut site = Site::new(config)?;
        site.set_directories(build.source_dir, build.output_dir, build.template_dir);

        Ok(Self {
            site,
            parsers: ParserRegistry::with_defaults(),
            plugins: Vec::new(),
            renderer: None,
            static_dir: build.static_dir,
        })
    }

    /// Override the source, output and template directories.
    pub fn set_directories(
        &mut self,
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        templates: impl Into<PathBuf>,
    ) {
        self.site.set_directories(source, output, templates);
    }

    pub fn set_static_dir(&mut self, dir: impl Into<PathBuf>) {
        self.static_dir = dir.into();
    }

    /// Use a custom template renderer instead of the template directory.
    #[must_use]
    pub fn with_renderer(mut self, renderer: impl TemplateRenderer + 'static) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Register a parser for a file extension.
    pub fn register_parser(&mut self, extension: &str, parser: impl ContentParser + 'static) {
        self.parsers.register(extension, parser);
    }

    /// Initialize a plugin with its configured options and append it.
    ///
    /// Plugins run in the order they are added.
    pub fn add_plugin(&mut self, mut plugin: impl Plugin + 'static) -> Result<()> {
        let options = self.site.config().plugin_options(plugin.name());
        plugin.initialize(&options)?;
        debug!(plugin = plugin.name(), "plugin added");
        self.plugins.push(Box::new(plugin));
        Ok(())
    }

    pub fn get_plugin(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    /// Plugin names in execution order.
    pub fn plugins(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn config(&self) -> &Config {
        self.site.config()
    }

    /// Run a full build.
    pub fn build(&mut self) -> Result<BuildStats> {
        self.build_with_cancel(&CancelToken::new())
    }

    /// Run a full build, stopping at the next checkpoint once `cancel` fires.
    pub fn build_with_cancel(&mut self, cancel: &CancelToken) -> Result<BuildStats> {
        let start = Instant::now();
        let mut stats = BuildStats::default();

        let output_dir = self.prepare_directories()?;
        info!(
            source = ?self.site.source_dir(),
            output = %output_dir.display(),
            "starting build"
        );
        cancel.check()?;

        for plugin in &mut self.plugins {
            if let Some(hooks) = plugin.build_hooks() {
                hooks.pre_build(&self.site)?;
            }
        }
        cancel.check()?;

        self.site.clear();
        self.site.load_pages(&self.parsers)?;
        stats.failed += self.site.skipped().len();
        cancel.check()?;

        let renderer = self.renderer()?;
        let head = plugin::collect_head_content(&self.plugins);
        let best_effort = self.config().build.on_page_error == PageErrorPolicy::Continue;
        let pages: Vec<&Page> = self.site.pages().collect();
        info!(count = pages.len(), "generating pages");

        // Nothing is written until every page has rendered.
        let rendered: Vec<Result<String>> = pages
            .par_iter()
            .map(|page| {
                cancel.check()?;
                self.render_with(page, renderer.as_ref(), &head)
            })
            .collect();

        let mut ready = Vec::with_capacity(pages.len());
        for (page, result) in pages.iter().zip(rendered) {
            match result {
                Ok(html) => ready.push((*page, html)),
                Err(BuildError::Cancelled) => return Err(BuildError::Cancelled),
                Err(e) if best_effort => {
                    warn!(page = %page.source_path, error = %e, "failed to generate page");
                    stats.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        cancel.check()?;

        let written: Vec<Result<()>> = ready
            .par_iter()
            .map(|(page, html)| {
                write_atomic(&page.output_path, html)?;
                debug!(page = %page.source_path, path = %page.output_path.display(), "wrote page");
                Ok(())
            })
            .collect();

        for ((page, _), result) in ready.iter().zip(written) {
            match result {
                Ok(()) => stats.pages += 1,
                Err(e) if best_effort => {
                    warn!(page = %page.source_path, error = %e, "failed to write page");
                    stats.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        cancel.check()?;

        for plugin in &mut self.plugins {
            if let Some(hooks) = plugin.build_hooks() {
                hooks.post_build(&self.site)?;
            }
        }
        cancel.check()?;

        let manifest =
            AssetSync::new(&self.config().build.static_url).sync(&self.static_dir, &output_dir)?;
        stats.assets = manifest.len();

        stats.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            pages = stats.pages,
            failed = stats.failed,
            assets = stats.assets,
            duration_ms = stats.duration_ms,
            "build complete"
        );

        Ok(stats)
    }

    /// Render one page without writing it.
    pub fn render_page(&self, page: &Page) -> Result<String> {
        let renderer = self.renderer()?;
        let head = plugin::collect_head_content(&self.plugins);
        self.render_with(page, renderer.as_ref(), &head)
    }

    /// Remove the output tree and reset all per-build state.
    pub fn clean(&mut self) -> Result<()> {
        if let Some(output) = self.site.output_dir()
            && output.exists()
        {
            info!(dir = %output.display(), "removing output directory");
            fs::remove_dir_all(output).map_err(|e| BuildError::io(output, e))?;
        }

        self.site.router().clear_cache();
        self.site.clear();
        for plugin in &mut self.plugins {
            plugin.cleanup();
        }
        Ok(())
    }

    fn prepare_directories(&self) -> Result<PathBuf> {
        self.site
            .require_source_dir()
            .map_err(|e| BuildError::Config(e.to_string()))?;
        let output = self
            .site
            .require_output_dir()
            .map_err(|e| BuildError::Config(e.to_string()))?
            .to_path_buf();

        if output.exists() && !output.is_dir() {
            return Err(BuildError::Config(format!(
                "output path is not a directory: {}",
                output.display()
            )));
        }
        fs::create_dir_all(&output).map_err(|e| BuildError::io(&output, e))?;
        Ok(output)
    }

    fn renderer(&self) -> Result<Arc<dyn TemplateRenderer>> {
        if let Some(renderer) = &self.renderer {
            return Ok(Arc::clone(renderer));
        }
        let dir = self
            .site
            .template_dir()
            .ok_or_else(|| BuildError::Config("template directory is not set".to_string()))?;
        let registry = TemplateRegistry::load_dir(dir)
            .map_err(|e| BuildError::Config(format!("failed to load templates: {e}")))?;
        Ok(Arc::new(registry))
    }

    fn render_with(
        &self,
        page: &Page,
        renderer: &dyn TemplateRenderer,
        head: &str,
    ) -> Result<String> {
        let config = self.config();
        let template = page
            .template()
            .unwrap_or_else(|| config.build.default_template.clone());

        let extension = page.extension().unwrap_or_default();
        let parser = self
            .parsers
            .get(&extension)
            .ok_or_else(|| BuildError::Content {
                path: page.source_path.clone(),
                message: format!("no parser registered for extension `{extension}`"),
            })?;
        let html = parser
            .parse(&page.content)
            .map_err(|e| BuildError::Content {
                path: page.source_path.clone(),
                message: e.to_string(),
            })?;
        let html = plugin::apply_content(&self.plugins, html);

        let available_translations = self
            .site
            .get_page_translations(page)
            .into_iter()
            .map(|p| TranslationLink {
                language: p.language.clone(),
                url: p.absolute_url(),
                title: p.title(),
            })
            .collect();

        let context = RenderContext {
            page: PageContext {
                source_path: page.source_path.clone(),
                title: page.title(),
                slug: page.slug(),
                url: page.url.clone(),
                language: page.language.clone(),
                content_type: page.content_type.clone(),
                output_path: page.output_path.to_string_lossy().into_owned(),
                metadata: page.metadata.clone(),
                content: page.content.clone(),
                category: page.metadata.category().and_then(|name| {
                    CategoryContext::resolve(self.site.router().categories(), &name)
                }),
            },
            site_name: config.site.name.clone(),
            site_url: config.site.base_url.trim_end_matches('/').to_string(),
            static_url: config.build.static_url.clone(),
            page_content: html,
            page_head_content: head.to_string(),
            translations: self.site.get_page_translation_urls(page),
            available_translations,
        };

        renderer
            .render(&template, &context)
            .map_err(|source| BuildError::Render {
                path: page.source_path.clone(),
                source,
            })
    }
}

/// Write through a temporary file in the target directory so readers never
/// observe a partially written page.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;

    let mut file = NamedTempFile::new_in(parent).map_err(|e| BuildError::io(parent, e))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| BuildError::io(path, e))?;
    file.persist(path).map_err(|e| BuildError::io(path, e.error))?;
    Ok(())
}
