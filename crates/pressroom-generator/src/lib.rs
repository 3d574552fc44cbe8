//! Pressroom Generator Library
//!
//! The build pipeline: content discovery, translation indexing, plugins,
//! template rendering and asset sync.
//!
//! # Modules
//!
//! - [`site`] - Content discovery and the translation index
//! - [`plugin`] - Plugin contract and hook capabilities
//! - [`template`] - Template contract and the default interpolation renderer
//! - [`assets`] - Static asset mirroring and the asset manifest
//! - [`sitemap`] - The `sitemap` post-build plugin
//! - [`feed`] - The `rss` post-build plugin
//! - [`engine`] - Build orchestration

pub mod assets;
pub mod engine;
pub mod feed;
pub mod plugin;
pub mod site;
pub mod sitemap;
pub mod template;

pub use assets::{AssetManifest, AssetSync};
pub use engine::{BuildError, BuildStats, CancelToken, Engine, ErrorKind};
pub use feed::{RssError, RssPlugin};
pub use plugin::{BuildHooks, HeadContent, Plugin, PluginError};
pub use site::{Site, SiteError};
pub use sitemap::{SitemapError, SitemapPlugin};
pub use template::{
    CategoryContext, RenderContext, Template, TemplateError, TemplateRegistry, TemplateRenderer,
};
