//! Plugin contract.
//!
//! Plugins run in registration order. Every plugin transforms rendered page
//! HTML; optional capabilities (build hooks, head injection) are exposed
//! through sub-traits that a plugin opts into by returning `Some(self)`.

use thiserror::Error;

use pressroom_core::config::PluginOptions;

use crate::site::Site;

/// Plugin errors.
#[derive(Debug, Error)]
#[error("plugin `{name}`: {message}")]
pub struct PluginError {
    pub name: String,
    pub message: String,
}

impl PluginError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

/// A build pipeline extension.
pub trait Plugin: Send + Sync {
    /// Unique plugin name; also the key of its `[plugins.<name>]` options.
    fn name(&self) -> &str;

    /// Called once when the plugin is added to an engine.
    fn initialize(&mut self, _options: &PluginOptions) -> Result<()> {
        Ok(())
    }

    /// Transform the HTML of one page.
    ///
    /// Called concurrently for different pages.
    fn process_content(&self, html: String) -> String;

    /// Pre/post build hooks, if the plugin has any.
    fn build_hooks(&mut self) -> Option<&mut dyn BuildHooks> {
        None
    }

    /// Head injection, if the plugin provides any.
    fn head_content(&self) -> Option<&dyn HeadContent> {
        None
    }

    /// Release resources; called by `Engine::clean`.
    fn cleanup(&mut self) {}
}

/// Hooks run before discovery and after every page has been written.
pub trait BuildHooks {
    fn pre_build(&mut self, _site: &Site) -> Result<()> {
        Ok(())
    }

    fn post_build(&mut self, _site: &Site) -> Result<()> {
        Ok(())
    }
}

/// Markup injected into every page's `<head>`.
pub trait HeadContent {
    fn get_head_content(&self) -> String;
}

/// Joins the head content of every plugin that provides some, in order.
pub fn collect_head_content(plugins: &[Box<dyn Plugin>]) -> String {
    plugins
        .iter()
        .filter_map(|p| p.head_content())
        .map(|h| h.get_head_content())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pipes HTML through every plugin in order.
pub fn apply_content(plugins: &[Box<dyn Plugin>], html: String) -> String {
    plugins
        .iter()
        .fold(html, |html, plugin| plugin.process_content(html))
}
