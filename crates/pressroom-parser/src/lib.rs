//! Pressroom Parser Library
//!
//! Converts content bodies to HTML. Parsers are registered per file
//! extension; front matter has already been stripped by the time a parser
//! sees the text.

pub mod markdown;

use std::{collections::HashMap, fmt, sync::Arc};

pub use markdown::MarkdownParser;
use thiserror::Error;

/// Parser errors.
#[derive(Debug, Error)]
pub enum ParserError {
    /// No parser is registered for the extension.
    #[error("no parser registered for extension: {0}")]
    UnknownExtension(String),

    /// The parser rejected the input.
    #[error("parse failed: {message}")]
    Failed { message: String },
}

impl ParserError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Result type for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;

/// Converts a content body to HTML.
pub trait ContentParser: Send + Sync {
    /// Parse text into HTML.
    fn parse(&self, text: &str) -> Result<String>;
}

/// Passes HTML bodies through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl ContentParser for HtmlParser {
    fn parse(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Parsers keyed by lowercase file extension.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn ContentParser>>,
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

impl ParserRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with Markdown (`md`, `markdown`) and HTML (`html`, `htm`).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let markdown: Arc<dyn ContentParser> = Arc::new(MarkdownParser::new());
        let html: Arc<dyn ContentParser> = Arc::new(HtmlParser);
        registry.register_shared("md", Arc::clone(&markdown));
        registry.register_shared("markdown", markdown);
        registry.register_shared("html", Arc::clone(&html));
        registry.register_shared("htm", html);
        registry
    }

    /// Register a parser, replacing any existing one for the extension.
    pub fn register(&mut self, extension: &str, parser: impl ContentParser + 'static) {
        self.register_shared(extension, Arc::new(parser));
    }

    /// Register an already shared parser.
    pub fn register_shared(&mut self, extension: &str, parser: Arc<dyn ContentParser>) {
        self.parsers.insert(normalize_extension(extension), parser);
    }

    /// Parser for an extension.
    pub fn get(&self, extension: &str) -> Option<Arc<dyn ContentParser>> {
        self.parsers.get(&normalize_extension(extension)).cloned()
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.parsers.contains_key(&normalize_extension(extension))
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.parsers.keys().cloned().collect();
        extensions.sort();
        extensions
    }

    /// Parse text with the parser registered for `extension`.
    pub fn parse(&self, extension: &str, text: &str) -> Result<String> {
        self.get(extension)
            .ok_or_else(|| ParserError::UnknownExtension(extension.to_string()))?
            .parse(text)
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_lowercase()
}
