//! Markdown parser using pulldown-cmark.

use std::collections::HashMap;

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};

use crate::{ContentParser, Result};

/// Markdown to HTML converter.
///
/// Headings without an explicit `{#id}` get an id derived from their text so
/// that they can be linked to.
#[derive(Debug, Clone)]
pub struct MarkdownParser {
    options: Options,
    heading_anchors: bool,
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownParser {
    /// Create a new markdown parser with default options.
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self {
            options,
            heading_anchors: true,
        }
    }

    /// Enable or disable generated heading ids.
    #[must_use]
    pub fn with_heading_anchors(mut self, enabled: bool) -> Self {
        self.heading_anchors = enabled;
        self
    }

    /// Render a markdown body to HTML.
    pub fn render(&self, body: &str) -> String {
        let mut events: Vec<Event<'_>> = Parser::new_ext(body, self.options).collect();
        if self.heading_anchors {
            assign_heading_ids(&mut events);
        }

        let mut out = String::with_capacity(body.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }
}

impl ContentParser for MarkdownParser {
    fn parse(&self, text: &str) -> Result<String> {
        Ok(self.render(text))
    }
}

fn assign_heading_ids(events: &mut [Event<'_>]) {
    let mut seen: HashMap<String, usize> = HashMap::new();

    for i in 0..events.len() {
        let Event::Start(Tag::Heading { id: None, .. }) = &events[i] else {
            continue;
        };

        let base = slugify(&heading_text(&events[i + 1..]));
        if base.is_empty() {
            continue;
        }
        let count = seen.entry(base.clone()).or_insert(0);
        let anchor = if *count == 0 {
            base
        } else {
            format!("{base}-{count}")
        };
        *count += 1;

        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(anchor));
        }
    }
}

fn heading_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

/// Convert text to a URL-safe slug.
fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
