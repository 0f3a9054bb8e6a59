//! Markdown rendering with syntax highlighting

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::HighlightConfig;
use crate::helpers::html_escape;

const MORE_MARKERS: [&str; 2] = ["<!-- more -->", "<!--more-->"];

/// A heading found while rendering, used for the table of contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub id: String,
    pub text: String,
}

/// Result of rendering one Markdown document
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub html: String,
    pub headings: Vec<Heading>,
}

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: String,
    highlight: bool,
    line_numbers: bool,
}

impl MarkdownRenderer {
    /// Create a new markdown renderer
    pub fn new() -> Self {
        Self::from_config(&HighlightConfig::default())
    }

    pub fn from_config(config: &HighlightConfig) -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            theme_name: config.theme.clone(),
            highlight: config.enable,
            line_numbers: config.line_number,
        }
    }

    /// Render markdown to HTML
    pub fn render(&self, markdown: &str) -> Rendered {
        // Front-matter is stripped before this point, so no metadata blocks
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_SMART_PUNCTUATION
            | Options::ENABLE_HEADING_ATTRIBUTES
            | Options::ENABLE_GFM;
        // Explicit `{#id}` anchors are reserved before any id is generated
        let mut taken: HashSet<String> = Parser::new_ext(markdown, options)
            .filter_map(|event| match event {
                Event::Start(Tag::Heading { id: Some(id), .. }) => Some(id.to_string()),
                _ => None,
            })
            .collect();
        let parser = Parser::new_ext(markdown, options);

        let mut events: Vec<Event> = Vec::new();
        let mut headings = Vec::new();
        let mut anchors: HashMap<String, usize> = HashMap::new();

        let mut code_block: Option<(Option<String>, String)> = None;
        let mut heading_start: Option<usize> = None;
        let mut heading_text = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .map(|lang| lang.to_string()),
                        CodeBlockKind::Indented => None,
                    };
                    code_block = Some((lang, String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, code)) = code_block.take() {
                        let highlighted = self.highlight_code(&code, lang.as_deref());
                        events.push(Event::Html(CowStr::from(highlighted)));
                    }
                }
                Event::Text(text) if code_block.is_some() => {
                    if let Some((_, code)) = code_block.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::Start(Tag::Heading { .. }) => {
                    heading_start = Some(events.len());
                    heading_text.clear();
                    events.push(event);
                }
                Event::End(TagEnd::Heading(level)) => {
                    if let Some(start) = heading_start.take() {
                        if let Event::Start(Tag::Heading { id, .. }) = &mut events[start] {
                            let anchor = match id {
                                Some(explicit) => explicit.to_string(),
                                None => unique_anchor(&heading_text, &mut anchors, &mut taken),
                            };
                            *id = Some(CowStr::from(anchor.clone()));
                            headings.push(Heading {
                                level: level as u8,
                                id: anchor,
                                text: heading_text.trim().to_string(),
                            });
                        }
                    }
                    events.push(event);
                }
                Event::Text(ref text) | Event::Code(ref text) if heading_start.is_some() => {
                    heading_text.push_str(text);
                    events.push(event);
                }
                _ => events.push(event),
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());

        Rendered {
            html: html_output,
            headings,
        }
    }

    /// Highlight a code block
    fn highlight_code(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.unwrap_or("text");
        let plain = || {
            format!(
                r#"<pre><code class="language-{}">{}</code></pre>"#,
                html_escape(lang),
                html_escape(code)
            )
        };

        if !self.highlight {
            return plain();
        }

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let theme = self
            .theme_set
            .themes
            .get(&self.theme_name)
            .or_else(|| self.theme_set.themes.get("base16-ocean.dark"));
        let Some(theme) = theme else {
            return plain();
        };

        match highlighted_html_for_string(code, &self.syntax_set, syntax, theme) {
            Ok(highlighted) if self.line_numbers => add_line_numbers(&highlighted, lang),
            Ok(highlighted) => format!(
                r#"<figure class="highlight {}">{}</figure>"#,
                html_escape(lang),
                highlighted
            ),
            Err(e) => {
                tracing::warn!("Highlighting {} failed: {}", lang, e);
                plain()
            }
        }
    }

    /// Split at the first `<!-- more -->` marker.
    /// Returns (excerpt, remainder) when a marker is present.
    pub fn split_excerpt(content: &str) -> Option<(&str, &str)> {
        MORE_MARKERS
            .iter()
            .filter_map(|marker| content.find(marker).map(|pos| (pos, marker.len())))
            .min_by_key(|(pos, _)| *pos)
            .map(|(pos, len)| (content[..pos].trim(), content[pos + len..].trim()))
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Slugified heading text, suffixed `-1`, `-2`, ... when repeated
fn unique_anchor(
    text: &str,
    seen: &mut HashMap<String, usize>,
    taken: &mut HashSet<String>,
) -> String {
    let mut base = slug::slugify(text.trim());
    if base.is_empty() {
        base = "section".to_string();
    }
    let count = seen.entry(base.clone()).or_insert(0);
    let anchor = loop {
        let candidate = if *count == 0 {
            base.clone()
        } else {
            format!("{}-{}", base, count)
        };
        *count += 1;
        if !taken.contains(&candidate) {
            break candidate;
        }
    };
    taken.insert(anchor.clone());
    anchor
}

/// Wrap highlighted code in a table with a line-number gutter
fn add_line_numbers(code: &str, lang: &str) -> String {
    let lines: Vec<&str> = code.lines().collect();

    let gutter = (1..=lines.len())
        .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code">{}</td></tr></table></figure>"#,
        html_escape(lang),
        gutter,
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_renderer() -> MarkdownRenderer {
        MarkdownRenderer::from_config(&HighlightConfig {
            enable: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let rendered = renderer.render("# Hello World\n\nThis is a test.");
        assert!(rendered.html.contains(r#"<h1 id="hello-world">Hello World</h1>"#));
        assert!(rendered.html.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_render_code_block_highlighted() {
        let renderer = MarkdownRenderer::new();
        let rendered = renderer.render("```swift\nlet x = 1\n```");
        assert!(rendered.html.contains(r#"<figure class="highlight swift">"#));
        assert!(rendered.html.contains("<pre style="));
    }

    #[test]
    fn test_render_code_block_plain() {
        let rendered = plain_renderer().render("```rust\nif a < b {}\n```");
        assert!(rendered
            .html
            .contains(r#"<pre><code class="language-rust">if a &lt; b {}"#));
    }

    #[test]
    fn test_heading_anchors_are_unique() {
        let rendered = plain_renderer().render("## Setup\n\ntext\n\n## Setup\n\n### `State` and Binding {#state}");
        let ids: Vec<_> = rendered.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["setup", "setup-1", "state"]);
        assert_eq!(rendered.headings[2].text, "State and Binding");
        assert_eq!(rendered.headings[2].level, 3);
        assert!(rendered.html.contains(r#"<h2 id="setup-1">"#));
    }

    #[test]
    fn test_generated_anchors_avoid_explicit_ids() {
        let markdown = "## Intro\n\n## Overview {#intro}\n\n## Intro\n\n## Intro 1";
        let rendered = plain_renderer().render(markdown);
        let ids: Vec<_> = rendered.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["intro-1", "intro", "intro-2", "intro-1-1"]);
    }

    #[test]
    fn test_raw_html_passes_through() {
        let rendered = plain_renderer().render("<figure class=\"figure\"><img src=\"/a.png\" alt=\"\"></figure>\n\nAfter");
        assert!(rendered.html.contains(r#"<img src="/a.png" alt="">"#));
        assert!(rendered.html.contains("<p>After</p>"));
    }

    #[test]
    fn test_split_excerpt() {
        let content = "This is excerpt.\n<!-- more -->\nThis is more content.";
        let (excerpt, rest) = MarkdownRenderer::split_excerpt(content).unwrap();
        assert_eq!(excerpt, "This is excerpt.");
        assert_eq!(rest, "This is more content.");

        let (excerpt, _) = MarkdownRenderer::split_excerpt("Intro<!--more-->Body").unwrap();
        assert_eq!(excerpt, "Intro");

        assert!(MarkdownRenderer::split_excerpt("No marker").is_none());
    }
}
