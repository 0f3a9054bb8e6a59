//! Built-in theme templates using the Tera template engine
//!
//! Every built-in template is embedded in the binary. A theme's
//! `layout/*.html` files are registered afterwards and replace built-ins
//! with the same name.

use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::error::BuildError;
use crate::helpers::{strip_html, truncate, url_for_root};
use crate::theme::ThemeLoader;

/// Stylesheet shipped with the built-in templates
pub const BUILTIN_CSS: &str = include_str!("theme/blogsmith.css");
/// Where the built-in stylesheet is published
pub const BUILTIN_CSS_PATH: &str = "css/blogsmith.css";

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Load the built-in templates, then the theme's overrides
    pub fn new(root: &str, theme: Option<&ThemeLoader>) -> Result<Self, BuildError> {
        let mut tera = Tera::default();

        // Text fields are escaped with `| escape` in the templates; rendered
        // Markdown and URLs go through untouched
        tera.autoescape_on(vec![]);

        tera.add_raw_templates(vec![
            ("base.html", include_str!("theme/base.html")),
            ("macros.html", include_str!("theme/macros.html")),
            ("index.html", include_str!("theme/index.html")),
            ("post.html", include_str!("theme/post.html")),
            ("page.html", include_str!("theme/page.html")),
            ("about.html", include_str!("theme/about.html")),
            ("projects.html", include_str!("theme/projects.html")),
            ("archive.html", include_str!("theme/archive.html")),
            ("tags.html", include_str!("theme/tags.html")),
            ("term.html", include_str!("theme/term.html")),
        ])
        .map_err(BuildError::template)?;

        if let Some(theme) = theme {
            let overrides: Vec<(&str, &str)> = theme
                .layouts()
                .iter()
                .map(|(name, source)| (name.as_str(), source.as_str()))
                .collect();
            if !overrides.is_empty() {
                tera.add_raw_templates(overrides)
                    .map_err(BuildError::template)?;
            }
        }

        tera.register_filter("strip_html", strip_html_filter);
        tera.register_filter("truncate_chars", truncate_chars_filter);
        let root = root.to_string();
        tera.register_function(
            "url_for",
            move |args: &HashMap<String, tera::Value>| -> tera::Result<tera::Value> {
                let path = match args.get("path") {
                    Some(val) => tera::from_value::<String>(val.clone())?,
                    None => String::new(),
                };
                Ok(tera::Value::String(url_for_root(&root, &path)))
            },
        );

        Ok(Self { tera })
    }

    /// Whether a template with this name is registered
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String, BuildError> {
        self.tera
            .render(template_name, context)
            .map_err(BuildError::template)
    }
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    Ok(tera::Value::String(strip_html(&s)))
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "…".to_string(),
    };

    Ok(tera::Value::String(truncate(&s, length, Some(&omission))))
}

// Template context data

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub keywords: String,
    pub author: String,
    pub language: String,
    pub url: String,
    pub root: String,
    pub css_url: String,
    pub atom_url: Option<String>,
    pub rss_url: Option<String>,
    pub search_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuItem {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteStats {
    pub post_count: usize,
    pub tag_count: usize,
    pub category_count: usize,
    pub word_count: usize,
    pub recent_posts: Vec<NavPost>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TermLink {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub title: String,
    /// Formatted with `date_format`
    pub date: String,
    /// ISO 8601, for `<time datetime>`
    pub datetime: String,
    pub updated: String,
    pub year: i32,
    pub url: String,
    pub permalink: String,
    pub tags: Vec<TermLink>,
    pub categories: Vec<TermLink>,
    pub authors: Vec<String>,
    pub description: String,
    pub image: Option<String>,
    /// Excerpt, or the whole body when there is no `<!-- more -->`
    pub teaser: String,
    pub has_more: bool,
    /// Full body; only filled for the post's own page
    pub content: String,
    pub word_count: usize,
    pub draft: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub title: String,
    pub date: Option<String>,
    pub updated: Option<String>,
    pub url: String,
    pub permalink: String,
    pub content: String,
    pub layout: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavPost {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageLink {
    pub number: usize,
    pub url: String,
    pub current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationData {
    pub per_page: usize,
    pub total: usize,
    pub current: usize,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
    /// Page links around the current page; `None` marks a gap
    pub pages: Vec<Option<PageLink>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveYearData {
    pub year: i32,
    pub posts: Vec<PostData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TermData {
    pub name: String,
    pub slug: String,
    pub url: String,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_templates_load() {
        let renderer = TemplateRenderer::new("/", None).unwrap();
        for name in ["index.html", "post.html", "page.html", "archive.html", "term.html"] {
            assert!(renderer.has_template(name), "{} missing", name);
        }
    }

    #[test]
    fn test_theme_override_replaces_builtin() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("layout")).unwrap();
        fs::write(
            tmp.path().join("layout/page.html"),
            "<h1>{{ page.title }}</h1>{{ url_for(path='about/') }}",
        )
        .unwrap();
        let theme = ThemeLoader::load(tmp.path()).unwrap();
        let renderer = TemplateRenderer::new("/blog/", Some(&theme)).unwrap();

        let mut context = Context::new();
        context.insert(
            "page",
            &PageData {
                title: "About".to_string(),
                date: None,
                updated: None,
                url: "/blog/about/".to_string(),
                permalink: "https://example.com/blog/about/".to_string(),
                content: String::new(),
                layout: "page".to_string(),
            },
        );
        assert_eq!(
            renderer.render("page.html", &context).unwrap(),
            "<h1>About</h1>/blog/about/"
        );
    }

    #[test]
    fn test_filters() {
        let mut tera = Tera::default();
        tera.register_filter("strip_html", strip_html_filter);
        tera.register_filter("truncate_chars", truncate_chars_filter);
        tera.add_raw_template(
            "t",
            "{{ html | strip_html | truncate_chars(length=8, omission='...') }}",
        )
        .unwrap();
        let mut context = Context::new();
        context.insert("html", "<p>Hello <b>World</b></p>");
        assert_eq!(tera.render("t", &context).unwrap(), "Hello...");
    }
}
