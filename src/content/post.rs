//! Post, Page and taxonomy models

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::markdown::Heading;
use crate::assets::AssetRef;
use crate::helpers::{strip_html, truncate, url_for_root, word_count};

/// Length of a description derived from the post body
const DESCRIPTION_LENGTH: usize = 160;

/// A blog post
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub title: String,
    pub slug: String,

    /// Publication date
    pub date: DateTime<FixedOffset>,
    /// Last updated date; the publication date when not given
    pub updated: DateTime<FixedOffset>,

    pub draft: bool,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub authors: Vec<String>,

    /// Front-matter summary, plain text
    pub summary: Option<String>,
    /// Cover image URL
    pub image: Option<String>,

    /// Markdown body after front-matter
    pub raw: String,
    /// Rendered HTML content
    pub content: String,
    /// Rendered HTML before `<!-- more -->`
    pub excerpt: Option<String>,
    pub headings: Vec<Heading>,
    /// Whether the post page shows a table of contents
    pub toc: bool,

    pub layout: String,

    /// Source path relative to the source directory
    pub source: String,
    pub full_source: PathBuf,
    /// Directory of a bundled post (`<slug>/index.md`)
    pub bundle_dir: Option<PathBuf>,

    /// Route relative to the site root, e.g. `2024/01/15/hello/`
    pub path: String,
    /// Rooted URL, e.g. `/blog/2024/01/15/hello/`
    pub url: String,
    /// Absolute URL including the site domain
    pub permalink: String,

    /// Local files referenced from the post
    #[serde(skip)]
    pub assets: Vec<AssetRef>,

    #[serde(skip)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Post {
    /// Plain-text description: the summary, else the start of the excerpt
    /// or body
    pub fn description(&self) -> String {
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            return summary.trim().to_string();
        }
        let html = self.excerpt.as_deref().unwrap_or(&self.content);
        truncate(&strip_html(html), DESCRIPTION_LENGTH, Some("…"))
    }

    /// HTML shown in lists and summary feeds
    pub fn teaser(&self) -> &str {
        self.excerpt.as_deref().unwrap_or(&self.content)
    }

    pub fn word_count(&self) -> usize {
        word_count(&self.content)
    }
}

/// A standalone page
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub title: String,
    pub date: Option<DateTime<FixedOffset>>,
    pub updated: Option<DateTime<FixedOffset>>,

    /// `page`, `about`, `projects`, `archive` or `tags`
    pub layout: String,

    pub raw: String,
    pub content: String,
    pub headings: Vec<Heading>,
    pub toc: bool,

    pub source: String,
    pub full_source: PathBuf,

    pub path: String,
    pub url: String,
    pub permalink: String,

    #[serde(skip)]
    pub assets: Vec<AssetRef>,

    #[serde(skip)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A tag or category with its posts
#[derive(Debug, Clone, Serialize)]
pub struct Term {
    pub name: String,
    pub slug: String,
    /// Route relative to the site root
    pub path: String,
    pub url: String,
    pub count: usize,
}

impl Term {
    pub fn new(name: &str, root: &str, dir: &str) -> Self {
        let slug = term_slug(name);
        let path = format!("{}/{}/", dir.trim_matches('/'), slug);
        let url = url_for_root(root, &path);
        Self {
            name: name.to_string(),
            slug,
            path,
            url,
            count: 0,
        }
    }
}

/// Slug of a tag or category name; names without any sluggable
/// characters keep their trimmed text
pub fn term_slug(name: &str) -> String {
    let slug = slug::slugify(name.trim());
    if slug.is_empty() {
        name.trim().to_string()
    } else {
        slug
    }
}
