//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::BuildError;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub keywords: Option<Vec<String>>,
    pub author: String,
    pub language: String,
    pub timezone: String,

    // URL
    pub url: String,
    pub root: String,
    pub permalink: String,

    // Directory
    pub source_dir: String,
    pub public_dir: String,
    pub tag_dir: String,
    pub archive_dir: String,
    pub category_dir: String,
    pub project_dir: String,
    #[serde(default)]
    pub skip_render: Vec<String>,

    // Writing
    pub new_post_name: String,
    pub default_layout: String,
    pub render_drafts: bool,
    pub future: bool,
    pub check_links: bool,
    pub external_link: ExternalLinkConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,

    // Home page
    #[serde(default)]
    pub index_generator: IndexGeneratorConfig,

    // Feeds
    #[serde(default)]
    pub feed: FeedConfig,

    // Date format (Moment.js style tokens)
    pub date_format: String,

    // Pagination
    pub per_page: usize,
    pub pagination_dir: String,

    // Navigation, in display order
    pub menu: IndexMap<String, String>,

    // Extensions
    pub theme: String,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let mut menu = IndexMap::new();
        menu.insert("Home".to_string(), "/".to_string());
        menu.insert("Archives".to_string(), "/archives/".to_string());
        menu.insert("Tags".to_string(), "/tags/".to_string());

        Self {
            title: "blogsmith".to_string(),
            subtitle: String::new(),
            description: String::new(),
            keywords: None,
            author: "John Doe".to_string(),
            language: "en".to_string(),
            timezone: String::new(),

            url: "http://example.com".to_string(),
            root: "/".to_string(),
            permalink: ":year/:month/:day/:title/".to_string(),

            source_dir: "source".to_string(),
            public_dir: "public".to_string(),
            tag_dir: "tags".to_string(),
            archive_dir: "archives".to_string(),
            category_dir: "categories".to_string(),
            project_dir: "projects".to_string(),
            skip_render: Vec::new(),

            new_post_name: ":title.md".to_string(),
            default_layout: "post".to_string(),
            render_drafts: false,
            future: true,
            check_links: true,
            external_link: ExternalLinkConfig::default(),
            highlight: HighlightConfig::default(),

            index_generator: IndexGeneratorConfig::default(),

            feed: FeedConfig::default(),

            date_format: "YYYY-MM-DD".to_string(),

            per_page: 10,
            pagination_dir: "page".to_string(),

            menu,

            theme: String::new(),
            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: SiteConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        config.timezone()?;
        Ok(config)
    }

    /// Resolve the configured timezone; an empty name means UTC
    pub fn timezone(&self) -> Result<Tz, BuildError> {
        let name = self.timezone.trim();
        if name.is_empty() {
            return Ok(Tz::UTC);
        }
        name.parse::<Tz>()
            .map_err(|_| BuildError::Config(format!("unknown timezone {:?}", name)))
    }

    /// Posts per index page, preferring the index generator setting
    pub fn index_per_page(&self) -> usize {
        let per_page = if self.index_generator.per_page > 0 {
            self.index_generator.per_page
        } else {
            self.per_page
        };
        per_page.max(1)
    }

    /// Site root with exactly one leading and one trailing slash
    pub fn normalized_root(&self) -> String {
        let trimmed = self.root.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        }
    }
}

/// Code highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub enable: bool,
    /// A syntect built-in theme name
    pub theme: String,
    pub line_number: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enable: true,
            theme: "base16-ocean.dark".to_string(),
            line_number: false,
        }
    }
}

/// Rendering of links that leave the site
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalLinkConfig {
    /// Open external links in a new tab
    pub enable: bool,
    /// Hosts treated as internal
    pub exclude: Vec<String>,
}

impl Default for ExternalLinkConfig {
    fn default() -> Self {
        Self {
            enable: true,
            exclude: Vec::new(),
        }
    }
}

/// Index generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexGeneratorConfig {
    pub per_page: usize,
    /// `-date` (newest first) or `date`
    pub order_by: String,
}

impl Default for IndexGeneratorConfig {
    fn default() -> Self {
        Self {
            per_page: 0,
            order_by: "-date".to_string(),
        }
    }
}

/// What a feed entry carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedContent {
    Summary,
    Full,
}

/// Atom / RSS feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Output path of the Atom feed; empty disables it
    pub atom: String,
    /// Output path of the RSS 2.0 feed; empty disables it
    pub rss: String,
    pub limit: usize,
    pub content: FeedContent,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            atom: "atom.xml".to_string(),
            rss: "rss.xml".to_string(),
            limit: 20,
            content: FeedContent::Summary,
        }
    }
}
