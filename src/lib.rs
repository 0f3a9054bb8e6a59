//! blogsmith: a static site generator for long-form Markdown blogs
//!
//! Posts and pages are Markdown files with front-matter. Shortcodes embed
//! images, galleries, videos and link previews; the generator renders every
//! page through Tera templates into an in-memory output set, checks each
//! internal link against it, and only then writes the public directory.

pub mod assets;
pub mod cache;
pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod generator;
pub mod helpers;
pub mod links;
pub mod server;
pub mod templates;
pub mod theme;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use error::{BuildError, BuildErrors};
pub use generator::Build;

/// A site on disk and the options of the current run
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Source directory
    pub source_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
    /// Theme directory
    pub theme_dir: PathBuf,
    /// Drafts requested on the command line
    drafts: bool,
}

impl Site {
    /// Open the site in `base_dir`. A missing `_config.yml` means defaults.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        Ok(Self::with_config(base_dir, config))
    }

    /// A site with an already loaded configuration
    pub fn with_config(base_dir: PathBuf, config: config::SiteConfig) -> Self {
        let source_dir = base_dir.join(&config.source_dir);
        let public_dir = base_dir.join(&config.public_dir);
        let theme_dir = base_dir.join("themes").join(&config.theme);

        Self {
            config,
            base_dir,
            source_dir,
            public_dir,
            theme_dir,
            drafts: false,
        }
    }

    /// Re-read `_config.yml`, keeping the options of this run
    pub fn reload(&self) -> Result<Self> {
        Ok(Self::new(&self.base_dir)?.with_drafts(self.drafts))
    }

    /// Include drafts regardless of `render_drafts`
    pub fn with_drafts(mut self, drafts: bool) -> Self {
        self.drafts = drafts;
        self
    }

    /// Whether drafts are published in this run
    pub fn include_drafts(&self) -> bool {
        self.drafts || self.config.render_drafts
    }

    /// Whether a theme is configured and present
    pub fn has_theme(&self) -> bool {
        !self.config.theme.trim().is_empty() && self.theme_dir.is_dir()
    }

    /// Render the whole site in memory without writing anything
    pub fn build(&self) -> std::result::Result<Build, BuildErrors> {
        generator::build(self)
    }

    /// Clean the public directory and cache
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
