//! Theme loading
//!
//! A theme lives in `themes/<name>/`:
//! - `_config.yml` - free-form settings exposed to templates as `theme`
//! - `layout/**/*.html` - Tera templates overriding built-ins of the same name
//! - `source/**` - static assets, published by the asset index

use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::assets::to_url_path;
use crate::error::BuildError;

/// Theme configuration and template overrides
#[derive(Debug, Clone, Default)]
pub struct ThemeLoader {
    /// Theme directory path
    theme_dir: PathBuf,
    /// Theme configuration (IndexMap preserves YAML key order for menu items)
    config: IndexMap<String, serde_yaml::Value>,
    /// Template overrides as (name, source), sorted by name
    layouts: Vec<(String, String)>,
}

impl ThemeLoader {
    /// Load a theme from a directory
    pub fn load<P: AsRef<Path>>(theme_dir: P) -> Result<Self, BuildError> {
        let theme_dir = theme_dir.as_ref().to_path_buf();

        if !theme_dir.is_dir() {
            return Err(BuildError::Config(format!(
                "theme directory not found: {}",
                theme_dir.display()
            )));
        }

        let mut loader = Self {
            theme_dir: theme_dir.clone(),
            ..Default::default()
        };

        let config_path = theme_dir.join("_config.yml");
        if config_path.exists() {
            let content =
                fs::read_to_string(&config_path).map_err(|e| BuildError::io(&config_path, e))?;
            if !content.trim().is_empty() {
                loader.config = serde_yaml::from_str(&content).map_err(|e| {
                    BuildError::Config(format!("{}: {}", config_path.display(), e))
                })?;
            }
        }

        let layout_dir = theme_dir.join("layout");
        if layout_dir.is_dir() {
            for entry in WalkDir::new(&layout_dir).sort_by_file_name() {
                let entry = entry.map_err(|e| BuildError::Content {
                    path: layout_dir.clone(),
                    message: e.to_string(),
                })?;
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some("html")
                {
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&layout_dir) else {
                    continue;
                };
                let source = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
                loader.layouts.push((to_url_path(relative), source));
            }
        }

        tracing::debug!(
            "Loaded theme {:?} with {} layout overrides",
            loader.theme_dir,
            loader.layouts.len()
        );
        Ok(loader)
    }

    /// Get theme configuration
    pub fn config(&self) -> &IndexMap<String, serde_yaml::Value> {
        &self.config
    }

    /// Template overrides as (name, source)
    pub fn layouts(&self) -> &[(String, String)] {
        &self.layouts
    }

    /// The theme's `menu`, if it defines one
    pub fn menu(&self) -> Option<IndexMap<String, String>> {
        let serde_yaml::Value::Mapping(map) = self.config.get("menu")? else {
            return None;
        };
        Some(
            map.iter()
                .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_theme() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        fs::create_dir_all(dir.join("layout/partials")).unwrap();
        fs::write(
            dir.join("_config.yml"),
            "menu:\n  Blog: /\n  Now: /now/\naccent: teal\n",
        )
        .unwrap();
        fs::write(dir.join("layout/post.html"), "{{ post.title }}").unwrap();
        fs::write(dir.join("layout/partials/footer.html"), "footer").unwrap();
        fs::write(dir.join("layout/notes.txt"), "ignored").unwrap();

        let theme = ThemeLoader::load(dir).unwrap();
        let names: Vec<_> = theme.layouts().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["partials/footer.html", "post.html"]);

        let menu = theme.menu().unwrap();
        let order: Vec<_> = menu.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["Blog", "Now"]);
        assert_eq!(
            theme.config().get("accent").and_then(|v| v.as_str()),
            Some("teal")
        );
    }

    #[test]
    fn test_missing_theme_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(ThemeLoader::load(tmp.path().join("nope")).is_err());
    }
}
