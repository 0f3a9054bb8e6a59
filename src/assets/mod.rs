//! Static assets: indexing, reference resolution and verification
//!
//! Every file the site publishes besides rendered pages lives in an
//! [`AssetIndex`], keyed by its path relative to the public directory. Shortcode
//! references are resolved against the same keys, so a reference to an image
//! that will not be published is caught before anything is written.

use glob::Pattern;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::content::Content;
use crate::error::{BuildError, BuildErrors};
use crate::Site;

/// A local file referenced from content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    /// The reference as written in the content
    pub reference: String,
    /// Resolved path relative to the public directory
    pub target: String,
    /// What referenced it (a shortcode name or front-matter field)
    pub origin: String,
}

/// Whether a reference points outside the site
pub fn is_external(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("//")
        || lower.starts_with("data:")
        || lower.starts_with("mailto:")
}

/// Resolve a local reference to a path relative to the public directory.
///
/// Root-relative references (`/images/a.png`) resolve against the site
/// root. Relative references resolve against the page's own directory for
/// bundles, and against the site root otherwise.
pub fn resolve_reference(root: &str, page_path: &str, bundle: bool, reference: &str) -> String {
    let reference = reference.split(['?', '#']).next().unwrap_or_default();

    let joined = if let Some(absolute) = reference.strip_prefix('/') {
        let root = root.trim_matches('/');
        if root.is_empty() {
            absolute.to_string()
        } else {
            absolute
                .strip_prefix(root)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(absolute)
                .to_string()
        }
    } else if bundle {
        format!("{}/{}", page_path.trim_end_matches('/'), reference)
    } else {
        reference.to_string()
    };

    normalize_path(&joined)
}

/// Directory part of a route: the route itself when it ends in `/`,
/// otherwise everything up to the last `/`
pub fn route_dir(route: &str) -> &str {
    if route.is_empty() || route.ends_with('/') {
        route
    } else {
        route.rfind('/').map_or("", |i| &route[..=i])
    }
}

/// Collapse `.` and `..` segments and duplicate slashes
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    let mut normalized = parts.join("/");
    if path.ends_with('/') && !normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Whether a path component hides a file from publishing
fn is_hidden_component(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_')
}

/// Whether a file is rendered as Markdown rather than copied
pub fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"))
        .unwrap_or(false)
}

/// Compiled `skip_render` patterns
#[derive(Debug, Clone, Default)]
pub struct SkipRender(Vec<Pattern>);

impl SkipRender {
    pub fn new(patterns: &[String]) -> Result<Self, BuildError> {
        patterns
            .iter()
            .map(|p| {
                Pattern::new(p)
                    .map_err(|e| BuildError::Config(format!("skip_render {:?}: {}", p, e)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(SkipRender)
    }

    /// Whether a path relative to the source directory is copied verbatim
    pub fn matches(&self, relative: &str) -> bool {
        self.0.iter().any(|p| p.matches(relative))
    }
}

/// Walk a directory and yield publishable files with their relative paths
fn publishable_files(dir: &Path) -> Vec<(String, PathBuf)> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .map(is_hidden_component)
                    .unwrap_or(true)
        })
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e.path().strip_prefix(dir).ok()?;
            Some((to_url_path(relative), e.path().to_path_buf()))
        })
        .collect()
}

/// Convert a relative filesystem path into a `/`-separated path
pub fn to_url_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every static file the site publishes
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    files: BTreeMap<String, PathBuf>,
}

impl AssetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index theme assets, site assets (which win over the theme) and the
    /// files living next to bundled posts.
    pub fn scan(site: &Site, content: &Content) -> Result<Self, BuildError> {
        let skip_render = SkipRender::new(&site.config.skip_render)?;
        let mut index = Self::new();

        let theme_source = site.theme_dir.join("source");
        if site.has_theme() && theme_source.is_dir() {
            for (relative, path) in publishable_files(&theme_source) {
                index.insert(relative, path);
            }
        }

        if site.source_dir.is_dir() {
            for (relative, path) in publishable_files(&site.source_dir) {
                if !is_markdown_file(&path) || skip_render.matches(&relative) {
                    index.insert(relative, path);
                }
            }
        }

        for post in &content.posts {
            if let Some(bundle) = &post.bundle_dir {
                index.add_bundle(bundle, route_dir(&post.path));
            }
        }

        tracing::debug!("Indexed {} assets", index.len());
        Ok(index)
    }

    pub fn insert(&mut self, target: String, source: PathBuf) {
        self.files.insert(target, source);
    }

    /// Publish the non-Markdown files of a bundle under `route`
    pub fn add_bundle(&mut self, bundle_dir: &Path, route: &str) {
        for (relative, path) in publishable_files(bundle_dir) {
            if is_markdown_file(&path) {
                continue;
            }
            let target = normalize_path(&format!("{}/{}", route.trim_end_matches('/'), relative));
            self.insert(target, path);
        }
    }

    pub fn contains(&self, target: &str) -> bool {
        self.files.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PathBuf)> {
        self.files.iter()
    }

    /// Check every asset reference made by posts, pages and projects
    pub fn verify(&self, content: &Content) -> BuildErrors {
        let mut errors = BuildErrors::new();

        let referrers = content
            .posts
            .iter()
            .map(|p| (&p.full_source, &p.assets))
            .chain(content.pages.iter().map(|p| (&p.full_source, &p.assets)))
            .chain(content.projects.iter().map(|p| (&p.source, &p.assets)));

        for (source, assets) in referrers {
            for asset in assets {
                if !self.contains(&asset.target) {
                    errors.push(BuildError::MissingAsset {
                        path: source.clone(),
                        reference: asset.reference.clone(),
                        expected: format!("{} (from {})", asset.target, asset.origin),
                    });
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_external() {
        assert!(is_external("https://example.com/a.png"));
        assert!(is_external("//cdn.example.com/a.png"));
        assert!(is_external("data:image/png;base64,AAAA"));
        assert!(!is_external("/images/a.png"));
        assert!(!is_external("cover.jpg"));
    }

    #[test]
    fn test_resolve_root_relative() {
        assert_eq!(
            resolve_reference("/", "2024/01/01/post/", false, "/images/a.png"),
            "images/a.png"
        );
        assert_eq!(
            resolve_reference("/blog/", "2024/01/01/post/", true, "/blog/images/a.png"),
            "images/a.png"
        );
    }

    #[test]
    fn test_resolve_relative_to_bundle() {
        assert_eq!(
            resolve_reference("/", "2024/01/01/post/", true, "cover.jpg"),
            "2024/01/01/post/cover.jpg"
        );
        assert_eq!(
            resolve_reference("/", "2024/01/01/post/", true, "../shared/x.png?v=2"),
            "2024/01/01/shared/x.png"
        );
        assert_eq!(
            resolve_reference("/", "2024/01/01/post/", false, "images/x.png"),
            "images/x.png"
        );
    }

    #[test]
    fn test_route_dir() {
        assert_eq!(route_dir("2024/01/01/post/"), "2024/01/01/post/");
        assert_eq!(route_dir("notes/post.html"), "notes/");
        assert_eq!(route_dir("post.html"), "");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a//b/./c/../d"), "a/b/d");
        assert_eq!(normalize_path("a/b/"), "a/b/");
        assert_eq!(normalize_path("../a"), "a");
    }

    #[test]
    fn test_publishable_files_skip_hidden_and_underscore() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("images")).unwrap();
        fs::create_dir_all(root.join("_posts")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("images/a.png"), b"png").unwrap();
        fs::write(root.join("_posts/b.png"), b"png").unwrap();
        fs::write(root.join(".git/config"), b"x").unwrap();
        fs::write(root.join(".DS_Store"), b"x").unwrap();

        let files: Vec<_> = publishable_files(root).into_iter().map(|(r, _)| r).collect();
        assert_eq!(files, vec!["images/a.png"]);
    }

    #[test]
    fn test_skip_render_patterns() {
        let skip = SkipRender::new(&["raw/**".to_string(), "*.txt".to_string()]).unwrap();
        assert!(skip.matches("raw/notes.md"));
        assert!(skip.matches("robots.txt"));
        assert!(!skip.matches("about/index.md"));
        assert!(SkipRender::new(&["[".to_string()]).is_err());
    }

    #[test]
    fn test_add_bundle_publishes_under_route() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("index.md"), "# post").unwrap();
        fs::write(tmp.path().join("cover.jpg"), b"jpg").unwrap();

        let mut index = AssetIndex::new();
        index.add_bundle(tmp.path(), "2024/05/01/bundle/");
        assert!(index.contains("2024/05/01/bundle/cover.jpg"));
        assert_eq!(index.len(), 1);
    }
}
