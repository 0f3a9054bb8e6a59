//! Internal link checking
//!
//! Runs over the rendered output before anything is written. Every
//! `href`, `src` and `poster` attribute pointing inside the site must name a
//! generated page or a published asset.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

use crate::assets::{is_external, normalize_path, AssetIndex};
use crate::config::SiteConfig;
use crate::content::Content;
use crate::error::{BuildError, BuildErrors};
use crate::generator::Output;
use crate::helpers::{decode_path, full_url_for};

lazy_static! {
    /// An opening tag; text inside code spans has its `<` escaped and never matches
    static ref TAG: Regex =
        Regex::new(r#"<[A-Za-z][A-Za-z0-9-]*(?:\s(?:[^>"']|"[^"]*"|'[^']*')*)?>"#).unwrap();
    static ref LINK_ATTR: Regex =
        Regex::new(r#"\s(?:href|src|poster)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
    static ref SCHEME: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").unwrap();
}

/// Checks links in generated pages against everything the site publishes
pub struct LinkChecker {
    root: String,
    /// Absolute URL of the site root, e.g. `https://example.com/blog/`
    site_prefix: String,
    known: BTreeSet<String>,
}

impl LinkChecker {
    pub fn new(config: &SiteConfig, output: &Output, assets: &AssetIndex, content: &Content) -> Self {
        let mut known: BTreeSet<String> = output.paths().cloned().collect();
        known.extend(assets.iter().map(|(target, _)| target.clone()));

        // Missing assets are already reported by asset verification
        let referenced = content
            .posts
            .iter()
            .flat_map(|p| &p.assets)
            .chain(content.pages.iter().flat_map(|p| &p.assets))
            .chain(content.projects.iter().flat_map(|p| &p.assets));
        known.extend(referenced.map(|a| a.target.clone()));

        Self {
            root: config.normalized_root(),
            site_prefix: full_url_for(config, ""),
            known,
        }
    }

    /// Check every generated HTML page
    pub fn check(&self, output: &Output) -> BuildErrors {
        let mut errors = BuildErrors::new();
        let mut checked = 0;

        for (page, bytes) in output.html_pages() {
            let html = String::from_utf8_lossy(bytes);
            let mut reported = BTreeSet::new();
            let attrs = TAG
                .find_iter(&html)
                .flat_map(|tag| LINK_ATTR.captures_iter(tag.as_str()));
            for caps in attrs {
                let Some(target) = caps.get(1).or_else(|| caps.get(2)) else {
                    continue;
                };
                let target = target.as_str();
                checked += 1;
                if !self.resolves(page, target) && reported.insert(target.to_string()) {
                    errors.push(BuildError::BrokenLink {
                        page: page.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }

        tracing::debug!("Checked {} links, {} broken", checked, errors.len());
        errors
    }

    /// Whether a link found on `page` resolves; links leaving the site
    /// always do
    pub fn resolves(&self, page: &str, target: &str) -> bool {
        match self.local_path(page, target) {
            Some(path) => self.candidates(&path).iter().any(|c| self.known.contains(c)),
            None => true,
        }
    }

    /// Path relative to the public directory, or `None` when the target is
    /// not checked
    fn local_path(&self, page: &str, target: &str) -> Option<String> {
        let target = target.trim();
        if target.is_empty() || target.starts_with('#') {
            return None;
        }

        let target = match target.strip_prefix(self.site_prefix.as_str()) {
            Some(rest) => format!("{}{}", self.root, rest),
            None if is_external(target) || SCHEME.is_match(target) => return None,
            None => target.to_string(),
        };

        let target = target.split(['?', '#']).next().unwrap_or_default();
        let target = decode_path(target);

        let joined = if target.starts_with('/') {
            // Links outside the site root belong to someone else
            let rest = if self.root == "/" {
                target.trim_start_matches('/')
            } else if let Some(rest) = target.strip_prefix(self.root.as_str()) {
                rest
            } else if target == self.root.trim_end_matches('/') {
                ""
            } else {
                return None;
            };
            rest.to_string()
        } else {
            let dir = page.rfind('/').map_or("", |i| &page[..=i]);
            format!("{}{}", dir, target)
        };

        Some(normalize_path(&joined))
    }

    fn candidates(&self, path: &str) -> Vec<String> {
        if path.is_empty() {
            return vec!["index.html".to_string()];
        }
        if path.ends_with('/') {
            return vec![format!("{}index.html", path)];
        }
        vec![
            path.to_string(),
            format!("{}/index.html", path),
            format!("{}.html", path),
        ]
    }
}

/// Check internal links of a rendered site
pub fn check_links(
    config: &SiteConfig,
    output: &Output,
    assets: &AssetIndex,
    content: &Content,
) -> BuildErrors {
    LinkChecker::new(config, output, assets, content).check(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn site(root: &str) -> (SiteConfig, Output, AssetIndex) {
        let config = SiteConfig {
            url: format!("https://example.com{}", root.trim_end_matches('/')),
            root: root.to_string(),
            ..Default::default()
        };
        let mut output = Output::new();
        for (path, html) in [
            ("index.html", ""),
            ("2024/01/15/hello/index.html", ""),
            ("tags/swift/index.html", ""),
            ("notes.html", ""),
        ] {
            output.insert(path.to_string(), html, path).unwrap();
        }
        let mut assets = AssetIndex::new();
        assets.insert("images/café.png".to_string(), PathBuf::from("x"));
        assets.insert("2024/01/15/hello/cover.jpg".to_string(), PathBuf::from("y"));
        (config, output, assets)
    }

    #[test]
    fn test_resolves_pages_and_assets() {
        let (config, output, assets) = site("/");
        let checker = LinkChecker::new(&config, &output, &assets, &Content::default());
        let page = "2024/01/15/hello/index.html";

        assert!(checker.resolves(page, "/"));
        assert!(checker.resolves(page, "/tags/swift/"));
        assert!(checker.resolves(page, "/tags/swift"));
        assert!(checker.resolves(page, "/tags/swift/#top"));
        assert!(checker.resolves(page, "/notes"));
        assert!(checker.resolves(page, "cover.jpg"));
        assert!(checker.resolves(page, "../../../../images/caf%C3%A9.png?v=2"));
        assert!(checker.resolves(page, "https://example.com/tags/swift/"));
        assert!(checker.resolves(page, "https://other.example.org/missing"));
        assert!(checker.resolves(page, "mailto:me@example.com"));
        assert!(checker.resolves(page, "#section"));

        assert!(!checker.resolves(page, "/tags/rust/"));
        assert!(!checker.resolves(page, "missing.png"));
        assert!(!checker.resolves(page, "https://example.com/2023/"));
    }

    #[test]
    fn test_site_root_prefix() {
        let (config, output, assets) = site("/blog/");
        let checker = LinkChecker::new(&config, &output, &assets, &Content::default());

        assert!(checker.resolves("index.html", "/blog/"));
        assert!(checker.resolves("index.html", "/blog"));
        assert!(checker.resolves("index.html", "/blog/tags/swift/"));
        assert!(checker.resolves("index.html", "/elsewhere/"));
        assert!(!checker.resolves("index.html", "/blog/tags/rust/"));
    }

    #[test]
    fn test_check_reports_each_broken_target_once() {
        let (config, mut output, assets) = site("/");
        output
            .insert(
                "about/index.html".to_string(),
                r#"<a href="/nope/">x</a> <a href='/nope/'>y</a> <img src="/images/caf%C3%A9.png">"#,
                "about",
            )
            .unwrap();
        let errors = check_links(&config, &output, &assets, &Content::default());
        assert_eq!(errors.len(), 1);
        assert!(errors.to_string().contains("about/index.html: broken link to `/nope/`"));
    }

    #[test]
    fn test_only_tag_attributes_are_links() {
        let (config, mut output, assets) = site("/");
        output
            .insert(
                "html/index.html".to_string(),
                concat!(
                    r#"<p>Use <code>&lt;img src="photo.png"&gt;</code> to show a picture, "#,
                    r#"or write src="inline.png" in prose.</p>"#,
                    r#"<video controls src="/clip.mp4" poster="/poster.jpg"></video>"#,
                ),
                "html",
            )
            .unwrap();
        let errors = check_links(&config, &output, &assets, &Content::default());
        let targets: Vec<String> = errors
            .iter()
            .filter_map(|e| match e {
                BuildError::BrokenLink { target, .. } => Some(target.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec!["/clip.mp4", "/poster.jpg"]);
    }
}
