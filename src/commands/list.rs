//! List site content

use anyhow::Result;
use std::collections::BTreeMap;

use crate::content::{term_slug, ContentLoader, Post};
use crate::Site;

/// Term names with their post counts, most used first. Spellings that
/// share a slug are counted together under the first one seen.
fn term_counts<'p>(posts: &'p [Post], names: impl Fn(&'p Post) -> &'p [String]) -> Vec<(&'p str, usize)> {
    let mut counts: BTreeMap<String, (&str, usize)> = BTreeMap::new();
    for post in posts {
        for name in names(post) {
            let entry = counts.entry(term_slug(name)).or_insert((name.as_str(), 0));
            entry.1 += 1;
        }
    }
    let mut counts: Vec<(&str, usize)> = counts.into_values().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    counts
}

/// List site content by type
pub fn run(site: &Site, content_type: &str) -> Result<()> {
    match content_type {
        "post" | "posts" => {
            let posts = ContentLoader::new(site)?.load_posts()?;
            println!("Posts ({}):", posts.len());
            for post in posts {
                println!(
                    "  {}  {}{}  [{}]",
                    post.date.format("%Y-%m-%d"),
                    post.title,
                    if post.draft { " (draft)" } else { "" },
                    post.source
                );
            }
        }
        "page" | "pages" => {
            let pages = ContentLoader::new(site)?.load_pages()?;
            println!("Pages ({}):", pages.len());
            for page in pages {
                println!("  {}  /{}  [{}]", page.title, page.path, page.source);
            }
        }
        "tag" | "tags" => {
            let posts = ContentLoader::new(site)?.load_posts()?;
            let tags = term_counts(&posts, |p| &p.tags);
            println!("Tags ({}):", tags.len());
            for (tag, count) in tags {
                println!("  {} ({})", tag, count);
            }
        }
        "category" | "categories" => {
            let posts = ContentLoader::new(site)?.load_posts()?;
            let categories = term_counts(&posts, |p| &p.categories);
            println!("Categories ({}):", categories.len());
            for (category, count) in categories {
                println!("  {} ({})", category, count);
            }
        }
        "project" | "projects" => {
            let projects = ContentLoader::new(site)?.load()?.projects;
            println!("Projects ({}):", projects.len());
            for project in projects {
                println!("  {}  {}", project.title, project.link);
            }
        }
        "route" | "routes" => {
            let build = site.build()?;
            let assets = build
                .assets
                .iter()
                .filter(|(target, _)| !build.output.contains(target));
            let mut routes: Vec<&str> = build
                .output
                .paths()
                .map(String::as_str)
                .chain(assets.map(|(target, _)| target.as_str()))
                .collect();
            routes.sort_unstable();
            println!("Routes ({}):", routes.len());
            for route in routes {
                println!("  {}", route);
            }
        }
        _ => {
            anyhow::bail!(
                "Unknown type: {}. Available: post, page, tag, category, project, route",
                content_type
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_term_counts_merge_spellings() {
        let tmp = TempDir::new().unwrap();
        let site = Site::new(tmp.path()).unwrap();
        let posts_dir = site.source_dir.join("_posts");
        fs::create_dir_all(&posts_dir).unwrap();
        fs::write(posts_dir.join("a.md"), "---\ntitle: A\ndate: 2024-01-01\ntags: [SwiftUI, math]\n---\n").unwrap();
        fs::write(posts_dir.join("b.md"), "---\ntitle: B\ndate: 2024-01-02\ntags: [swiftui]\n---\n").unwrap();

        let posts = ContentLoader::new(&site).unwrap().load_posts().unwrap();
        let counts = term_counts(&posts, |p| &p.tags);
        // Post b is newer, so its spelling comes first
        assert_eq!(counts, vec![("swiftui", 2), ("math", 1)]);
    }

    #[test]
    fn test_unknown_type() {
        let tmp = TempDir::new().unwrap();
        let site = Site::new(tmp.path()).unwrap();
        assert!(run(&site, "widgets").is_err());
    }
}
