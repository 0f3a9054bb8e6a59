//! Content loader - loads posts, pages and projects from the source directory

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use super::frontmatter::parse_date_string;
use super::projects::load_projects;
use super::shortcode::{ShortcodeContext, ShortcodeRegistry};
use super::{FrontMatter, MarkdownRenderer, Page, Post, Project};
use crate::assets::{is_markdown_file, normalize_path, route_dir, to_url_path, SkipRender};
use crate::error::{BuildError, BuildErrors};
use crate::helpers::{full_url_for, host_of, mark_external_links, url_for_root};
use crate::Site;

const POSTS_DIR: &str = "_posts";
const DRAFTS_DIR: &str = "_drafts";
const DEFAULT_CATEGORY: &str = "uncategorized";

/// Everything a build publishes besides static assets
#[derive(Debug, Clone, Default)]
pub struct Content {
    /// Newest first; ties ordered by source path
    pub posts: Vec<Post>,
    /// Ordered by route
    pub pages: Vec<Page>,
    pub projects: Vec<Project>,
    /// Earliest date of a post held back by `future: false`
    pub next_scheduled: Option<DateTime<FixedOffset>>,
}

/// Outcome of loading one post file
enum Loaded {
    Post(Box<Post>),
    Skipped,
    Scheduled(DateTime<FixedOffset>),
}

/// Loads content from the source directory
pub struct ContentLoader<'a> {
    site: &'a Site,
    renderer: MarkdownRenderer,
    shortcodes: ShortcodeRegistry,
    skip_render: SkipRender,
    tz: Tz,
    root: String,
    host: String,
}

impl<'a> ContentLoader<'a> {
    /// Create a new content loader
    pub fn new(site: &'a Site) -> Result<Self, BuildError> {
        Ok(Self {
            site,
            renderer: MarkdownRenderer::from_config(&site.config.highlight),
            shortcodes: ShortcodeRegistry::builtin(),
            skip_render: SkipRender::new(&site.config.skip_render)?,
            tz: site.config.timezone()?,
            root: site.config.normalized_root(),
            host: host_of(&site.config.url).to_string(),
        })
    }

    /// Load posts, pages and projects, collecting every failure
    pub fn load(&self) -> Result<Content, BuildErrors> {
        let mut errors = BuildErrors::new();

        let (posts, next_scheduled) = self.collect_posts().unwrap_or_else(|e| {
            errors.extend(e);
            (Vec::new(), None)
        });
        let pages = self.load_pages().unwrap_or_else(|e| {
            errors.extend(e);
            Vec::new()
        });
        let projects = load_projects(&self.site.source_dir, &self.root).unwrap_or_else(|e| {
            errors.extend(e);
            Vec::new()
        });

        tracing::info!(
            "Loaded {} posts, {} pages and {} projects",
            posts.len(),
            pages.len(),
            projects.len()
        );

        errors.into_result(Content {
            posts,
            pages,
            projects,
            next_scheduled,
        })
    }

    /// Load all published posts from `_posts` (and `_drafts` when drafts
    /// are included), newest first
    pub fn load_posts(&self) -> Result<Vec<Post>, BuildErrors> {
        self.collect_posts().map(|(posts, _)| posts)
    }

    /// Published posts and the earliest date a held back post goes live
    fn collect_posts(&self) -> Result<(Vec<Post>, Option<DateTime<FixedOffset>>), BuildErrors> {
        let mut dirs = vec![(self.site.source_dir.join(POSTS_DIR), false)];
        if self.site.include_drafts() {
            dirs.push((self.site.source_dir.join(DRAFTS_DIR), true));
        }

        let mut posts = Vec::new();
        let mut next_scheduled: Option<DateTime<FixedOffset>> = None;
        let mut errors = BuildErrors::new();

        for (dir, in_drafts) in dirs {
            for path in markdown_files(&dir, &mut errors) {
                match self.load_post(&path, &dir, in_drafts) {
                    Ok(Loaded::Post(post)) => posts.push(*post),
                    Ok(Loaded::Skipped) => {}
                    Ok(Loaded::Scheduled(date)) => {
                        next_scheduled = Some(next_scheduled.map_or(date, |d| d.min(date)));
                    }
                    Err(e) => errors.push(e),
                }
            }
        }

        posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.source.cmp(&b.source)));
        errors.into_result((posts, next_scheduled))
    }

    fn load_post(&self, path: &Path, dir: &Path, in_drafts: bool) -> Result<Loaded, BuildError> {
        let raw = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        let (fm, body) = FrontMatter::parse(&raw).map_err(|e| BuildError::FrontMatter {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let draft = in_drafts || fm.is_draft();
        if draft && !self.site.include_drafts() {
            tracing::debug!("Skipping draft {:?}", path);
            return Ok(Loaded::Skipped);
        }

        let stem = file_stem(path);
        let bundle_dir = if is_index_file(path) && path.parent() != Some(dir) {
            path.parent().map(Path::to_path_buf)
        } else {
            None
        };
        let file_slug = match &bundle_dir {
            Some(bundle) => bundle
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(stem),
            None => stem,
        };

        let date = match fm.date.as_deref() {
            Some(value) => self.parse_date(path, value)?,
            None => date_from_file_name(&file_slug, self.tz)
                .map(Ok)
                .unwrap_or_else(|| self.modified_date(path))?,
        };
        if !self.site.config.future && date > Utc::now() {
            tracing::debug!("Skipping future post {:?}", path);
            return Ok(Loaded::Scheduled(date));
        }
        let updated = match fm.updated.as_deref() {
            Some(value) => self.parse_date(path, value)?,
            None => date,
        };

        let slug = fm
            .slug
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(file_slug);
        let title = fm.title.clone().unwrap_or_else(|| slug.clone());

        let route = match fm.permalink.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(permalink) => normalize_route(&self.root, permalink),
            None => normalize_route(
                &self.root,
                &expand_permalink(
                    &self.site.config.permalink,
                    &date,
                    &slug,
                    fm.categories.first().map(String::as_str),
                ),
            ),
        };

        let mut refs = ShortcodeContext::new(&self.root, route_dir(&route), bundle_dir.is_some());
        let expanded = self
            .shortcodes
            .expand(body, &mut refs)
            .map_err(|e| BuildError::Shortcode {
                path: path.to_path_buf(),
                name: e.name,
                message: e.message,
            })?;
        let image = fm
            .image
            .as_deref()
            .filter(|i| !i.trim().is_empty())
            .map(|i| refs.asset(i, "image"));

        let rendered = self.renderer.render(&expanded);
        let excerpt = MarkdownRenderer::split_excerpt(&expanded)
            .map(|(excerpt, _)| self.finish_html(self.renderer.render(excerpt).html));

        let assets = refs.into_assets();
        let authors = match fm.author_list() {
            authors if authors.is_empty() => vec![self.site.config.author.clone()],
            authors => authors,
        };

        Ok(Loaded::Post(Box::new(Post {
            title,
            slug,
            date,
            updated,
            draft,
            tags: fm.tags,
            categories: fm.categories,
            authors,
            summary: fm.summary,
            image,
            raw: body.to_string(),
            content: self.finish_html(rendered.html),
            excerpt,
            headings: rendered.headings,
            toc: fm.toc.unwrap_or(true),
            layout: fm.layout.unwrap_or_else(|| "post".to_string()),
            source: self.relative_source(path),
            full_source: path.to_path_buf(),
            bundle_dir,
            url: url_for_root(&self.root, &route),
            permalink: full_url_for(&self.site.config, &route),
            path: route,
            assets,
            extra: fm.extra,
        })))
    }

    /// Load all standalone pages: Markdown outside `_`-prefixed directories
    pub fn load_pages(&self) -> Result<Vec<Page>, BuildErrors> {
        let mut pages = Vec::new();
        let mut errors = BuildErrors::new();

        for path in markdown_files(&self.site.source_dir, &mut errors) {
            let relative = self.relative_source(&path);
            if relative.split('/').any(|c| c.starts_with('_')) || self.skip_render.matches(&relative) {
                continue;
            }
            match self.load_page(&path, &relative) {
                Ok(Some(page)) => pages.push(page),
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }

        pages.sort_by(|a, b| a.path.cmp(&b.path));
        errors.into_result(pages)
    }

    /// Load a single page from a file
    fn load_page(&self, path: &Path, relative: &str) -> Result<Option<Page>, BuildError> {
        let raw = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        let (fm, body) = FrontMatter::parse(&raw).map_err(|e| BuildError::FrontMatter {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if fm.is_draft() && !self.site.include_drafts() {
            tracing::debug!("Skipping draft page {:?}", path);
            return Ok(None);
        }

        let date = fm
            .date
            .as_deref()
            .map(|d| self.parse_date(path, d))
            .transpose()?;
        let updated = fm
            .updated
            .as_deref()
            .map(|d| self.parse_date(path, d))
            .transpose()?;

        let route = match fm.permalink.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(permalink) => normalize_route(&self.root, permalink),
            None => page_route(relative),
        };

        let title = fm.title.clone().unwrap_or_else(|| {
            let name = route.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
            if name.is_empty() {
                self.site.config.title.clone()
            } else {
                name.to_string()
            }
        });

        let mut refs = ShortcodeContext::new(&self.root, route_dir(&route), is_index_file(path));
        let expanded = self
            .shortcodes
            .expand(body, &mut refs)
            .map_err(|e| BuildError::Shortcode {
                path: path.to_path_buf(),
                name: e.name,
                message: e.message,
            })?;
        let assets = refs.into_assets();
        let rendered = self.renderer.render(&expanded);

        Ok(Some(Page {
            title,
            date,
            updated,
            layout: fm.layout.unwrap_or_else(|| "page".to_string()),
            raw: body.to_string(),
            content: self.finish_html(rendered.html),
            headings: rendered.headings,
            toc: fm.toc.unwrap_or(false),
            source: relative.to_string(),
            full_source: path.to_path_buf(),
            url: url_for_root(&self.root, &route),
            permalink: full_url_for(&self.site.config, &route),
            path: route,
            assets,
            extra: fm.extra,
        }))
    }

    fn parse_date(&self, path: &Path, value: &str) -> Result<DateTime<FixedOffset>, BuildError> {
        parse_date_string(value, self.tz).ok_or_else(|| BuildError::InvalidDate {
            path: path.to_path_buf(),
            value: value.to_string(),
        })
    }

    /// File modification time, for posts without any date
    fn modified_date(&self, path: &Path) -> Result<DateTime<FixedOffset>, BuildError> {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| BuildError::io(path, e))?;
        Ok(DateTime::<Utc>::from(modified)
            .with_timezone(&self.tz)
            .fixed_offset())
    }

    fn finish_html(&self, html: String) -> String {
        mark_external_links(&html, &self.site.config.external_link, &self.host)
    }

    /// Source path relative to the source directory, `/`-separated
    fn relative_source(&self, path: &Path) -> String {
        to_url_path(path.strip_prefix(&self.site.source_dir).unwrap_or(path))
    }
}

/// Markdown files under `dir` in sorted order, skipping hidden entries
fn markdown_files(dir: &Path, errors: &mut BuildErrors) -> Vec<std::path::PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
    {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_markdown_file(entry.path()) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                errors.push(BuildError::Content {
                    path,
                    message: e.to_string(),
                });
            }
        }
    }
    files
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string())
}

fn is_index_file(path: &Path) -> bool {
    path.file_stem().is_some_and(|s| s == "index") && is_markdown_file(path)
}

/// `2024-01-15-hello` carries its own date
fn date_from_file_name(name: &str, tz: Tz) -> Option<DateTime<FixedOffset>> {
    let prefix = name.get(..10)?;
    let date = NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()?;
    tz.from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()
        .map(|d| d.fixed_offset())
}

/// Expand a permalink pattern such as `:year/:month/:day/:title/`
pub fn expand_permalink(
    pattern: &str,
    date: &DateTime<FixedOffset>,
    slug: &str,
    category: Option<&str>,
) -> String {
    let category = category
        .map(super::post::term_slug)
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    // Title tokens go last so a slug is never read as a token
    pattern
        .replace(":year", &date.format("%Y").to_string())
        .replace(":month", &date.format("%m").to_string())
        .replace(":day", &date.format("%d").to_string())
        .replace(":i_month", &date.format("%-m").to_string())
        .replace(":i_day", &date.format("%-d").to_string())
        .replace(":hour", &date.format("%H").to_string())
        .replace(":minute", &date.format("%M").to_string())
        .replace(":second", &date.format("%S").to_string())
        .replace(":category", &category)
        .replace(":title", slug)
        .replace(":slug", slug)
        .replace(":name", slug)
}

/// A route relative to the site root: no leading slash, a trailing slash
/// unless the last segment names a file
fn normalize_route(root: &str, permalink: &str) -> String {
    let permalink = permalink.trim();
    let trimmed = root.trim_matches('/');
    let relative = match permalink.strip_prefix('/') {
        Some(rest) if !trimmed.is_empty() => rest
            .strip_prefix(trimmed)
            .and_then(|r| r.strip_prefix('/'))
            .unwrap_or(rest),
        Some(rest) => rest,
        None => permalink,
    };

    let mut route = normalize_path(relative);
    let last = route.rsplit('/').next().unwrap_or_default();
    if !route.is_empty() && !route.ends_with('/') && !last.contains('.') {
        route.push('/');
    }
    route
}

/// Route of a standalone page: `about/index.md` and `about.md` both map to
/// `about/`, the top-level `index.md` to the site root
fn page_route(relative: &str) -> String {
    let without_ext = relative
        .strip_suffix(".md")
        .or_else(|| relative.strip_suffix(".markdown"))
        .unwrap_or(relative);

    if without_ext == "index" {
        String::new()
    } else if let Some(dir) = without_ext.strip_suffix("/index") {
        format!("{}/", dir)
    } else {
        format!("{}/", without_ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-07T09:05:03+08:00").unwrap()
    }

    #[test]
    fn test_expand_permalink() {
        assert_eq!(
            expand_permalink(":year/:month/:day/:title/", &date(), "hello", None),
            "2024/03/07/hello/"
        );
        assert_eq!(
            expand_permalink(":category/:i_month/:i_day/:name.html", &date(), "x", Some("iOS Dev")),
            "ios-dev/3/7/x.html"
        );
        assert_eq!(
            expand_permalink("posts/:category/:slug/", &date(), "y", None),
            "posts/uncategorized/y/"
        );
    }

    #[test]
    fn test_normalize_route() {
        assert_eq!(normalize_route("/", "/about"), "about/");
        assert_eq!(normalize_route("/blog/", "/blog/notes/x.html"), "notes/x.html");
        assert_eq!(normalize_route("/", "2024//01/a/"), "2024/01/a/");
    }

    #[test]
    fn test_page_route() {
        assert_eq!(page_route("about/index.md"), "about/");
        assert_eq!(page_route("index.md"), "");
        assert_eq!(page_route("projects.md"), "projects/");
        assert_eq!(page_route("docs/guide.markdown"), "docs/guide/");
    }

    #[test]
    fn test_date_from_file_name() {
        let tz: Tz = "Asia/Shanghai".parse().unwrap();
        let date = date_from_file_name("2024-01-15-hello", tz).unwrap();
        assert_eq!(date.to_rfc3339(), "2024-01-15T00:00:00+08:00");
        assert!(date_from_file_name("hello", tz).is_none());
    }
}
