//! Generator: renders loaded content through the templates into an
//! in-memory [`Output`], which is link-checked before anything is written.

mod feed;
mod output;

pub use feed::{atom, rss, search_index, sitemap, SitemapEntry};
pub use output::{route_file, write, Output, OutputFile, WriteStats};

use chrono::Datelike;
use std::collections::BTreeMap;
use tera::Context;

use crate::assets::{is_external, AssetIndex};
use crate::content::{Content, ContentLoader, Page, Post, Term};
use crate::error::{BuildError, BuildErrors};
use crate::helpers::{date_xml, format_date, full_url_for, page_window, toc, url_for_root};
use crate::links::check_links;
use crate::templates::{
    ArchiveYearData, ConfigData, MenuItem, NavPost, PageData, PageLink, PaginationData, PostData,
    SiteStats, TemplateRenderer, TermData, TermLink, BUILTIN_CSS, BUILTIN_CSS_PATH,
};
use crate::theme::ThemeLoader;
use crate::Site;

/// Heading depth shown in a table of contents
const TOC_DEPTH: u8 = 3;
/// Page links on each side of the current index page
const PAGER_MID_SIZE: usize = 2;
const RECENT_POSTS: usize = 5;

/// A rendered site, not yet written
#[derive(Debug)]
pub struct Build {
    pub content: Content,
    pub assets: AssetIndex,
    pub output: Output,
}

/// Load, render and check the whole site in memory
pub fn build(site: &Site) -> Result<Build, BuildErrors> {
    let loader = ContentLoader::new(site)?;
    let content = loader.load()?;

    let assets = AssetIndex::scan(site, &content)?;
    let mut errors = assets.verify(&content);

    let generator = Generator::new(site)?;
    let output = match generator.render(&content, &assets) {
        Ok(output) => output,
        Err(e) => {
            errors.extend(e);
            return Err(errors);
        }
    };

    if site.config.check_links {
        errors.extend(check_links(&site.config, &output, &assets, &content));
    }

    tracing::info!(
        "Rendered {} files and indexed {} assets",
        output.len(),
        assets.len()
    );
    errors.into_result(Build {
        content,
        assets,
        output,
    })
}

/// Collects rendered files and the errors met on the way
#[derive(Default)]
struct Pass {
    output: Output,
    errors: BuildErrors,
}

impl Pass {
    fn emit(&mut self, route: &str, html: Result<String, BuildError>, producer: &str) {
        match html.and_then(|html| self.output.insert_route(route, html, producer)) {
            Ok(()) => tracing::debug!("Rendered {}", route_file(route)),
            Err(e) => self.errors.push(e),
        }
    }

    fn emit_file(&mut self, path: &str, bytes: impl Into<Vec<u8>>, producer: &str) {
        if let Err(e) = self.output.insert(path.to_string(), bytes, producer) {
            self.errors.push(e);
        }
    }
}

/// A tag or category with the posts carrying it
struct TermPosts<'c> {
    term: Term,
    posts: Vec<&'c Post>,
}

/// Renders content with the built-in templates and the theme's overrides
pub struct Generator<'a> {
    site: &'a Site,
    renderer: TemplateRenderer,
    theme: Option<ThemeLoader>,
    root: String,
}

impl<'a> Generator<'a> {
    pub fn new(site: &'a Site) -> Result<Self, BuildError> {
        let theme = if site.has_theme() {
            Some(ThemeLoader::load(&site.theme_dir)?)
        } else {
            if !site.config.theme.trim().is_empty() {
                tracing::warn!(
                    "Theme {:?} not found at {:?}, using built-in templates",
                    site.config.theme,
                    site.theme_dir
                );
            }
            None
        };
        let root = site.config.normalized_root();
        let renderer = TemplateRenderer::new(&root, theme.as_ref())?;

        Ok(Self {
            site,
            renderer,
            theme,
            root,
        })
    }

    /// Render every page, feed and index of the site
    pub fn render(&self, content: &Content, assets: &AssetIndex) -> Result<Output, BuildErrors> {
        let mut pass = Pass::default();
        let config = &self.site.config;

        let tags = self.collect_terms(&content.posts, |p| &p.tags, &config.tag_dir);
        let categories =
            self.collect_terms(&content.posts, |p| &p.categories, &config.category_dir);
        let base = self.base_context(content, &tags, &categories);

        self.render_index(&mut pass, &base, &content.posts);
        self.render_posts(&mut pass, &base, &content.posts);
        self.render_pages(&mut pass, &base, content, &tags);

        let page_routes: Vec<&str> = content.pages.iter().map(|p| p.path.as_str()).collect();
        let claimed = |route: &str| page_routes.contains(&route);

        let archive_route = dir_route(&config.archive_dir);
        if !claimed(&archive_route) {
            let mut context = self.page_context(&base, "Archives", &archive_route);
            context.insert("archive_years", &self.archive_years(&content.posts));
            pass.emit(
                &archive_route,
                self.renderer.render("archive.html", &context),
                "archive",
            );
        }

        self.render_terms(&mut pass, &base, &tags, "Tags", &config.tag_dir, &claimed);
        self.render_terms(
            &mut pass,
            &base,
            &categories,
            "Categories",
            &config.category_dir,
            &claimed,
        );

        let project_route = dir_route(&config.project_dir);
        if !content.projects.is_empty() && !claimed(&project_route) {
            let mut context = self.page_context(&base, "Projects", &project_route);
            context.insert("projects", &content.projects);
            pass.emit(
                &project_route,
                self.renderer.render("projects.html", &context),
                "projects",
            );
        }

        self.render_feeds(&mut pass, &content.posts);

        if !assets.contains(BUILTIN_CSS_PATH) {
            pass.emit_file(BUILTIN_CSS_PATH, BUILTIN_CSS, "built-in stylesheet");
        }

        for (target, source) in assets.iter() {
            if let Some(producer) = pass.output.producer(target) {
                pass.errors.push(BuildError::DuplicateRoute {
                    route: target.clone(),
                    first: producer.to_string(),
                    second: source.display().to_string(),
                });
            }
        }

        let sitemap_xml = self.sitemap(&pass.output, content);
        pass.emit_file("sitemap.xml", sitemap_xml, "sitemap");

        pass.errors.into_result(pass.output)
    }

    /// Variables shared by every template
    fn base_context(
        &self,
        content: &Content,
        tags: &BTreeMap<String, TermPosts>,
        categories: &BTreeMap<String, TermPosts>,
    ) -> Context {
        let config = &self.site.config;
        let feed_url = |path: &str| {
            if path.trim().is_empty() {
                None
            } else {
                Some(url_for_root(&self.root, path))
            }
        };

        let config_data = ConfigData {
            title: config.title.clone(),
            subtitle: config.subtitle.clone(),
            description: config.description.clone(),
            keywords: config
                .keywords
                .as_ref()
                .map(|k| k.join(", "))
                .unwrap_or_default(),
            author: config.author.clone(),
            language: config.language.clone(),
            url: config.url.clone(),
            root: self.root.clone(),
            css_url: url_for_root(&self.root, BUILTIN_CSS_PATH),
            atom_url: feed_url(&config.feed.atom),
            rss_url: feed_url(&config.feed.rss),
            search_url: url_for_root(&self.root, "search.json"),
        };

        let menu = self
            .theme
            .as_ref()
            .and_then(ThemeLoader::menu)
            .unwrap_or_else(|| config.menu.clone());
        let menu: Vec<MenuItem> = menu
            .into_iter()
            .map(|(name, path)| {
                let url = if is_external(&path) {
                    path
                } else {
                    url_for_root(&self.root, &path)
                };
                MenuItem { name, url }
            })
            .collect();

        let stats = SiteStats {
            post_count: content.posts.len(),
            tag_count: tags.len(),
            category_count: categories.len(),
            word_count: content.posts.iter().map(Post::word_count).sum(),
            recent_posts: content
                .posts
                .iter()
                .take(RECENT_POSTS)
                .map(nav_post)
                .collect(),
        };

        let theme_config = self
            .theme
            .as_ref()
            .map(|t| t.config().clone())
            .unwrap_or_default();

        let mut context = Context::new();
        context.insert("config", &config_data);
        context.insert("menu", &menu);
        context.insert("site", &stats);
        context.insert("theme", &theme_config);
        context.insert("page_title", "");
        context.insert("canonical_url", &full_url_for(config, ""));
        context.insert("current_url", &self.root);
        context.insert("toc", "");
        context.insert("page", &None::<PageData>);
        context.insert("prev_post", &None::<NavPost>);
        context.insert("next_post", &None::<NavPost>);
        context
    }

    /// Base context for a generated page at `route`
    fn page_context(&self, base: &Context, title: &str, route: &str) -> Context {
        let mut context = base.clone();
        context.insert("page_title", title);
        context.insert("canonical_url", &full_url_for(&self.site.config, route));
        context.insert("current_url", &url_for_root(&self.root, route));
        context
    }

    fn post_data(&self, post: &Post, full: bool) -> PostData {
        let config = &self.site.config;
        let links = |names: &[String], dir: &str| -> Vec<TermLink> {
            names
                .iter()
                .map(|name| TermLink {
                    name: name.clone(),
                    url: Term::new(name, &self.root, dir).url,
                })
                .collect()
        };

        PostData {
            title: post.title.clone(),
            date: format_date(&post.date, &config.date_format),
            datetime: date_xml(&post.date),
            updated: date_xml(&post.updated),
            year: post.date.year(),
            url: post.url.clone(),
            permalink: post.permalink.clone(),
            tags: links(&post.tags, &config.tag_dir),
            categories: links(&post.categories, &config.category_dir),
            authors: post.authors.clone(),
            description: post.description(),
            image: post.image.clone(),
            teaser: post.teaser().to_string(),
            has_more: post.excerpt.is_some(),
            content: if full { post.content.clone() } else { String::new() },
            word_count: post.word_count(),
            draft: post.draft,
        }
    }

    fn page_data(&self, page: &Page) -> PageData {
        let format = |d: &chrono::DateTime<chrono::FixedOffset>| {
            format_date(d, &self.site.config.date_format)
        };
        PageData {
            title: page.title.clone(),
            date: page.date.as_ref().map(format),
            updated: page.updated.as_ref().map(format),
            url: page.url.clone(),
            permalink: page.permalink.clone(),
            content: page.content.clone(),
            layout: page.layout.clone(),
        }
    }

    /// Template for a layout, falling back to `default`
    fn template_for(&self, layout: &str, default: &str, source: &str) -> String {
        if layout.is_empty() {
            return default.to_string();
        }
        let name = format!("{}.html", layout);
        if self.renderer.has_template(&name) {
            return name;
        }
        tracing::warn!(
            "{}: no template for layout {:?}, using {}",
            source,
            layout,
            default
        );
        default.to_string()
    }

    /// Posts in index order; equal keys keep source order
    fn index_order<'c>(&self, posts: &'c [Post]) -> Vec<&'c Post> {
        let mut ordered: Vec<&Post> = posts.iter().collect();
        let order_by = self.site.config.index_generator.order_by.trim();
        let (descending, key) = match order_by.strip_prefix('-') {
            Some(key) => (true, key),
            None => (false, order_by),
        };
        if !matches!(key, "date" | "updated" | "title") {
            tracing::warn!("Unknown index order {:?}, using -date", order_by);
            return ordered;
        }

        ordered.sort_by(|a, b| {
            let primary = match key {
                "updated" => a.updated.cmp(&b.updated),
                "title" => a.title.cmp(&b.title),
                _ => a.date.cmp(&b.date),
            };
            let primary = if descending { primary.reverse() } else { primary };
            primary.then_with(|| a.source.cmp(&b.source))
        });
        ordered
    }

    fn pagination_route(&self, number: usize) -> String {
        if number <= 1 {
            String::new()
        } else {
            format!(
                "{}/{}/",
                self.site.config.pagination_dir.trim_matches('/'),
                number
            )
        }
    }

    fn render_index(&self, pass: &mut Pass, base: &Context, posts: &[Post]) {
        let ordered = self.index_order(posts);
        let per_page = self.site.config.index_per_page();
        let total = ordered.len().div_ceil(per_page).max(1);

        for number in 1..=total {
            let start = (number - 1) * per_page;
            let end = (start + per_page).min(ordered.len());
            let page_posts: Vec<PostData> = ordered[start..end]
                .iter()
                .map(|p| self.post_data(p, false))
                .collect();

            let url = |n: usize| url_for_root(&self.root, &self.pagination_route(n));
            let pagination = PaginationData {
                per_page,
                total,
                current: number,
                prev_url: (number > 1).then(|| url(number - 1)),
                next_url: (number < total).then(|| url(number + 1)),
                pages: page_window(number, total, PAGER_MID_SIZE)
                    .into_iter()
                    .map(|n| {
                        n.map(|n| PageLink {
                            number: n,
                            url: url(n),
                            current: n == number,
                        })
                    })
                    .collect(),
            };

            let route = self.pagination_route(number);
            let title = if number == 1 {
                String::new()
            } else {
                format!("Page {}", number)
            };
            let mut context = self.page_context(base, &title, &route);
            context.insert("posts", &page_posts);
            context.insert("pagination", &pagination);
            pass.emit(&route, self.renderer.render("index.html", &context), "index");
        }
    }

    /// One page per post. Posts are newest first, so the previous post is
    /// the older neighbour.
    fn render_posts(&self, pass: &mut Pass, base: &Context, posts: &[Post]) {
        for (i, post) in posts.iter().enumerate() {
            let mut context = base.clone();
            context.insert("page_title", &post.title);
            context.insert("canonical_url", &post.permalink);
            context.insert("current_url", &post.url);
            context.insert("post", &self.post_data(post, true));
            context.insert(
                "page",
                &PageData {
                    title: post.title.clone(),
                    date: Some(format_date(&post.date, &self.site.config.date_format)),
                    updated: Some(format_date(&post.updated, &self.site.config.date_format)),
                    url: post.url.clone(),
                    permalink: post.permalink.clone(),
                    content: post.content.clone(),
                    layout: post.layout.clone(),
                },
            );
            context.insert("prev_post", &posts.get(i + 1).map(nav_post));
            context.insert("next_post", &i.checked_sub(1).and_then(|j| posts.get(j)).map(nav_post));
            if post.toc && !post.headings.is_empty() {
                context.insert("toc", &toc(&post.headings, TOC_DEPTH));
            }

            let template = self.template_for(&post.layout, "post.html", &post.source);
            pass.emit(
                &post.path,
                self.renderer.render(&template, &context),
                &post.source,
            );
        }
    }

    fn render_pages(
        &self,
        pass: &mut Pass,
        base: &Context,
        content: &Content,
        tags: &BTreeMap<String, TermPosts>,
    ) {
        for page in &content.pages {
            let mut context = base.clone();
            context.insert("page_title", &page.title);
            context.insert("canonical_url", &page.permalink);
            context.insert("current_url", &page.url);
            context.insert("page", &self.page_data(page));
            if page.toc && !page.headings.is_empty() {
                context.insert("toc", &toc(&page.headings, TOC_DEPTH));
            }

            match page.layout.as_str() {
                "archive" => context.insert("archive_years", &self.archive_years(&content.posts)),
                "tags" => {
                    context.insert("taxonomy", "Tags");
                    context.insert("terms", &term_data(tags));
                }
                "projects" => context.insert("projects", &content.projects),
                _ => {}
            }

            let template = self.template_for(&page.layout, "page.html", &page.source);
            pass.emit(
                &page.path,
                self.renderer.render(&template, &context),
                &page.source,
            );
        }
    }

    /// Group tag or category names by slug; the first spelling seen names
    /// the term
    fn collect_terms<'c>(
        &self,
        posts: &'c [Post],
        names: impl Fn(&Post) -> &Vec<String>,
        dir: &str,
    ) -> BTreeMap<String, TermPosts<'c>> {
        let mut terms: BTreeMap<String, TermPosts> = BTreeMap::new();
        for post in posts {
            for name in names(post) {
                if name.trim().is_empty() {
                    continue;
                }
                let term = Term::new(name, &self.root, dir);
                let entry = terms.entry(term.slug.clone()).or_insert(TermPosts {
                    term,
                    posts: Vec::new(),
                });
                if !entry.posts.iter().any(|p| std::ptr::eq(*p, post)) {
                    entry.posts.push(post);
                    entry.term.count += 1;
                }
            }
        }
        terms
    }

    /// Index page plus one page per term
    fn render_terms(
        &self,
        pass: &mut Pass,
        base: &Context,
        terms: &BTreeMap<String, TermPosts>,
        taxonomy: &str,
        dir: &str,
        claimed: &dyn Fn(&str) -> bool,
    ) {
        // The index exists even without terms; the default menu links it
        let index_route = dir_route(dir);
        if !claimed(&index_route) {
            let mut context = self.page_context(base, taxonomy, &index_route);
            context.insert("taxonomy", taxonomy);
            context.insert("terms", &term_data(terms));
            pass.emit(
                &index_route,
                self.renderer.render("tags.html", &context),
                taxonomy,
            );
        }

        for entry in terms.values() {
            let term = &entry.term;
            let posts: Vec<PostData> = entry.posts.iter().map(|p| self.post_data(p, false)).collect();
            let mut context =
                self.page_context(base, &format!("{}: {}", taxonomy, term.name), &term.path);
            context.insert("taxonomy", taxonomy);
            context.insert("term", &term_data_of(term));
            context.insert("posts", &posts);
            pass.emit(
                &term.path,
                self.renderer.render("term.html", &context),
                &format!("{} {:?}", taxonomy, term.name),
            );
        }
    }

    fn archive_years(&self, posts: &[Post]) -> Vec<ArchiveYearData> {
        let mut years: BTreeMap<i32, Vec<PostData>> = BTreeMap::new();
        for post in posts {
            years
                .entry(post.date.year())
                .or_default()
                .push(self.post_data(post, false));
        }
        years
            .into_iter()
            .rev()
            .map(|(year, posts)| ArchiveYearData { year, posts })
            .collect()
    }

    fn render_feeds(&self, pass: &mut Pass, posts: &[Post]) {
        let feed = &self.site.config.feed;
        let limit = if feed.limit == 0 { posts.len() } else { feed.limit };
        let latest: Vec<&Post> = posts.iter().take(limit).collect();

        let atom_path = feed.atom.trim().trim_start_matches('/');
        if !atom_path.is_empty() {
            pass.emit_file(atom_path, atom(&self.site.config, &latest), "atom feed");
        }
        let rss_path = feed.rss.trim().trim_start_matches('/');
        if !rss_path.is_empty() {
            pass.emit_file(rss_path, rss(&self.site.config, &latest), "rss feed");
        }

        match search_index(posts) {
            Ok(json) => pass.emit_file("search.json", json, "search index"),
            Err(e) => pass.errors.push(BuildError::Content {
                path: "search.json".into(),
                message: e.to_string(),
            }),
        }
    }

    /// Every generated HTML page except index pagination
    fn sitemap(&self, output: &Output, content: &Content) -> String {
        let pagination_prefix = format!(
            "{}/",
            self.site.config.pagination_dir.trim_matches('/')
        );

        let mut lastmod: BTreeMap<String, String> = BTreeMap::new();
        for post in &content.posts {
            lastmod.insert(route_file(&post.path), date_xml(&post.updated));
        }
        for page in &content.pages {
            if let Some(date) = page.updated.or(page.date) {
                lastmod.insert(route_file(&page.path), date_xml(&date));
            }
        }

        let entries: Vec<SitemapEntry> = output
            .html_pages()
            .map(|(path, _)| path)
            .filter(|path| !path.starts_with(&pagination_prefix))
            .map(|path| {
                let route = path.strip_suffix("index.html").unwrap_or(path);
                SitemapEntry {
                    loc: full_url_for(&self.site.config, route),
                    lastmod: lastmod.get(path).cloned(),
                }
            })
            .collect();
        sitemap(&entries)
    }
}

fn nav_post(post: &Post) -> NavPost {
    NavPost {
        title: post.title.clone(),
        url: post.url.clone(),
    }
}

fn term_data_of(term: &Term) -> TermData {
    TermData {
        name: term.name.clone(),
        slug: term.slug.clone(),
        url: term.url.clone(),
        count: term.count,
    }
}

/// Terms sorted by name, case-insensitively
fn term_data(terms: &BTreeMap<String, TermPosts>) -> Vec<TermData> {
    let mut data: Vec<TermData> = terms.values().map(|t| term_data_of(&t.term)).collect();
    data.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.slug.cmp(&b.slug))
    });
    data
}

/// Route of a configured directory such as `archives`
fn dir_route(dir: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &std::path::Path, path: &str, content: &str) {
        let path = dir.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn site(dir: &std::path::Path) -> Site {
        let config = SiteConfig {
            url: "https://example.com".to_string(),
            per_page: 2,
            ..Default::default()
        };
        Site::with_config(dir.to_path_buf(), config)
    }

    fn html(output: &Output, path: &str) -> String {
        String::from_utf8_lossy(output.get(path).unwrap_or_else(|| panic!("{} missing", path)))
            .into_owned()
    }

    #[test]
    fn test_render_blog() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        for (day, tags) in [("01", "[swift]"), ("02", "[swift, SwiftUI]"), ("03", "[math]")] {
            write(
                dir,
                &format!("source/_posts/post-{}.md", day),
                &format!(
                    "---\ntitle: Post {day}\ndate: 2024-01-{day}\ntags: {tags}\ncategories: iOS\n---\n\n## Intro\n\nBody {day}\n"
                ),
            );
        }
        write(dir, "source/about/index.md", "---\ntitle: About\nlayout: about\n---\nHi\n");

        let build = build(&site(dir)).unwrap();
        let output = &build.output;

        for path in [
            "index.html",
            "page/2/index.html",
            "2024/01/02/post-02/index.html",
            "about/index.html",
            "archives/index.html",
            "tags/index.html",
            "tags/swift/index.html",
            "tags/swiftui/index.html",
            "categories/ios/index.html",
            "atom.xml",
            "rss.xml",
            "search.json",
            "sitemap.xml",
            "css/blogsmith.css",
        ] {
            assert!(output.contains(path), "{} missing", path);
        }
        assert!(!output.contains("projects/index.html"));

        let middle = html(output, "2024/01/02/post-02/index.html");
        assert!(middle.contains(r#"class="post-nav-prev" href="/2024/01/01/post-01/""#));
        assert!(middle.contains(r#"class="post-nav-next" href="/2024/01/03/post-03/""#));
        assert!(middle.contains(r##"href="#intro""##));

        let index = html(output, "index.html");
        assert!(index.find("Post 03").unwrap() < index.find("Post 02").unwrap());
        assert!(!index.contains("Post 01"));
        assert!(index.contains(r#"href="/page/2/""#));

        let sitemap = html(output, "sitemap.xml");
        assert!(sitemap.contains("<loc>https://example.com/about/</loc>"));
        assert!(!sitemap.contains("/page/2/"));
    }

    #[test]
    fn test_page_claims_generated_route() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        write(dir, "source/_posts/a.md", "---\ntitle: A\ndate: 2024-01-01\n---\nA\n");
        write(
            dir,
            "source/archives/index.md",
            "---\ntitle: Everything\nlayout: archive\n---\n",
        );

        let build = build(&site(dir)).unwrap();
        let archive = html(&build.output, "archives/index.html");
        assert!(archive.contains("Everything"));
        assert!(archive.contains("2024"));
    }

    #[test]
    fn test_asset_colliding_with_page_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        write(dir, "source/about/index.md", "---\ntitle: About\n---\n");
        write(dir, "source/about/index.html", "<p>static</p>");

        let errors = build(&site(dir)).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, BuildError::DuplicateRoute { route, .. } if route == "about/index.html")));
    }

    #[test]
    fn test_dir_route() {
        assert_eq!(dir_route("archives"), "archives/");
        assert_eq!(dir_route("/tags/"), "tags/");
        assert_eq!(dir_route(""), "");
    }
}
