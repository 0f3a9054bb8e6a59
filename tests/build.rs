//! End-to-end builds of small sites on disk

use blogsmith::commands::generate;
use blogsmith::{BuildError, Site};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CONFIG: &str = "title: Test Blog\nurl: https://example.com\nper_page: 2\n";

fn write(dir: &Path, path: &str, content: &str) {
    let path = dir.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn post(dir: &Path, name: &str, front_matter: &str, body: &str) {
    write(
        dir,
        &format!("source/_posts/{}.md", name),
        &format!("---\n{}\n---\n{}\n", front_matter, body),
    );
}

/// A small blog: four posts over two index pages, tags, a bundle with an
/// image, an about page and a project list
fn blog() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write(dir, "_config.yml", CONFIG);
    post(dir, "lists", "title: SwiftUI Lists\ndate: 2024-01-10\ntags: [SwiftUI, swift]", "## Basics\n\nLists.");
    post(dir, "matrices", "title: Matrices\ndate: 2024-02-01\ntags: [math]\ncategories: Math", "Rows.\n\n<!-- more -->\n\nColumns.");
    post(dir, "state", "title: State\ndate: 2024-03-05\ntags: [swiftui]", "{{< img src=\"/images/state.png\" alt=\"State\" >}}");
    write(
        dir,
        "source/_posts/gallery/index.md",
        "---\ntitle: Gallery\ndate: 2024-04-01\n---\n{{< gallery >}}\nfirst.jpg\nsecond.jpg\n{{< /gallery >}}\n",
    );
    write(dir, "source/_posts/gallery/first.jpg", "jpg");
    write(dir, "source/_posts/gallery/second.jpg", "jpg");
    write(dir, "source/images/state.png", "png");
    write(dir, "source/about/index.md", "---\ntitle: About\nlayout: about\n---\nHello.\n");
    write(
        dir,
        "source/_data/projects.yml",
        "- title: Tool\n  link: https://example.org/tool\n  description: A tool.\n",
    );
    tmp
}

fn text(build: &blogsmith::Build, path: &str) -> String {
    String::from_utf8_lossy(build.output.get(path).unwrap_or_else(|| panic!("{} missing", path)))
        .into_owned()
}

#[test]
fn builds_are_byte_identical() {
    let tmp = blog();
    let site = Site::new(tmp.path()).unwrap();

    let first = site.build().unwrap();
    let second = site.build().unwrap();
    let first: Vec<_> = first.output.iter().collect();
    let second: Vec<_> = second.output.iter().collect();
    assert_eq!(first, second);

    let written = generate::run(&site, true).unwrap().unwrap();
    assert!(written.written > 0);
    let again = generate::run(&site, true).unwrap().unwrap();
    assert_eq!(again.written, 0);
    assert_eq!(again.removed, 0);
}

#[test]
fn every_cross_reference_resolves() {
    let tmp = blog();
    let site = Site::new(tmp.path()).unwrap();
    assert!(site.config.check_links);

    // The link checker ran as part of the build
    let build = site.build().unwrap();

    let state = text(&build, "2024/03/05/state/index.html");
    assert!(state.contains(r#"href="/2024/02/01/matrices/""#));
    assert!(state.contains(r#"href="/2024/04/01/gallery/""#));
    assert!(state.contains(r#"href="/tags/swiftui/""#));

    // SwiftUI and swiftui share one tag page
    let tag = text(&build, "tags/swiftui/index.html");
    assert!(tag.contains("SwiftUI Lists"));
    assert!(tag.contains("State"));

    let index = text(&build, "index.html");
    assert!(index.contains(r#"href="/page/2/""#));
    let second = text(&build, "page/2/index.html");
    assert!(second.contains("SwiftUI Lists"));
    assert!(build.output.contains("categories/math/index.html"));
    assert!(build.output.contains("projects/index.html"));

    let gallery = text(&build, "2024/04/01/gallery/index.html");
    assert!(gallery.contains("/2024/04/01/gallery/first.jpg"));
    assert!(build.assets.contains("2024/04/01/gallery/second.jpg"));
}

#[test]
fn drafts_stay_out_of_published_output() {
    let tmp = blog();
    let dir = tmp.path();
    post(dir, "secret", "title: Secret Plans\ndate: 2024-05-01\ndraft: true\ntags: [hidden]", "Shh.");
    write(
        dir,
        "source/_drafts/idea.md",
        "---\ntitle: Unfinished Idea\ndate: 2024-05-02\ntags: [hidden]\n---\nLater.\n",
    );

    let site = Site::new(dir).unwrap();
    let build = site.build().unwrap();
    assert_eq!(build.content.posts.len(), 4);
    assert!(!build.output.contains("tags/hidden/index.html"));
    for (path, bytes) in build.output.iter() {
        let body = String::from_utf8_lossy(bytes);
        assert!(!body.contains("Secret Plans"), "draft leaked into {}", path);
        assert!(!body.contains("Unfinished Idea"), "draft leaked into {}", path);
    }

    let with_drafts = site.with_drafts(true).build().unwrap();
    assert_eq!(with_drafts.content.posts.len(), 6);
    assert!(with_drafts.output.contains("tags/hidden/index.html"));
    assert!(text(&with_drafts, "search.json").contains("Secret Plans"));
    assert!(text(&with_drafts, "atom.xml").contains("Unfinished Idea"));
}

#[test]
fn missing_image_fails_the_build() {
    let tmp = blog();
    fs::remove_file(tmp.path().join("source/images/state.png")).unwrap();

    let site = Site::new(tmp.path()).unwrap();
    let errors = site.build().unwrap_err();
    assert!(errors.iter().any(|e| matches!(
        e,
        BuildError::MissingAsset { reference, .. } if reference == "/images/state.png"
    )));
    assert!(!site.public_dir.exists());
}

#[test]
fn one_build_reports_every_problem() {
    let tmp = blog();
    let dir = tmp.path();
    fs::remove_file(dir.join("source/_posts/gallery/second.jpg")).unwrap();
    post(dir, "links", "title: Links\ndate: 2024-01-20", "[old](/2023/gone/) and [tag](/tags/rust/)");

    let errors = Site::new(dir).unwrap().build().unwrap_err();
    let missing = errors
        .iter()
        .filter(|e| matches!(e, BuildError::MissingAsset { .. }))
        .count();
    let broken: BTreeSet<&str> = errors
        .iter()
        .filter_map(|e| match e {
            BuildError::BrokenLink { target, .. } => Some(target.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(missing, 1);
    // Teasers repeat the links on the index pages too
    assert_eq!(broken, BTreeSet::from(["/2023/gone/", "/tags/rust/"]));
}

#[test]
fn malformed_front_matter_names_the_file() {
    let tmp = blog();
    let dir = tmp.path();
    post(dir, "broken", "title: [unclosed\ndate: 2024-01-01", "Body");
    post(dir, "also-broken", "title: Fine\ntags: {a", "Body");

    let errors = Site::new(dir).unwrap().build().unwrap_err();
    let paths: Vec<String> = errors
        .iter()
        .filter_map(|e| match e {
            BuildError::FrontMatter { path, .. } => Some(path.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().any(|p| p.ends_with("broken.md")));
    assert!(paths.iter().any(|p| p.ends_with("also-broken.md")));
}

#[test]
fn two_posts_claiming_one_url_fail() {
    let tmp = blog();
    let dir = tmp.path();
    post(dir, "one", "title: One\ndate: 2024-06-01\nslug: same", "One");
    post(dir, "two", "title: Two\ndate: 2024-06-01\nslug: same", "Two");

    let errors = Site::new(dir).unwrap().build().unwrap_err();
    assert!(errors.iter().any(|e| matches!(
        e,
        BuildError::DuplicateRoute { route, .. } if route == "2024/06/01/same/index.html"
    )));
}

#[test]
fn failed_generate_leaves_public_untouched() {
    let tmp = blog();
    let site = Site::new(tmp.path()).unwrap();
    generate::run(&site, false).unwrap();
    let index = fs::read(site.public_dir.join("index.html")).unwrap();

    post(tmp.path(), "late", "title: Late\ndate: 2025-01-01", "[x](/nowhere/)");
    assert!(generate::run(&site, false).is_err());
    assert_eq!(fs::read(site.public_dir.join("index.html")).unwrap(), index);
    assert!(!site.public_dir.join("2025/01/01/late/index.html").exists());
}

#[test]
fn untagged_default_site_builds() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();

    // No posts at all
    let empty = Site::new(dir).unwrap().build().unwrap();
    assert!(empty.output.contains("tags/index.html"));
    assert!(empty.output.contains("archives/index.html"));

    post(dir, "hello", "title: Hello\ndate: 2024-01-15", "No tags here.");
    let build = Site::new(dir).unwrap().build().unwrap();
    assert!(build.output.contains("2024/01/15/hello/index.html"));
    assert!(text(&build, "tags/index.html").contains("Nothing here yet."));
}

#[test]
fn html_in_code_spans_is_not_a_link() {
    let tmp = blog();
    let dir = tmp.path();
    post(
        dir,
        "html",
        "title: HTML\ndate: 2024-01-15\ntags: [web]",
        "Use `<img src=\"photo.png\">` to show a picture.\n\n```html\n<a href=\"/nowhere/\">x</a>\n```",
    );

    let build = Site::new(dir).unwrap().build().unwrap();
    assert!(text(&build, "2024/01/15/html/index.html").contains("photo.png"));
}

#[test]
fn initialized_site_builds() {
    let tmp = TempDir::new().unwrap();
    blogsmith::commands::init::init_site(tmp.path()).unwrap();
    generate::run(&Site::new(tmp.path()).unwrap(), false).unwrap().unwrap();
    assert!(tmp.path().join("public/about/index.html").is_file());
}
