//! Atom / RSS feeds, sitemap and search index

use serde::Serialize;

use crate::config::{FeedContent, SiteConfig};
use crate::content::Post;
use crate::helpers::{
    absolutize_urls, date_rfc822, date_xml, full_url_for, site_origin, strip_html,
    strip_invalid_xml_chars, xml_escape,
};

/// Wrap HTML in a CDATA section
fn cdata(html: &str) -> String {
    format!(
        "<![CDATA[{}]]>",
        strip_invalid_xml_chars(html).replace("]]>", "]]]]><![CDATA[>")
    )
}

/// HTML carried by a feed entry, with root-relative URLs made absolute
fn entry_html(config: &SiteConfig, post: &Post) -> String {
    let html = match config.feed.content {
        FeedContent::Full => post.content.as_str(),
        FeedContent::Summary => post.teaser(),
    };
    absolutize_urls(html, &site_origin(config))
}

/// Atom 1.0 feed of the given posts, newest first
pub fn atom(config: &SiteConfig, posts: &[&Post]) -> String {
    let home = full_url_for(config, "");
    let self_url = full_url_for(config, &config.feed.atom);

    let mut feed = String::new();
    feed.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    feed.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
    feed.push_str(&format!("  <title>{}</title>\n", xml_escape(&config.title)));
    if !config.subtitle.is_empty() {
        feed.push_str(&format!(
            "  <subtitle>{}</subtitle>\n",
            xml_escape(&config.subtitle)
        ));
    }
    feed.push_str(&format!("  <link href=\"{}\" rel=\"self\"/>\n", xml_escape(&self_url)));
    feed.push_str(&format!("  <link href=\"{}\"/>\n", xml_escape(&home)));
    if let Some(updated) = posts.iter().map(|p| p.updated).max() {
        feed.push_str(&format!("  <updated>{}</updated>\n", date_xml(&updated)));
    }
    feed.push_str(&format!("  <id>{}</id>\n", xml_escape(&home)));
    feed.push_str(&format!(
        "  <author><name>{}</name></author>\n",
        xml_escape(&config.author)
    ));
    feed.push_str("  <generator>blogsmith</generator>\n");

    for post in posts {
        feed.push_str("  <entry>\n");
        feed.push_str(&format!("    <title>{}</title>\n", xml_escape(&post.title)));
        feed.push_str(&format!("    <link href=\"{}\"/>\n", xml_escape(&post.permalink)));
        feed.push_str(&format!("    <id>{}</id>\n", xml_escape(&post.permalink)));
        feed.push_str(&format!("    <published>{}</published>\n", date_xml(&post.date)));
        feed.push_str(&format!("    <updated>{}</updated>\n", date_xml(&post.updated)));
        for author in &post.authors {
            feed.push_str(&format!(
                "    <author><name>{}</name></author>\n",
                xml_escape(author)
            ));
        }
        feed.push_str(&format!(
            "    <summary type=\"text\">{}</summary>\n",
            xml_escape(&post.description())
        ));
        feed.push_str(&format!(
            "    <content type=\"html\">{}</content>\n",
            cdata(&entry_html(config, post))
        ));
        for term in post.categories.iter().chain(&post.tags) {
            feed.push_str(&format!("    <category term=\"{}\"/>\n", xml_escape(term)));
        }
        feed.push_str("  </entry>\n");
    }

    feed.push_str("</feed>\n");
    feed
}

/// RSS 2.0 feed of the given posts, newest first
pub fn rss(config: &SiteConfig, posts: &[&Post]) -> String {
    let home = full_url_for(config, "");
    let self_url = full_url_for(config, &config.feed.rss);

    let mut feed = String::new();
    feed.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    feed.push_str("<rss version=\"2.0\" xmlns:atom=\"http://www.w3.org/2005/Atom\">\n");
    feed.push_str("  <channel>\n");
    feed.push_str(&format!("    <title>{}</title>\n", xml_escape(&config.title)));
    feed.push_str(&format!("    <link>{}</link>\n", xml_escape(&home)));
    feed.push_str(&format!(
        "    <atom:link href=\"{}\" rel=\"self\" type=\"application/rss+xml\"/>\n",
        xml_escape(&self_url)
    ));
    let description = if config.description.is_empty() {
        &config.subtitle
    } else {
        &config.description
    };
    feed.push_str(&format!(
        "    <description>{}</description>\n",
        xml_escape(description)
    ));
    feed.push_str(&format!("    <language>{}</language>\n", xml_escape(&config.language)));
    if let Some(updated) = posts.iter().map(|p| p.updated).max() {
        feed.push_str(&format!(
            "    <lastBuildDate>{}</lastBuildDate>\n",
            date_rfc822(&updated)
        ));
    }

    for post in posts {
        feed.push_str("    <item>\n");
        feed.push_str(&format!("      <title>{}</title>\n", xml_escape(&post.title)));
        feed.push_str(&format!("      <link>{}</link>\n", xml_escape(&post.permalink)));
        feed.push_str(&format!(
            "      <guid isPermaLink=\"true\">{}</guid>\n",
            xml_escape(&post.permalink)
        ));
        feed.push_str(&format!("      <pubDate>{}</pubDate>\n", date_rfc822(&post.date)));
        feed.push_str(&format!(
            "      <description>{}</description>\n",
            cdata(&entry_html(config, post))
        ));
        for term in post.categories.iter().chain(&post.tags) {
            feed.push_str(&format!("      <category>{}</category>\n", xml_escape(term)));
        }
        feed.push_str("    </item>\n");
    }

    feed.push_str("  </channel>\n");
    feed.push_str("</rss>\n");
    feed
}

/// A sitemap `<url>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    /// Absolute URL
    pub loc: String,
    /// W3C datetime of the last change, when known
    pub lastmod: Option<String>,
}

pub fn sitemap(entries: &[SitemapEntry]) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for entry in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", xml_escape(&entry.loc)));
        if let Some(lastmod) = &entry.lastmod {
            xml.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod));
        }
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

#[derive(Serialize)]
struct SearchEntry<'a> {
    title: &'a str,
    url: &'a str,
    date: String,
    tags: &'a [String],
    categories: &'a [String],
    content: String,
}

/// Client-side search index of every published post
pub fn search_index(posts: &[Post]) -> Result<String, serde_json::Error> {
    let entries: Vec<SearchEntry> = posts
        .iter()
        .map(|p| SearchEntry {
            title: &p.title,
            url: &p.url,
            date: date_xml(&p.date),
            tags: &p.tags,
            categories: &p.categories,
            content: strip_html(&p.content),
        })
        .collect();
    serde_json::to_string_pretty(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn post(title: &str, date: &str, content: &str) -> Post {
        let date = DateTime::parse_from_rfc3339(date).unwrap();
        Post {
            title: title.to_string(),
            slug: slug::slugify(title),
            date,
            updated: date,
            draft: false,
            tags: vec!["swift".to_string()],
            categories: Vec::new(),
            authors: Vec::new(),
            summary: None,
            image: None,
            raw: String::new(),
            content: content.to_string(),
            excerpt: None,
            headings: Vec::new(),
            toc: false,
            layout: "post".to_string(),
            source: format!("_posts/{}.md", title),
            full_source: PathBuf::new(),
            bundle_dir: None,
            path: format!("{}/", slug::slugify(title)),
            url: format!("/{}/", slug::slugify(title)),
            permalink: format!("https://example.com/{}/", slug::slugify(title)),
            assets: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    fn config() -> SiteConfig {
        SiteConfig {
            title: "Notes & Things".to_string(),
            url: "https://example.com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_atom_updated_is_newest_post() {
        let older = post("Older", "2023-05-01T10:00:00+00:00", "<p>a</p>");
        let newer = post("Newer", "2024-01-15T08:30:00+02:00", r#"<img src="/images/a.png">"#);
        let xml = atom(&config(), &[&newer, &older]);

        assert!(xml.contains("<title>Notes &amp; Things</title>"));
        assert!(xml.contains("<updated>2024-01-15T08:30:00+02:00</updated>"));
        assert!(xml.contains(r#"src="https://example.com/images/a.png""#));
        assert!(xml.find("Newer").unwrap() < xml.find("Older").unwrap());
    }

    #[test]
    fn test_feed_without_posts_has_no_timestamp() {
        let xml = atom(&config(), &[]);
        assert!(!xml.contains("<updated>"));
        let xml = rss(&config(), &[]);
        assert!(!xml.contains("<lastBuildDate>"));
    }

    #[test]
    fn test_cdata_terminator_is_split() {
        assert_eq!(cdata("a]]>b"), "<![CDATA[a]]]]><![CDATA[>b]]>");
    }

    #[test]
    fn test_rss_items() {
        let p = post("Hello", "2024-01-15T08:30:00+00:00", "<p>hi</p>");
        let xml = rss(&config(), &[&p]);
        assert!(xml.contains("<pubDate>Mon, 15 Jan 2024 08:30:00 +0000</pubDate>"));
        assert!(xml.contains("<category>swift</category>"));
        assert!(xml.contains(r#"<guid isPermaLink="true">https://example.com/hello/</guid>"#));
    }

    #[test]
    fn test_search_index() {
        let p = post("Hello", "2024-01-15T08:30:00+00:00", "<p>Hello <em>there</em></p>");
        let json: serde_json::Value = serde_json::from_str(&search_index(&[p]).unwrap()).unwrap();
        assert_eq!(json[0]["url"], "/hello/");
        assert_eq!(json[0]["content"], "Hello there");
    }
}
