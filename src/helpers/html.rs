//! HTML and XML helper functions

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::assets::is_external;
use crate::config::ExternalLinkConfig;

lazy_static! {
    static ref ROOTED_ATTR: Regex = Regex::new(r#"(href|src|poster)=(["'])/([^/])"#).unwrap();
    static ref ANCHOR_OPEN: Regex = Regex::new(r#"<a\s([^>]*?)href="([^"]*)"([^>]*)>"#).unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escape XML special characters
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Strip HTML tags from a string and collapse whitespace
pub fn strip_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_tag = false;

    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    let decoded = result
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

/// Truncate to `length` characters, appending `omission` when cut
pub fn truncate(s: &str, length: usize, omission: Option<&str>) -> String {
    let omission = omission.unwrap_or("...");

    if s.chars().count() <= length {
        s.to_string()
    } else {
        let truncated: String = s
            .chars()
            .take(length.saturating_sub(omission.chars().count()))
            .collect();
        format!("{}{}", truncated.trim_end(), omission)
    }
}

/// Count words; each CJK character counts as one word
pub fn word_count(html: &str) -> usize {
    let text = strip_html(html);
    let mut count = 0;
    let mut in_word = false;

    for c in text.chars() {
        if ('\u{4E00}'..='\u{9FFF}').contains(&c) {
            count += 1;
            in_word = false;
        } else if c.is_alphanumeric() {
            if !in_word {
                in_word = true;
                count += 1;
            }
        } else if c != '\'' && c != '-' {
            in_word = false;
        }
    }

    count
}

/// Rewrite root-relative `href`/`src` attributes to absolute URLs so HTML
/// embedded in a feed resolves outside the site
pub fn absolutize_urls(html: &str, origin: &str) -> String {
    let origin = origin.trim_end_matches('/');
    ROOTED_ATTR
        .replace_all(html, |caps: &Captures| {
            format!("{}={}{}/{}", &caps[1], &caps[2], origin, &caps[3])
        })
        .into_owned()
}

/// Strip characters XML 1.0 does not allow
pub fn strip_invalid_xml_chars(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            c == '\t'
                || c == '\n'
                || c == '\r'
                || ('\u{0020}'..='\u{D7FF}').contains(&c)
                || ('\u{E000}'..='\u{FFFD}').contains(&c)
                || ('\u{10000}'..='\u{10FFFF}').contains(&c)
        })
        .collect()
}

/// Open external links in a new tab, except hosts listed in `exclude`.
/// Anchors that already carry a `target` are left alone.
pub fn mark_external_links(html: &str, config: &ExternalLinkConfig, site_host: &str) -> String {
    if !config.enable {
        return html.to_string();
    }

    ANCHOR_OPEN
        .replace_all(html, |caps: &Captures| {
            let href = &caps[2];
            let attrs = format!("{}{}", &caps[1], &caps[3]);
            let host = host_of(href);
            let internal = !is_external(href)
                || href.starts_with("data:")
                || href.starts_with("mailto:")
                || host == site_host
                || config.exclude.iter().any(|e| e == host);

            if internal || attrs.contains("target=") {
                caps[0].to_string()
            } else {
                format!(
                    r#"<a {}href="{}"{} target="_blank" rel="noopener">"#,
                    &caps[1], href, &caps[3]
                )
            }
        })
        .into_owned()
}

/// Host part of an absolute URL
pub fn host_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let without_scheme = without_scheme.trim_start_matches('/');
    without_scheme
        .split(['/', '?', '#', ':'])
        .next()
        .unwrap_or(without_scheme)
}
