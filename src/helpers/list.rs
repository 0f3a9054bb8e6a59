//! List helpers: table of contents and pagination windows

use super::html::html_escape;
use crate::content::Heading;

/// Build a nested table of contents from rendered headings.
///
/// Levels are taken relative to the shallowest heading present, so a post
/// that starts at `##` still gets a top-level list. Headings deeper than
/// `max_depth` levels below that are left out.
pub fn toc(headings: &[Heading], max_depth: u8) -> String {
    let Some(base) = headings.iter().map(|h| h.level).min() else {
        return String::new();
    };
    let max_level = base.saturating_add(max_depth.max(1) - 1);
    let headings: Vec<&Heading> = headings.iter().filter(|h| h.level <= max_level).collect();

    let mut html = String::from(r#"<ol class="toc">"#);
    let mut depth = base;
    let mut first = true;

    for heading in headings {
        let level = heading.level.max(base);
        if first {
            depth = level;
            while depth > base {
                html.push_str(r#"<li class="toc-item"><ol class="toc-child">"#);
                depth -= 1;
            }
            depth = level;
            first = false;
        } else if level > depth {
            html.push_str(r#"<ol class="toc-child">"#);
            depth += 1;
            // Skipped levels get an empty item so every list stays inside one
            while depth < level {
                html.push_str(r#"<li class="toc-item"><ol class="toc-child">"#);
                depth += 1;
            }
        } else {
            html.push_str("</li>");
            while depth > level {
                html.push_str("</ol></li>");
                depth -= 1;
            }
        }

        html.push_str(&format!(
            r##"<li class="toc-item toc-level-{}"><a class="toc-link" href="#{}">{}</a>"##,
            heading.level,
            html_escape(&heading.id),
            html_escape(&heading.text)
        ));
    }

    html.push_str("</li>");
    while depth > base {
        html.push_str("</ol></li>");
        depth -= 1;
    }
    html.push_str("</ol>");
    html
}

/// Page numbers to show around `current`; `None` marks a gap
pub fn page_window(current: usize, total: usize, mid_size: usize) -> Vec<Option<usize>> {
    if total == 0 {
        return Vec::new();
    }
    let start = current.saturating_sub(mid_size).max(1);
    let end = (current + mid_size).min(total);

    let mut pages = Vec::new();
    if start > 1 {
        pages.push(Some(1));
        if start > 2 {
            pages.push(None);
        }
    }
    pages.extend((start..=end).map(Some));
    if end < total {
        if end < total - 1 {
            pages.push(None);
        }
        pages.push(Some(total));
    }
    pages
}
