//! URL helper functions

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::config::SiteConfig;

/// Characters escaped in a URL path; `/` stays readable
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Prefix a site-relative path with the site root
///
/// # Examples
/// ```ignore
/// url_for_root("/blog/", "css/style.css") // -> "/blog/css/style.css"
/// ```
pub fn url_for_root(root: &str, path: &str) -> String {
    let root = root.trim_end_matches('/');
    let root = if root.is_empty() || root.starts_with('/') {
        root.to_string()
    } else {
        format!("/{}", root)
    };
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, encode_path(path))
    }
}

/// Generate a URL with the configured root
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    url_for_root(&config.root, path)
}

/// Generate a full URL including the domain
///
/// # Examples
/// ```ignore
/// full_url_for(&config, "about/") // -> "https://example.com/blog/about/"
/// ```
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    format!("{}{}", site_origin(config), url_for(config, path))
}

/// `url` without its path, e.g. `https://example.com` for
/// `https://example.com/blog`. The root supplies the path.
pub fn site_origin(config: &SiteConfig) -> String {
    let url = config.url.trim_end_matches('/');
    let root = config.normalized_root();
    let root = root.trim_end_matches('/');
    url.strip_suffix(root)
        .filter(|_| !root.is_empty())
        .unwrap_or(url)
        .to_string()
}

/// Percent-encode a URL path, leaving existing escapes alone
pub fn encode_path(path: &str) -> String {
    if path.contains('%') {
        return path.to_string();
    }
    utf8_percent_encode(path, PATH).to_string()
}

/// Decode a percent-encoded URL path
pub fn decode_path(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SiteConfig {
        SiteConfig {
            url: "https://example.com/blog".to_string(),
            root: "/blog/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_for() {
        let config = test_config();
        assert_eq!(url_for(&config, "/css/style.css"), "/blog/css/style.css");
        assert_eq!(url_for(&config, "about/"), "/blog/about/");
        assert_eq!(url_for(&config, ""), "/blog/");
        assert_eq!(url_for_root("/", ""), "/");
        assert_eq!(url_for_root("blog", "a/"), "/blog/a/");
    }

    #[test]
    fn test_url_for_encodes_spaces() {
        assert_eq!(url_for_root("/", "images/my photo.png"), "/images/my%20photo.png");
        assert_eq!(url_for_root("/", "images/my%20photo.png"), "/images/my%20photo.png");
    }

    #[test]
    fn test_full_url_for() {
        let config = test_config();
        assert_eq!(
            full_url_for(&config, "/about/"),
            "https://example.com/blog/about/"
        );

        let config = SiteConfig {
            url: "https://example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(full_url_for(&config, "atom.xml"), "https://example.com/atom.xml");
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("/tags/swift%20ui/"), "/tags/swift ui/");
    }
}
