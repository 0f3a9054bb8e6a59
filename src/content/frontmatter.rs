//! Front-matter parsing

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing closing `{0}`")]
    Unterminated(&'static str),
}

/// Accepts either a single string or a list of strings
pub(crate) fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, SeqAccess, Visitor};
    use std::fmt;

    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(split_inline_list(value))
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let mut items = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                let item = item.trim();
                if !item.is_empty() {
                    items.push(item.to_string());
                }
            }
            Ok(items)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

/// `tags: swift, ios` is shorthand for a two-element list
fn split_inline_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accepts strings and bare scalars (`date: 2024` or an unquoted number)
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(
        Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
            Scalar::Str(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
        }),
    )
}

/// Front-matter data from a post or page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub date: Option<String>,
    #[serde(alias = "lastmod", deserialize_with = "scalar_string")]
    pub updated: Option<String>,
    pub draft: bool,
    /// `published: false` is the same as `draft: true`
    pub published: Option<bool>,
    #[serde(deserialize_with = "string_or_vec")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "string_or_vec")]
    pub categories: Vec<String>,
    #[serde(deserialize_with = "string_or_vec")]
    pub authors: Vec<String>,
    pub author: Option<String>,
    #[serde(alias = "description")]
    pub summary: Option<String>,
    pub slug: Option<String>,
    pub layout: Option<String>,
    pub permalink: Option<String>,
    pub image: Option<String>,
    pub toc: Option<bool>,

    /// Additional custom fields
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl FrontMatter {
    /// Split `content` into front-matter and body.
    ///
    /// Content without a recognizable front-matter block yields the default
    /// front-matter and the content unchanged. A block that is clearly
    /// front-matter but does not parse is an error.
    pub fn parse(content: &str) -> Result<(Self, &str), FrontMatterError> {
        let content = content.trim_start_matches('\u{feff}');
        let trimmed = content.trim_start();

        if trimmed.starts_with("---") {
            return Self::parse_yaml(trimmed, content);
        }
        if trimmed.starts_with("+++") {
            return Self::parse_toml(trimmed);
        }
        // `{"` rather than `{` so a post opening with a shortcode is not JSON
        let json_object = trimmed
            .strip_prefix('{')
            .is_some_and(|rest| rest.trim_start().starts_with('"'));
        if trimmed.starts_with(";;;") || json_object {
            return Self::parse_json(trimmed, content);
        }

        Ok((FrontMatter::default(), content))
    }

    fn parse_yaml<'a>(
        content: &'a str,
        original: &'a str,
    ) -> Result<(Self, &'a str), FrontMatterError> {
        let rest = content[3..].trim_start_matches([' ', '\t']);
        let rest = match rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) {
            Some(rest) => rest,
            // `---text` on the first line is not a delimiter
            None => return Ok((FrontMatter::default(), original)),
        };

        let (yaml, remaining) = match find_closing(rest, "---") {
            Some(split) => split,
            None => {
                if looks_like_yaml(rest.lines().next().unwrap_or("")) {
                    return Err(FrontMatterError::Unterminated("---"));
                }
                return Ok((FrontMatter::default(), original));
            }
        };

        if yaml.trim().is_empty() {
            return Ok((FrontMatter::default(), remaining));
        }

        // A leading thematic break followed by prose is Markdown, not YAML
        if !yaml.lines().any(looks_like_yaml) {
            return Ok((FrontMatter::default(), original));
        }

        let fm = serde_yaml::from_str::<FrontMatter>(yaml)?;
        Ok((fm, remaining))
    }

    fn parse_toml(content: &str) -> Result<(Self, &str), FrontMatterError> {
        let rest = content[3..].trim_start_matches(['\r', '\n']);
        let (body, remaining) =
            find_closing(rest, "+++").ok_or(FrontMatterError::Unterminated("+++"))?;

        let mut table: toml::Table = toml::from_str(body)?;
        stringify_datetimes(&mut table);
        let fm = toml::Value::Table(table).try_into::<FrontMatter>()?;
        Ok((fm, remaining))
    }

    fn parse_json<'a>(
        content: &'a str,
        original: &'a str,
    ) -> Result<(Self, &'a str), FrontMatterError> {
        if let Some(rest) = content.strip_prefix(";;;") {
            let end = rest.find(";;;").ok_or(FrontMatterError::Unterminated(";;;"))?;
            let json = rest[..end].trim();
            let json = if json.starts_with('{') {
                json.to_string()
            } else {
                format!("{{{}}}", json)
            };
            let fm: FrontMatter = serde_json::from_str(&json)?;
            return Ok((fm, rest[end + 3..].trim_start_matches(['\r', '\n'])));
        }

        // A bare object at the very start; anything that does not close is
        // ordinary text that happens to begin with a brace
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (i, c) in content.char_indices() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let fm: FrontMatter = serde_json::from_str(&content[..=i])?;
                        return Ok((fm, content[i + 1..].trim_start_matches(['\r', '\n'])));
                    }
                }
                _ => {}
            }
        }

        Ok((FrontMatter::default(), original))
    }

    /// Whether this front-matter marks the document as a draft
    pub fn is_draft(&self) -> bool {
        self.draft || self.published == Some(false)
    }

    /// Authors list, falling back to the single `author` field
    pub fn author_list(&self) -> Vec<String> {
        if !self.authors.is_empty() {
            self.authors.clone()
        } else {
            self.author.iter().cloned().collect()
        }
    }
}

/// Find a closing delimiter that sits on its own line.
/// Returns (block, remainder after the delimiter line).
fn find_closing<'a>(rest: &'a str, delimiter: &str) -> Option<(&'a str, &'a str)> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == delimiter {
            let block = &rest[..offset];
            let remaining = rest[offset + line.len()..].trim_start_matches(['\r', '\n']);
            return Some((block, remaining));
        }
        offset += line.len();
    }
    None
}

/// A `key: value` or `key:` line whose key is a plain identifier
fn looks_like_yaml(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return false;
    }
    let Some(colon) = trimmed.find(':') else {
        return false;
    };
    let key = &trimmed[..colon];
    let is_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !matches!(key, "http" | "https" | "ftp" | "mailto");
    let after = &trimmed[colon + 1..];
    is_key && (after.is_empty() || after.starts_with(' '))
}

fn stringify_datetimes(table: &mut toml::Table) {
    for (_, value) in table.iter_mut() {
        let text = match value {
            toml::Value::Datetime(dt) => dt.to_string(),
            toml::Value::Table(inner) => {
                stringify_datetimes(inner);
                continue;
            }
            _ => continue,
        };
        *value = toml::Value::String(text);
    }
}

/// Parse a front-matter date. Values without an explicit offset are read
/// as wall-clock time in `tz`.
pub fn parse_date_string(s: &str, tz: Tz) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    let naive_datetime = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok());

    let naive = naive_datetime.or_else(|| {
        ["%Y-%m-%d", "%Y/%m/%d"]
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}
