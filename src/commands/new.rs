//! Create a new post, page or draft from a scaffold

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fs;
use std::path::PathBuf;

use crate::Site;

const DEFAULT_SCAFFOLD: &str = "---\ntitle: {{ title }}\ndate: {{ date }}\ntags:\n---\n";

/// Title as a YAML scalar, quoted when it would not parse as plain text
fn yaml_title(title: &str) -> String {
    serde_yaml::to_string(title)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| format!("{:?}", title))
}

/// Expand `new_post_name` tokens
fn file_name(pattern: &str, slug: &str, now: &DateTime<Tz>) -> String {
    let name = pattern
        .replace(":title", slug)
        .replace(":year", &now.format("%Y").to_string())
        .replace(":i_month", &now.format("%-m").to_string())
        .replace(":i_day", &now.format("%-d").to_string())
        .replace(":month", &now.format("%m").to_string())
        .replace(":day", &now.format("%d").to_string());
    if name.ends_with(".md") {
        name
    } else {
        format!("{}.md", name)
    }
}

/// Create a new post/page/draft and return its path.
///
/// `post` and custom layouts go to `_posts/`, drafts to `_drafts/`, and
/// pages to `<path>/index.md`. `path` replaces the generated file name.
pub fn create_post(site: &Site, title: &str, layout: &str, path: Option<&str>) -> Result<PathBuf> {
    let now = Utc::now().with_timezone(&site.config.timezone()?);
    let slug = slug::slugify(title);
    if slug.is_empty() && path.is_none() {
        anyhow::bail!("Cannot derive a file name from {:?}; pass --path", title);
    }

    let file_path = match layout {
        "page" => {
            let dir = path.map(|p| p.trim_matches('/')).unwrap_or(&slug);
            site.source_dir.join(dir).join("index.md")
        }
        _ => {
            let dir = if layout == "draft" { "_drafts" } else { "_posts" };
            let name = match path {
                Some(p) if p.ends_with(".md") => p.to_string(),
                Some(p) => format!("{}.md", p),
                None if layout == "draft" => format!("{}.md", slug),
                None => file_name(&site.config.new_post_name, &slug, &now),
            };
            site.source_dir.join(dir).join(name)
        }
    };

    if file_path.exists() {
        anyhow::bail!("File already exists: {:?}", file_path);
    }

    let scaffold_path = site.base_dir.join("scaffolds").join(format!("{}.md", layout));
    let scaffold = if scaffold_path.is_file() {
        fs::read_to_string(&scaffold_path)
            .with_context(|| format!("Failed to read {:?}", scaffold_path))?
    } else {
        if !matches!(layout, "post" | "page" | "draft") {
            tracing::warn!("No scaffold for layout {:?}, using the default", layout);
        }
        DEFAULT_SCAFFOLD.to_string()
    };

    let content = scaffold
        .replace("{{ title }}", &yaml_title(title))
        .replace("{{ date }}", &now.format("%Y-%m-%d %H:%M:%S").to_string())
        .replace("{{ layout }}", layout);

    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    fs::write(&file_path, content).with_context(|| format!("Failed to write {:?}", file_path))?;

    tracing::info!("Created: {:?}", file_path);
    Ok(file_path)
}
