//! Initialize a new site

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::Path;

const CONFIG: &str = r#"# Site
title: My Blog
subtitle: ''
description: ''
keywords:
author: John Doe
language: en
timezone: ''

# URL
url: http://example.com
root: /
permalink: :year/:month/:day/:title/

# Directory
source_dir: source
public_dir: public
tag_dir: tags
archive_dir: archives
category_dir: categories
project_dir: projects
skip_render: []

# Writing
new_post_name: :title.md
default_layout: post
render_drafts: false
future: true
check_links: true
external_link:
  enable: true
  exclude: []
highlight:
  enable: true
  theme: base16-ocean.dark
  line_number: false

# Home page
index_generator:
  per_page: 10
  order_by: -date

# Feeds
feed:
  atom: atom.xml
  rss: rss.xml
  limit: 20
  content: summary

# Date format (Moment.js tokens)
date_format: YYYY-MM-DD

# Pagination
per_page: 10
pagination_dir: page

menu:
  Home: /
  Archives: /archives/
  Tags: /tags/
  Projects: /projects/
  About: /about/

# Theme directory under themes/; empty uses the built-in templates
theme: ''
"#;

const POST_SCAFFOLD: &str = "---\ntitle: {{ title }}\ndate: {{ date }}\ntags:\ncategories:\n---\n";
const PAGE_SCAFFOLD: &str = "---\ntitle: {{ title }}\ndate: {{ date }}\n---\n";
const DRAFT_SCAFFOLD: &str = "---\ntitle: {{ title }}\ntags:\n---\n";

const ABOUT: &str = r#"---
title: About
layout: about
---

Hi! This blog is about building apps and the math behind them.
"#;

const PROJECTS: &str = r#"# Shown on /projects/
- title: blogsmith
  link: https://example.com/blogsmith
  description: The generator behind this site.
  tags: [rust]
"#;

fn sample_post(date: &str) -> String {
    format!(
        r#"---
title: Hello World
date: {}
tags: [meta]
categories: Notes
---

Welcome! This is your very first post.

<!-- more -->

## Writing

Create a post with `blogsmith new "My New Post"`, then preview it with
`blogsmith server`.

## Shortcodes

Embed a video with a shortcode:

{{{{< youtube dQw4w9WgXcQ >}}}}

Write `{{{{</* img src="cover.png" */>}}}}` to show a shortcode literally.
"#,
        date
    )
}

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    let config_path = target_dir.join("_config.yml");
    if config_path.exists() {
        anyhow::bail!("{:?} already contains a site", target_dir);
    }

    for dir in [
        "source/_posts",
        "source/_drafts",
        "source/_data",
        "source/about",
        "scaffolds",
        "themes",
    ] {
        let path = target_dir.join(dir);
        fs::create_dir_all(&path).with_context(|| format!("Failed to create {:?}", path))?;
    }

    let date = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let files = [
        ("_config.yml", CONFIG.to_string()),
        ("scaffolds/post.md", POST_SCAFFOLD.to_string()),
        ("scaffolds/page.md", PAGE_SCAFFOLD.to_string()),
        ("scaffolds/draft.md", DRAFT_SCAFFOLD.to_string()),
        ("source/_posts/hello-world.md", sample_post(&date)),
        ("source/about/index.md", ABOUT.to_string()),
        ("source/_data/projects.yml", PROJECTS.to_string()),
    ];
    for (relative, content) in files {
        let path = target_dir.join(relative);
        fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Site;
    use tempfile::TempDir;

    #[test]
    fn test_initialized_site_builds() {
        let tmp = TempDir::new().unwrap();
        init_site(tmp.path()).unwrap();

        let site = Site::new(tmp.path()).unwrap();
        let build = site.build().unwrap();
        assert_eq!(build.content.posts.len(), 1);
        assert_eq!(build.content.projects.len(), 1);
        assert!(build.output.contains("about/index.html"));
        assert!(build.output.contains("projects/index.html"));

        let post = &build.content.posts[0];
        assert!(post.content.contains("youtube-nocookie.com/embed/dQw4w9WgXcQ"));
        assert!(post.assets.is_empty());
    }

    #[test]
    fn test_refuses_existing_site() {
        let tmp = TempDir::new().unwrap();
        init_site(tmp.path()).unwrap();
        assert!(init_site(tmp.path()).is_err());
    }
}
