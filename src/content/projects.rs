//! Project gallery entries from `_data/projects.yml`

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::frontmatter::string_or_vec;
use super::shortcode::ShortcodeContext;
use crate::assets::AssetRef;
use crate::error::{BuildError, BuildErrors};

/// Location of the project list inside the source directory
pub const PROJECTS_FILE: &str = "_data/projects.yml";

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    title: Option<String>,
    link: Option<String>,
    #[serde(default)]
    description: String,
    image: Option<String>,
    #[serde(default, deserialize_with = "string_or_vec")]
    tags: Vec<String>,
}

/// A personal project shown on the projects page
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub title: String,
    /// External link to the project
    pub link: String,
    pub description: String,
    /// Image URL
    pub image: Option<String>,
    pub tags: Vec<String>,

    #[serde(skip)]
    pub source: PathBuf,
    #[serde(skip)]
    pub assets: Vec<AssetRef>,
}

/// Load the project list. A missing file means no projects.
pub fn load_projects(source_dir: &Path, root: &str) -> Result<Vec<Project>, BuildErrors> {
    let path = source_dir.join(PROJECTS_FILE);
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
    parse_projects(&content, &path, root)
}

fn parse_projects(content: &str, path: &Path, root: &str) -> Result<Vec<Project>, BuildErrors> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let entries: Vec<ProjectEntry> =
        serde_yaml::from_str(content).map_err(|e| BuildError::Content {
            path: path.to_path_buf(),
            message: format!("invalid project list: {}", e),
        })?;

    let mut errors = BuildErrors::new();
    let mut projects = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let title = entry.title.filter(|t| !t.trim().is_empty());
        let link = entry.link.filter(|l| !l.trim().is_empty());
        let (Some(title), Some(link)) = (title, link) else {
            errors.push(BuildError::Content {
                path: path.to_path_buf(),
                message: format!("project #{} needs both `title` and `link`", index + 1),
            });
            continue;
        };

        let mut refs = ShortcodeContext::new(root, "", false);
        let image = entry
            .image
            .filter(|i| !i.trim().is_empty())
            .map(|i| refs.asset(&i, "image"));

        projects.push(Project {
            title,
            link: link.trim().to_string(),
            description: entry.description.trim().to_string(),
            image,
            tags: entry.tags,
            source: path.to_path_buf(),
            assets: refs.into_assets(),
        });
    }

    errors.into_result(projects)
}
