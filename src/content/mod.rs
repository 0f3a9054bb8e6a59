//! Content module - posts, pages, projects and the Markdown pipeline

mod frontmatter;
pub mod loader;
mod markdown;
mod post;
mod projects;
pub mod shortcode;

pub use frontmatter::{parse_date_string, FrontMatter, FrontMatterError};
pub use loader::{Content, ContentLoader};
pub use markdown::{Heading, MarkdownRenderer, Rendered};
pub use post::{term_slug, Page, Post, Term};
pub use projects::{load_projects, Project, PROJECTS_FILE};
