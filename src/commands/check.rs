//! Check the site without writing anything

use anyhow::Result;

use crate::Site;

/// Run the full build in memory. Every problem found is logged, and the
/// command fails when there is any.
pub fn run(site: &Site) -> Result<()> {
    match site.build() {
        Ok(build) => {
            println!(
                "{} posts, {} pages, {} projects: {} files and {} assets, no problems found",
                build.content.posts.len(),
                build.content.pages.len(),
                build.content.projects.len(),
                build.output.len(),
                build.assets.len()
            );
            Ok(())
        }
        Err(errors) => {
            for error in errors.iter() {
                tracing::error!("{}", error);
            }
            anyhow::bail!(
                "{} problem{} found",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            )
        }
    }
}
