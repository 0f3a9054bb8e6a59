//! Clean the public directory

use anyhow::{Context, Result};
use std::fs;

use crate::cache::CACHE_DIR;
use crate::Site;

/// Remove the public directory and the build cache
pub fn run(site: &Site) -> Result<()> {
    for dir in [site.public_dir.clone(), site.base_dir.join(CACHE_DIR)] {
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("Failed to delete {:?}", dir))?;
            tracing::info!("Deleted: {:?}", dir);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_output_and_cache() {
        let tmp = TempDir::new().unwrap();
        let site = Site::new(tmp.path()).unwrap();
        fs::create_dir_all(site.public_dir.join("css")).unwrap();
        fs::create_dir_all(tmp.path().join(CACHE_DIR)).unwrap();
        fs::create_dir_all(&site.source_dir).unwrap();

        run(&site).unwrap();
        assert!(!site.public_dir.exists());
        assert!(!tmp.path().join(CACHE_DIR).exists());
        assert!(site.source_dir.exists());
        run(&site).unwrap();
    }
}
