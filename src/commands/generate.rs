//! Generate static files

use anyhow::{Context, Result};
use chrono::Utc;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use crate::cache::{CacheDb, Fingerprint, CACHE_DIR};
use crate::generator::{self, WriteStats};
use crate::Site;

/// Quiet period before a burst of file events triggers a rebuild
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Build the site and write the public directory. Unless `force` is set,
/// nothing happens when no input changed since the last run.
pub fn run(site: &Site, force: bool) -> Result<Option<WriteStats>> {
    let start = Instant::now();

    let fingerprint = Fingerprint::compute(site)?;
    let cache = CacheDb::load(&site.base_dir);
    if !force && cache.is_fresh(&fingerprint, &site.public_dir, Utc::now()) {
        tracing::info!("No changes detected, skipping generation");
        return Ok(None);
    }

    let build = site.build()?;
    let stats = generator::write(&site.public_dir, &build.output, &build.assets)?;

    CacheDb::new(fingerprint, stats.written + stats.unchanged, build.content.next_scheduled)
        .save(&site.base_dir)
        .context("Failed to save the build cache")?;

    tracing::info!(
        "Generated {} posts and {} pages in {:.2}s ({} written, {} unchanged, {} removed)",
        build.content.posts.len(),
        build.content.pages.len(),
        start.elapsed().as_secs_f64(),
        stats.written,
        stats.unchanged,
        stats.removed
    );
    Ok(Some(stats))
}

/// Everything a rebuild depends on
pub fn watch_targets(site: &Site) -> Vec<(PathBuf, RecursiveMode)> {
    let mut targets = Vec::new();
    if site.source_dir.is_dir() {
        targets.push((site.source_dir.clone(), RecursiveMode::Recursive));
    }
    if site.has_theme() {
        targets.push((site.theme_dir.clone(), RecursiveMode::Recursive));
    }
    let config = site.base_dir.join("_config.yml");
    if config.is_file() {
        targets.push((config, RecursiveMode::NonRecursive));
    }
    targets
}

/// Editor droppings, VCS metadata and our own files do not trigger rebuilds
pub fn is_relevant(site: &Site, path: &Path) -> bool {
    if path.starts_with(&site.public_dir) || path.starts_with(site.base_dir.join(CACHE_DIR)) {
        return false;
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let in_git = path.components().any(|c| c.as_os_str() == ".git");
    !in_git
        && name != ".DS_Store"
        && !name.ends_with('~')
        && !name.ends_with(".swp")
        && !(name.starts_with(".#") || (name.starts_with('.') && name.ends_with(".tmp")))
}

/// Block on file events, calling `on_change` with the reloaded site after
/// each debounced burst of relevant changes
pub fn watch_blocking(site: &Site, mut on_change: impl FnMut(&Site)) -> Result<()> {
    let (tx, rx) = channel();
    let mut debouncer = new_debouncer(DEBOUNCE, tx)?;

    for (path, mode) in watch_targets(site) {
        debouncer
            .watcher()
            .watch(&path, mode)
            .with_context(|| format!("Failed to watch {:?}", path))?;
        tracing::debug!("Watching: {:?}", path);
    }

    for result in rx {
        let events: Vec<DebouncedEvent> = match result {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Watch error: {:?}", e);
                continue;
            }
        };
        let changed: Vec<&DebouncedEvent> = events
            .iter()
            .filter(|e| is_relevant(site, &e.path))
            .collect();
        if changed.is_empty() {
            continue;
        }
        for event in &changed {
            tracing::info!("Changed: {}", event.path.display());
        }

        match site.reload() {
            Ok(reloaded) => on_change(&reloaded),
            Err(e) => tracing::error!("Failed to reload configuration: {:#}", e),
        }
    }

    Ok(())
}

/// Regenerate on every change until interrupted. A failed rebuild is
/// logged and leaves the previous output in place.
pub async fn watch(site: &Site) -> Result<()> {
    tracing::info!("Watching for changes. Press Ctrl+C to stop.");
    let site = site.clone();
    tokio::task::spawn_blocking(move || {
        watch_blocking(&site, |site| {
            if let Err(e) = run(site, false) {
                tracing::error!("Generation failed: {:#}", e);
            }
        })
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use chrono::Datelike;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_run_skips_unchanged_site() {
        let tmp = TempDir::new().unwrap();
        let site = Site::new(tmp.path()).unwrap();
        fs::create_dir_all(site.source_dir.join("_posts")).unwrap();
        fs::write(
            site.source_dir.join("_posts/hello.md"),
            "---\ntitle: Hello\ndate: 2024-01-15\n---\nHi\n",
        )
        .unwrap();

        let first = run(&site, false).unwrap().unwrap();
        assert!(first.written > 0);
        assert!(site.public_dir.join("2024/01/15/hello/index.html").is_file());

        assert!(run(&site, false).unwrap().is_none());

        let forced = run(&site, true).unwrap().unwrap();
        assert_eq!(forced.written, 0);
        assert_eq!(forced.unchanged, first.written);
    }

    #[test]
    fn test_failed_build_keeps_previous_output() {
        let tmp = TempDir::new().unwrap();
        let site = Site::new(tmp.path()).unwrap();
        fs::create_dir_all(site.source_dir.join("_posts")).unwrap();
        fs::write(site.source_dir.join("_posts/a.md"), "---\ntitle: A\ndate: 2024-01-01\n---\n").unwrap();
        run(&site, false).unwrap();

        fs::write(
            site.source_dir.join("_posts/a.md"),
            "---\ntitle: A\ndate: 2024-01-01\n---\n{{< img src=\"/missing.png\" >}}\n",
        )
        .unwrap();
        assert!(run(&site, false).is_err());
        assert!(site.public_dir.join("2024/01/01/a/index.html").is_file());
    }

    #[test]
    fn test_scheduled_post_triggers_rebuild_once_live() {
        let tmp = TempDir::new().unwrap();
        let config = SiteConfig {
            future: false,
            ..Default::default()
        };
        let site = Site::with_config(tmp.path().to_path_buf(), config);
        fs::create_dir_all(site.source_dir.join("_posts")).unwrap();
        fs::write(site.source_dir.join("_posts/now.md"), "---\ntitle: Now\ndate: 2024-01-01\n---\n").unwrap();
        fs::write(site.source_dir.join("_posts/later.md"), "---\ntitle: Later\ndate: 2999-01-01\n---\n").unwrap();

        run(&site, false).unwrap().unwrap();
        let cache = CacheDb::load(&site.base_dir);
        assert_eq!(cache.scheduled.map(|d| d.year()), Some(2999));
        assert!(run(&site, false).unwrap().is_none());

        // The post's date has passed since the last build
        let past = chrono::DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z").unwrap();
        CacheDb::new(cache.fingerprint, cache.files, Some(past))
            .save(&site.base_dir)
            .unwrap();
        assert!(run(&site, false).unwrap().is_some());
    }

    #[test]
    fn test_is_relevant() {
        let tmp = TempDir::new().unwrap();
        let site = Site::new(tmp.path()).unwrap();
        assert!(is_relevant(&site, &site.source_dir.join("_posts/a.md")));
        assert!(!is_relevant(&site, &site.source_dir.join("_posts/.a.md.swp")));
        assert!(!is_relevant(&site, &site.source_dir.join("_posts/a.md~")));
        assert!(!is_relevant(&site, &site.public_dir.join("index.html")));
        assert!(!is_relevant(&site, &site.source_dir.join(".git/HEAD")));
    }
}
