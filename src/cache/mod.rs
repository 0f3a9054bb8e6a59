//! Build cache
//!
//! Remembers a fingerprint of everything a build reads. When the
//! fingerprint is unchanged and the public directory still exists,
//! `generate` has nothing to do.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::Site;

/// Cache directory, relative to the site base directory
pub const CACHE_DIR: &str = ".blogsmith-cache";
const CACHE_FILE: &str = "db.json";

/// Hashes of each input of a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub config: u64,
    pub theme: u64,
    pub source: u64,
    pub drafts: bool,
}

impl Fingerprint {
    /// Fingerprint the site as it is on disk now
    pub fn compute(site: &Site) -> Result<Self> {
        let config_path = site.base_dir.join("_config.yml");
        let config = if config_path.is_file() {
            hash_file(&config_path)?
        } else {
            0
        };

        let theme = if site.has_theme() {
            hash_directory(&site.theme_dir)?
        } else {
            0
        };

        Ok(Self {
            config,
            theme,
            source: hash_directory(&site.source_dir)?,
            drafts: site.include_drafts(),
        })
    }
}

/// Cache database stored in `.blogsmith-cache/db.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheDb {
    /// Version of the binary that wrote the cache
    pub version: String,
    pub fingerprint: Fingerprint,
    /// Files written by the last build
    pub files: usize,
    /// When the earliest held back future post goes live
    #[serde(default)]
    pub scheduled: Option<DateTime<FixedOffset>>,
}

impl CacheDb {
    /// Load cache from disk; a missing, unreadable or outdated cache is empty
    pub fn load(base_dir: &Path) -> Self {
        let path = cache_path(base_dir);
        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str::<CacheDb>(&content) {
            Ok(cache) if cache.version == env!("CARGO_PKG_VERSION") => cache,
            Ok(_) => {
                tracing::info!("Cache written by another version, ignoring it");
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn new(
        fingerprint: Fingerprint,
        files: usize,
        scheduled: Option<DateTime<FixedOffset>>,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            fingerprint,
            files,
            scheduled,
        }
    }

    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let dir = base_dir.join(CACHE_DIR);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        let path = cache_path(base_dir);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    /// Whether a build with `fingerprint` at `now` would reproduce the
    /// current output. A scheduled post that has gone live makes it stale.
    pub fn is_fresh(&self, fingerprint: &Fingerprint, public_dir: &Path, now: DateTime<Utc>) -> bool {
        let published_since = self.scheduled.is_some_and(|at| at <= now);
        !self.version.is_empty()
            && self.fingerprint == *fingerprint
            && !published_since
            && public_dir.is_dir()
    }
}

pub fn cache_path(base_dir: &Path) -> PathBuf {
    base_dir.join(CACHE_DIR).join(CACHE_FILE)
}

pub fn hash_file(path: &Path) -> Result<u64> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    Ok(hasher.finish())
}

/// Hash every file under `dir` with its relative path and modification
/// time, in sorted order. Posts without a date take it from the mtime.
/// A missing directory hashes like an empty one.
pub fn hash_directory(dir: &Path) -> Result<u64> {
    let mut hasher = DefaultHasher::new();
    if !dir.is_dir() {
        return Ok(hasher.finish());
    }

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", dir))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        relative.to_string_lossy().hash(&mut hasher);
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok());
        modified.hash(&mut hasher);
        let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        bytes.hash(&mut hasher);
    }

    Ok(hasher.finish())
}
