//! In-memory output set and the public directory writer

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::assets::{to_url_path, AssetIndex};
use crate::error::{BuildError, BuildErrors};

/// One generated file
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub bytes: Vec<u8>,
    /// What produced the file, for duplicate reports
    pub producer: String,
}

/// Every generated file, keyed by its path relative to the public directory
#[derive(Debug, Clone, Default)]
pub struct Output {
    files: BTreeMap<String, OutputFile>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; a path that is already taken is a duplicate route
    pub fn insert(
        &mut self,
        path: String,
        bytes: impl Into<Vec<u8>>,
        producer: impl Into<String>,
    ) -> Result<(), BuildError> {
        let producer = producer.into();
        if let Some(existing) = self.files.get(&path) {
            return Err(BuildError::DuplicateRoute {
                route: path,
                first: existing.producer.clone(),
                second: producer,
            });
        }
        self.files.insert(
            path,
            OutputFile {
                bytes: bytes.into(),
                producer,
            },
        );
        Ok(())
    }

    /// Add the page for a route such as `2024/01/15/hello/`
    pub fn insert_route(
        &mut self,
        route: &str,
        html: String,
        producer: impl Into<String>,
    ) -> Result<(), BuildError> {
        self.insert(route_file(route), html, producer)
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|f| f.bytes.as_slice())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn producer(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|f| f.producer.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.files.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &[u8])> {
        self.files.iter().map(|(k, f)| (k, f.bytes.as_slice()))
    }

    /// Generated HTML pages
    pub fn html_pages(&self) -> impl Iterator<Item = (&String, &[u8])> {
        self.iter().filter(|(path, _)| path.ends_with(".html"))
    }
}

/// File path of a route: directory routes get an `index.html`
pub fn route_file(route: &str) -> String {
    let route = route.trim_start_matches('/');
    if route.is_empty() || route.ends_with('/') {
        return format!("{}index.html", route);
    }
    let last = route.rsplit('/').next().unwrap_or(route);
    if last.contains('.') {
        route.to_string()
    } else {
        format!("{}/index.html", route)
    }
}

/// What a write changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub written: usize,
    pub unchanged: usize,
    pub removed: usize,
}

/// Write the output set and copy assets into `public_dir`.
///
/// Each file is written to a temporary sibling and renamed into place, files
/// whose bytes are unchanged are left alone, and files from a previous build
/// that are no longer produced are removed. Hidden entries at any level are
/// never touched.
pub fn write(
    public_dir: &Path,
    output: &Output,
    assets: &AssetIndex,
) -> Result<WriteStats, BuildErrors> {
    fs::create_dir_all(public_dir).map_err(|e| BuildError::io(public_dir, e))?;

    let mut stats = WriteStats::default();
    let mut errors = BuildErrors::new();

    for (path, bytes) in output.iter() {
        match write_if_changed(&public_dir.join(path), bytes) {
            Ok(true) => stats.written += 1,
            Ok(false) => stats.unchanged += 1,
            Err(e) => errors.push(e),
        }
    }

    for (target, source) in assets.iter() {
        if output.contains(target) {
            continue;
        }
        let result = fs::read(source)
            .map_err(|e| BuildError::io(source, e))
            .and_then(|bytes| write_if_changed(&public_dir.join(target), &bytes));
        match result {
            Ok(true) => stats.written += 1,
            Ok(false) => stats.unchanged += 1,
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        let keep: BTreeSet<&str> = output
            .paths()
            .map(String::as_str)
            .chain(assets.iter().map(|(target, _)| target.as_str()))
            .collect();
        match remove_stale(public_dir, &keep) {
            Ok(removed) => stats.removed = removed,
            Err(e) => errors.push(e),
        }
    }

    errors.into_result(stats)
}

/// Returns whether the file was written
fn write_if_changed(dest: &Path, bytes: &[u8]) -> Result<bool, BuildError> {
    if let Ok(existing) = fs::read(dest) {
        if existing == bytes {
            return Ok(false);
        }
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dest.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp, bytes).map_err(|e| BuildError::io(&tmp, e))?;
    fs::rename(&tmp, dest).map_err(|e| BuildError::io(dest, e))?;

    tracing::debug!("Wrote {:?}", dest);
    Ok(true)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn remove_stale(public_dir: &Path, keep: &BTreeSet<&str>) -> Result<usize, BuildError> {
    let mut removed = 0;
    let mut dirs = Vec::new();

    for entry in WalkDir::new(public_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|e| BuildError::Content {
            path: public_dir.to_path_buf(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(public_dir) else {
            continue;
        };
        if entry.file_type().is_dir() {
            if entry.depth() > 0 {
                dirs.push(path.to_path_buf());
            }
            continue;
        }
        if !keep.contains(to_url_path(relative).as_str()) {
            fs::remove_file(path).map_err(|e| BuildError::io(path, e))?;
            tracing::debug!("Removed stale {:?}", path);
            removed += 1;
        }
    }

    // Deepest first, so emptied parents go too
    for dir in dirs.iter().rev() {
        let empty = fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if empty {
            fs::remove_dir(dir).map_err(|e| BuildError::io(dir, e))?;
        }
    }

    Ok(removed)
}
