//! Build errors
//!
//! Content problems are collected rather than returned one at a time, so a
//! single build reports every malformed front-matter block, missing image and
//! broken link it finds.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single problem found while building the site
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{path}: malformed front-matter: {message}")]
    FrontMatter { path: PathBuf, message: String },

    #[error("{path}: invalid date {value:?}")]
    InvalidDate { path: PathBuf, value: String },

    #[error("{path}: shortcode `{name}`: {message}")]
    Shortcode {
        path: PathBuf,
        name: String,
        message: String,
    },

    #[error("{path}: missing asset `{reference}` (expected {expected})")]
    MissingAsset {
        path: PathBuf,
        reference: String,
        expected: String,
    },

    #[error("{page}: broken link to `{target}`")]
    BrokenLink { page: String, target: String },

    #[error("route `{route}` is produced by both {first} and {second}")]
    DuplicateRoute {
        route: String,
        first: String,
        second: String,
    },

    #[error("{path}: {message}")]
    Content { path: PathBuf, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Flatten a tera error chain into one message; tera's top-level
    /// message alone only names the template.
    pub fn template(err: tera::Error) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        BuildError::Template(message)
    }
}

/// Every problem found by one build
#[derive(Debug, Default)]
pub struct BuildErrors(Vec<BuildError>);

impl BuildErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: BuildError) {
        self.0.push(err);
    }

    pub fn extend(&mut self, other: BuildErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildError> {
        self.0.iter()
    }

    /// `Ok(value)` if nothing was collected, otherwise the collected errors
    pub fn into_result<T>(self, value: T) -> Result<T, BuildErrors> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl From<BuildError> for BuildErrors {
    fn from(err: BuildError) -> Self {
        Self(vec![err])
    }
}

impl fmt::Display for BuildErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.0.len() == 1 { "error" } else { "errors" };
        write!(f, "build failed with {} {}", self.0.len(), noun)?;
        for err in &self.0 {
            write!(f, "\n  - {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildErrors {}
