//! Destination path construction with collision avoidance.
//!
//! [`PathBuilder`] turns canonical names into `root/Author/Series/NN. Title.ext`
//! and hands the result to [`UniquePathResolver`], which is the only place in
//! the crate that decides what to do when a file already exists.
//!
//! ## Collision policy
//!
//! When `x.ext` exists the resolver probes `x (1).ext`, `x (2).ext`, … up to
//! `max_attempts` and returns the first free candidate. If every candidate is
//! taken it fails with [`PathError::Exhausted`] rather than handing back a
//! path that is known to collide.
//!
//! The check happens before the caller writes, so two processes organizing
//! into the same root at the same time can still race. One writer per target
//! root is assumed.

use crate::naming::{self, NO_SERIES, UNTITLED};
use crate::types::UNKNOWN_AUTHOR;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default number of numbered candidates probed before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No free file name for {path} after {attempts} attempts")]
    Exhausted { path: PathBuf, attempts: u32 },
}

/// Finds a non-existing variant of a desired file path.
#[derive(Debug, Clone, Copy)]
pub struct UniquePathResolver {
    max_attempts: u32,
}

impl Default for UniquePathResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl UniquePathResolver {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Resolve `desired`, splitting it at its last extension.
    ///
    /// `notes.txt` → `notes (1).txt`; `README` → `README (1)`.
    pub fn resolve(&self, desired: &Path) -> Result<PathBuf, PathError> {
        if !desired.exists() {
            return Ok(desired.to_path_buf());
        }
        let dir = desired.parent().unwrap_or_else(|| Path::new(""));
        let stem = desired
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = desired
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        self.probe(desired, dir, &stem, &extension)
    }

    /// Resolve `dir/stem + extension` with an explicit split point.
    ///
    /// Used for compound extensions such as `.fb2.zip`, where the numbered
    /// suffix must go before the whole extension.
    pub fn resolve_parts(
        &self,
        dir: &Path,
        stem: &str,
        extension: &str,
    ) -> Result<PathBuf, PathError> {
        let desired = dir.join(format!("{stem}{extension}"));
        if !desired.exists() {
            return Ok(desired);
        }
        self.probe(&desired, dir, stem, extension)
    }

    fn probe(
        &self,
        desired: &Path,
        dir: &Path,
        stem: &str,
        extension: &str,
    ) -> Result<PathBuf, PathError> {
        (1..=self.max_attempts)
            .map(|i| dir.join(format!("{stem} ({i}){extension}")))
            .find(|candidate| !candidate.exists())
            .ok_or_else(|| PathError::Exhausted {
                path: desired.to_path_buf(),
                attempts: self.max_attempts,
            })
    }
}

/// Builds collision-free destination paths for organized books.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathBuilder {
    resolver: UniquePathResolver,
}

impl PathBuilder {
    pub fn new(resolver: UniquePathResolver) -> Self {
        Self { resolver }
    }

    /// Compose and reserve a destination for one copy of a book.
    ///
    /// Author, series and title are sanitized independently. A missing or
    /// blank series files the book under [`NO_SERIES`] and drops the series
    /// number. The series directory is created on every call; the extension
    /// is kept as given.
    pub fn build(
        &self,
        target_root: &Path,
        author: &str,
        series: Option<&str>,
        series_number: Option<u32>,
        title: &str,
        extension: &str,
    ) -> Result<PathBuf, PathError> {
        let safe_author = naming::sanitize(author, UNKNOWN_AUTHOR);
        let (safe_series, series_number) = match series.filter(|s| !s.trim().is_empty()) {
            Some(s) => (naming::sanitize(s, NO_SERIES), series_number),
            None => (NO_SERIES.to_string(), None),
        };
        let safe_title = naming::sanitize(title, UNTITLED);

        let series_dir = target_root.join(safe_author).join(safe_series);
        fs::create_dir_all(&series_dir)?;

        let stem = naming::book_file_name(series_number, &safe_title, "");
        self.resolver.resolve_parts(&series_dir, &stem, extension)
    }
}
