//! The organization run: enumerate, partition, extract, copy, move.
//!
//! ```text
//! root/
//! ├── a.fb2                 ─┐ supported: metadata → canonical names →
//! ├── b.epub                ─┘ one copy per author
//! ├── notes.txt             ── unsupported: moved, relative path kept
//! ├── shelfwise.toml        ── never an input
//! ├── organized_books/      ── output, skipped during enumeration
//! │   └── <Author>/<Series | No series>/[NN. ]<Title><ext>
//! └── not_organized/        ── output, skipped during enumeration
//!     └── notes.txt
//! ```
//!
//! Files are processed one at a time in file-name order, supported files
//! first. Every per-file failure (unreadable metadata, failed copy or move,
//! exhausted destination names) is logged, counted and skipped. Only a root
//! that cannot be enumerated fails the run.
//!
//! Progress is reported as [`OrganizeEvent`]s over an optional channel, and a
//! shared flag lets another thread stop the run between files.

use crate::config::{CONFIG_FILE, LayoutConfig};
use crate::extract::{Extraction, ExtractorRegistry};
use crate::known_names::contains_ignore_case;
use crate::naming::UNTITLED;
use crate::normalizer::NameNormalizer;
use crate::paths::{PathBuilder, PathError, UniquePathResolver};
use crate::types::{BookMetadata, OrganizationResult, OrganizationSessionResult, UNKNOWN_AUTHOR};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum OrganizeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Root folder not found: {0}")]
    RootNotFound(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Progress notifications sent while a run is in flight.
#[derive(Debug, Clone)]
pub enum OrganizeEvent {
    Started {
        supported: usize,
        unsupported: usize,
    },
    BookOrganized {
        /// 1-based position among supported files.
        index: usize,
        source: PathBuf,
        title: String,
        destinations: Vec<PathBuf>,
    },
    Unreadable {
        source: PathBuf,
    },
    Moved {
        source: PathBuf,
        destination: PathBuf,
    },
    Failed {
        source: PathBuf,
        reason: String,
    },
    Cancelled,
}

/// A file some extractor accepts, with the suffix it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedFile {
    pub path: PathBuf,
    /// Original-case matched extension, e.g. `.FB2.zip`.
    pub extension: String,
}

/// Enumerated and partitioned input, before anything is touched.
#[derive(Debug, Clone)]
pub struct Survey {
    pub root: PathBuf,
    pub supported: Vec<SupportedFile>,
    pub unsupported: Vec<PathBuf>,
}

impl Survey {
    /// Supported files per lowercased extension.
    pub fn formats(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for file in &self.supported {
            *counts.entry(file.extension.to_ascii_lowercase()).or_insert(0) += 1;
        }
        counts
    }
}

/// Enumerate `root` and partition its files by extractor support.
///
/// Regular files only; symlinks are not followed. The two output
/// directories and `shelfwise.toml` directly under `root` are skipped. An
/// unreadable entry below the root is logged and skipped.
pub fn survey(
    registry: &ExtractorRegistry,
    layout: &LayoutConfig,
    root: &Path,
    recursive: bool,
) -> Result<Survey, OrganizeError> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(OrganizeError::NotADirectory(root.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(OrganizeError::RootNotFound(root.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    }
    fs::read_dir(root)?;

    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }
    let skip_dirs = [layout.organized_dir.as_str(), layout.not_organized_dir.as_str()];

    let mut supported = Vec::new();
    let mut unsupported = Vec::new();
    let entries = walker.into_iter().filter_entry(|e| {
        !(e.depth() == 1 && e.file_type().is_dir() && skip_dirs.iter().any(|d| e.file_name() == *d))
    });
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() || (entry.depth() == 1 && entry.file_name() == CONFIG_FILE) {
            continue;
        }
        let path = entry.into_path();
        match registry.extension_of(&path) {
            Some(extension) => supported.push(SupportedFile { path, extension }),
            None => unsupported.push(path),
        }
    }

    Ok(Survey {
        root: root.to_path_buf(),
        supported,
        unsupported,
    })
}

/// Human-readable session summary. Extra counts appear only when non-zero.
pub fn summary_line(
    organized: usize,
    unsupported: usize,
    unreadable: usize,
    failed: usize,
    cancelled: bool,
) -> String {
    let mut summary = format!("Organized: {organized}, unsupported: {unsupported}");
    if unreadable > 0 {
        summary.push_str(&format!(", unreadable: {unreadable}"));
    }
    if failed > 0 {
        summary.push_str(&format!(", failed: {failed}"));
    }
    if cancelled {
        summary.push_str(" (cancelled)");
    }
    summary
}

/// Runs organization sessions over a library root.
pub struct Organizer {
    registry: ExtractorRegistry,
    normalizer: NameNormalizer,
    layout: LayoutConfig,
    resolver: UniquePathResolver,
    builder: PathBuilder,
    events: Option<Sender<OrganizeEvent>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Organizer {
    pub fn new(registry: ExtractorRegistry, normalizer: NameNormalizer, layout: LayoutConfig) -> Self {
        let resolver = UniquePathResolver::new(layout.max_unique_attempts);
        Self {
            registry,
            normalizer,
            layout,
            resolver,
            builder: PathBuilder::new(resolver),
            events: None,
            cancel: None,
        }
    }

    /// Send progress events to `tx`. A dropped receiver is ignored.
    pub fn with_events(mut self, tx: Sender<OrganizeEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Stop before the next file once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn survey(&self, root: &Path, recursive: bool) -> Result<Survey, OrganizeError> {
        survey(&self.registry, &self.layout, root, recursive)
    }

    /// Organize every file under `root`.
    pub fn organize(
        &mut self,
        root: &Path,
        recursive: bool,
    ) -> Result<OrganizationSessionResult, OrganizeError> {
        let survey = self.survey(root, recursive)?;
        let organized_root = root.join(&self.layout.organized_dir);
        let not_organized_root = root.join(&self.layout.not_organized_dir);
        info!(
            "Found {} supported and {} unsupported files in {}",
            survey.supported.len(),
            survey.unsupported.len(),
            root.display()
        );
        self.emit(OrganizeEvent::Started {
            supported: survey.supported.len(),
            unsupported: survey.unsupported.len(),
        });

        let mut organized_books = Vec::new();
        let mut unreadable = 0;
        let mut failed = 0;
        let mut cancelled = false;

        for (i, file) in survey.supported.iter().enumerate() {
            if self.is_cancelled() {
                cancelled = true;
                break;
            }
            let metadata = match self.registry.extract(&file.path) {
                Extraction::Metadata(metadata) => metadata,
                Extraction::Unreadable | Extraction::Unsupported => {
                    debug!(path = %file.path.display(), "no metadata, skipped");
                    unreadable += 1;
                    self.emit(OrganizeEvent::Unreadable {
                        source: file.path.clone(),
                    });
                    continue;
                }
            };
            match self.organize_book(file, &metadata, &organized_root) {
                Ok(result) => {
                    self.emit(OrganizeEvent::BookOrganized {
                        index: i + 1,
                        source: result.original_file_path.clone(),
                        title: result.title.clone(),
                        destinations: result.created_file_paths.clone(),
                    });
                    organized_books.push(result);
                }
                Err(e) => {
                    warn!("Failed to organize {}: {e}", file.path.display());
                    failed += 1;
                    self.emit(OrganizeEvent::Failed {
                        source: file.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !cancelled {
            for path in &survey.unsupported {
                if self.is_cancelled() {
                    cancelled = true;
                    break;
                }
                match self.move_unsupported(root, path, &not_organized_root) {
                    Ok(destination) => self.emit(OrganizeEvent::Moved {
                        source: path.clone(),
                        destination,
                    }),
                    Err(e) => {
                        warn!("Failed to move {}: {e}", path.display());
                        failed += 1;
                        self.emit(OrganizeEvent::Failed {
                            source: path.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
        if cancelled {
            info!("Organization cancelled");
            self.emit(OrganizeEvent::Cancelled);
        }

        let summary = summary_line(
            organized_books.len(),
            survey.unsupported.len(),
            unreadable,
            failed,
            cancelled,
        );
        info!("{summary}");

        Ok(OrganizationSessionResult {
            organized_books,
            unsupported_files_count: survey.unsupported.len(),
            unreadable_files_count: unreadable,
            failed_files_count: failed,
            organized_root,
            not_organized_root,
            cancelled,
            summary,
        })
    }

    /// Copy one book into every canonical author's folder.
    ///
    /// Succeeds when at least one copy was made; failed copies beside a
    /// successful one are logged.
    fn organize_book(
        &mut self,
        file: &SupportedFile,
        metadata: &BookMetadata,
        organized_root: &Path,
    ) -> Result<OrganizationResult, OrganizeError> {
        let title = metadata
            .title
            .clone()
            .unwrap_or_else(|| UNTITLED.to_string());
        let series = metadata
            .series_name
            .as_deref()
            .map(|s| self.normalizer.normalize_series(s))
            .filter(|s| !s.is_empty());
        let series_number = series.as_ref().and(metadata.series_number);

        let mut authors: Vec<String> = Vec::new();
        for raw in metadata.author_names() {
            let canonical = if raw == UNKNOWN_AUTHOR {
                raw
            } else {
                self.normalizer.normalize_author(&raw)
            };
            if !contains_ignore_case(&authors, &canonical) {
                authors.push(canonical);
            }
        }

        let mut created = Vec::new();
        let mut last_error = None;
        for author in &authors {
            match self.copy_for_author(file, author, series.as_deref(), series_number, &title, organized_root) {
                Ok(destination) => {
                    debug!(source = %file.path.display(), destination = %destination.display(), "copied");
                    created.push(destination);
                }
                Err(e) => {
                    warn!("Failed to copy {} for {author}: {e}", file.path.display());
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if created.is_empty() => Err(e),
            _ => Ok(OrganizationResult {
                original_file_path: file.path.clone(),
                title,
                created_file_paths: created,
            }),
        }
    }

    fn copy_for_author(
        &self,
        file: &SupportedFile,
        author: &str,
        series: Option<&str>,
        series_number: Option<u32>,
        title: &str,
        organized_root: &Path,
    ) -> Result<PathBuf, OrganizeError> {
        let destination = self.builder.build(
            organized_root,
            author,
            series,
            series_number,
            title,
            &file.extension,
        )?;
        fs::copy(&file.path, &destination)?;
        Ok(destination)
    }

    /// Move an unsupported file to the same relative path under the
    /// not-organized root, renaming on collision.
    fn move_unsupported(
        &self,
        root: &Path,
        path: &Path,
        not_organized_root: &Path,
    ) -> Result<PathBuf, OrganizeError> {
        let relative = path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));
        let target_dir = match relative.parent() {
            Some(parent) => not_organized_root.join(parent),
            None => not_organized_root.to_path_buf(),
        };
        fs::create_dir_all(&target_dir)?;

        let file_name = relative.file_name().unwrap_or_default();
        let destination = self.resolver.resolve(&target_dir.join(file_name))?;
        move_file(path, &destination)?;
        debug!(source = %path.display(), destination = %destination.display(), "moved");
        Ok(destination)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn emit(&self, event: OrganizeEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Rename, falling back to copy and delete across filesystems.
///
/// On failure the destination does not exist and the source is untouched.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if needs_copy_fallback(&e) => {
            let copied = fs::copy(from, to).and_then(|_| fs::remove_file(from));
            if copied.is_err() && from.exists() {
                let _ = fs::remove_file(to);
            }
            copied
        }
        other => other,
    }
}

fn needs_copy_fallback(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::CrossesDevices
}
