//! Shared types passed between the extraction and organization stages.
//!
//! Extractors produce [`BookMetadata`]; the organizer consumes it and reports
//! what it did through [`OrganizationResult`] and [`OrganizationSessionResult`].
//! The result types serialize to JSON so a session can be dumped for
//! inspection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Rendered name used when an author block carries no usable name part.
pub const UNKNOWN_AUTHOR: &str = "Unknown author";

/// One author block as found in the source file.
///
/// Every part is optional because real-world files omit freely. Blank parts
/// are treated the same as missing ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
}

impl Author {
    /// Split a free-form display name ("J. R. R. Tolkien") into parts.
    ///
    /// The last whitespace-separated token becomes the last name, the first
    /// one the first name, and everything in between the middle name, so
    /// rendering the result reproduces the input with single spaces.
    pub fn from_display_name(name: &str) -> Self {
        let tokens: Vec<&str> = name.split_whitespace().collect();
        match tokens.as_slice() {
            [] => Self::default(),
            [only] => Self {
                last_name: Some((*only).to_string()),
                ..Self::default()
            },
            [first, middle @ .., last] => Self {
                first_name: Some((*first).to_string()),
                middle_name: (!middle.is_empty()).then(|| middle.join(" ")),
                last_name: Some((*last).to_string()),
                nickname: None,
            },
        }
    }

    /// Render the author for display and folder naming.
    ///
    /// Precedence: `[first] [middle] last` when a last name exists, then the
    /// nickname, then the first name alone, then [`UNKNOWN_AUTHOR`]. Never
    /// returns an empty string.
    pub fn display_name(&self) -> String {
        if let Some(last) = non_blank(&self.last_name) {
            let parts: Vec<&str> = [non_blank(&self.first_name), non_blank(&self.middle_name)]
                .into_iter()
                .flatten()
                .chain(std::iter::once(last))
                .collect();
            return parts.join(" ");
        }
        non_blank(&self.nickname)
            .or_else(|| non_blank(&self.first_name))
            .unwrap_or(UNKNOWN_AUTHOR)
            .to_string()
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

fn non_blank(part: &Option<String>) -> Option<&str> {
    part.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Bibliographic metadata pulled out of one book file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: Option<String>,
    /// In document order. May be empty.
    pub authors: Vec<Author>,
    pub series_name: Option<String>,
    pub series_number: Option<u32>,
}

impl BookMetadata {
    /// Build metadata, enforcing the series invariant: a missing or blank
    /// series name voids the series number.
    pub fn new(
        title: Option<String>,
        authors: Vec<Author>,
        series_name: Option<String>,
        series_number: Option<u32>,
    ) -> Self {
        let series_name = series_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let series_number = series_name.as_ref().and(series_number);
        Self {
            title: title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            authors,
            series_name,
            series_number,
        }
    }

    /// Rendered author names, or a single [`UNKNOWN_AUTHOR`] entry when the
    /// book lists none. Never empty.
    pub fn author_names(&self) -> Vec<String> {
        if self.authors.is_empty() {
            vec![UNKNOWN_AUTHOR.to_string()]
        } else {
            self.authors.iter().map(Author::display_name).collect()
        }
    }
}

/// What happened to one successfully organized source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationResult {
    pub original_file_path: PathBuf,
    pub title: String,
    /// One copy per author folder, in author order.
    pub created_file_paths: Vec<PathBuf>,
}

/// Aggregate outcome of one organization run.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationSessionResult {
    pub organized_books: Vec<OrganizationResult>,
    pub unsupported_files_count: usize,
    /// Supported files the extractor could not read metadata from.
    pub unreadable_files_count: usize,
    /// Files skipped because copying or moving them failed.
    pub failed_files_count: usize,
    pub organized_root: PathBuf,
    pub not_organized_root: PathBuf,
    /// True when the run stopped early on request.
    pub cancelled: bool,
    pub summary: String,
}
