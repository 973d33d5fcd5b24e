//! Format-specific metadata extraction.
//!
//! | Format | Extensions | Extractor |
//! |---|---|---|
//! | FictionBook 2 | `.fb2`, `.fb2.zip` | [`Fb2Extractor`] |
//! | EPUB 2/3 | `.epub` | [`EpubExtractor`] |
//!
//! Every extractor implements [`MetadataExtractor`]: a cheap, name-only
//! [`can_handle`](MetadataExtractor::can_handle) test and a
//! [`read_metadata`](MetadataExtractor::read_metadata) that opens the file.
//! A file that is corrupt, truncated or missing the format's minimum markup
//! is an ordinary "no metadata" outcome: [`extract`](MetadataExtractor::extract)
//! logs the reason at debug level and returns `None`.
//!
//! The [`ExtractorRegistry`] tries extractors in registration order and uses
//! the first one that accepts the file name. Order matters only when two
//! extractors claim the same extension; the default registry has no overlap.

mod epub;
mod fb2;
mod xml;

pub use epub::EpubExtractor;
pub use fb2::Fb2Extractor;

use crate::types::BookMetadata;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Archive has no {0} entry")]
    MissingEntry(String),
    #[error("Not a {0} document")]
    MissingMarkup(&'static str),
}

/// A format-specific metadata reader.
pub trait MetadataExtractor: Send + Sync {
    /// Short format label used in logs and reports.
    fn format_name(&self) -> &'static str;

    /// Lowercase extensions with leading dot, longest first.
    fn extensions(&self) -> &'static [&'static str];

    /// Open and parse the file.
    fn read_metadata(&self, path: &Path) -> Result<BookMetadata, ExtractError>;

    /// Name-only applicability test. Never touches the filesystem.
    fn can_handle(&self, path: &Path) -> bool {
        matched_extension(path, self.extensions()).is_some()
    }

    /// Parse the file, mapping any failure to `None`.
    fn extract(&self, path: &Path) -> Option<BookMetadata> {
        match self.read_metadata(path) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                debug!(path = %path.display(), format = self.format_name(), "no metadata: {e}");
                None
            }
        }
    }
}

/// Return the suffix of `path`'s file name matching one of `extensions`,
/// in the file's original case.
///
/// `extensions` are compared ASCII case-insensitively in the order given, so
/// list compound extensions before their tails. A file name consisting only
/// of the extension does not match.
pub fn matched_extension(path: &Path, extensions: &[&str]) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    extensions.iter().find_map(|ext| {
        let start = name.len().checked_sub(ext.len())?;
        (start > 0 && name.is_char_boundary(start) && name[start..].eq_ignore_ascii_case(ext))
            .then(|| name[start..].to_string())
    })
}

/// Outcome of dispatching one file through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Metadata(BookMetadata),
    /// An extractor accepted the name but could not read metadata.
    Unreadable,
    /// No registered extractor accepts the file name.
    Unsupported,
}

/// Ordered set of extractors.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn MetadataExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Registry with every built-in format: FB2 first, then EPUB.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Fb2Extractor);
        registry.register(EpubExtractor);
        registry
    }

    /// Append an extractor. Earlier registrations win ties.
    pub fn register<E: MetadataExtractor + 'static>(&mut self, extractor: E) {
        self.extractors.push(Box::new(extractor));
    }

    /// First extractor whose `can_handle` accepts `path`.
    pub fn find(&self, path: &Path) -> Option<&dyn MetadataExtractor> {
        self.extractors
            .iter()
            .find(|e| e.can_handle(path))
            .map(|e| e.as_ref())
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.find(path).is_some()
    }

    /// The extension the dispatching extractor matched, in original case.
    ///
    /// `Book.FB2.zip` → `.FB2.zip`; `None` for unsupported files.
    pub fn extension_of(&self, path: &Path) -> Option<String> {
        self.find(path)
            .and_then(|e| matched_extension(path, e.extensions()))
    }

    /// Union of all registered extensions, in registration order, without
    /// duplicates.
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        let mut all: Vec<&'static str> = Vec::new();
        for ext in self.extractors.iter().flat_map(|e| e.extensions()) {
            if !all.contains(ext) {
                all.push(ext);
            }
        }
        all
    }

    pub fn extract(&self, path: &Path) -> Extraction {
        match self.find(path) {
            None => Extraction::Unsupported,
            Some(extractor) => match extractor.extract(path) {
                Some(metadata) => Extraction::Metadata(metadata),
                None => Extraction::Unreadable,
            },
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{Fb2Book, write_fb2};
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Claims `.fb2` but always fails, to observe dispatch order.
    struct Greedy;

    impl MetadataExtractor for Greedy {
        fn format_name(&self) -> &'static str {
            "greedy"
        }
        fn extensions(&self) -> &'static [&'static str] {
            &[".fb2", ".txt"]
        }
        fn read_metadata(&self, _path: &Path) -> Result<BookMetadata, ExtractError> {
            Err(ExtractError::MissingMarkup("greedy"))
        }
    }

    // =========================================================================
    // matched_extension()
    // =========================================================================

    #[test]
    fn matches_case_insensitively_and_keeps_case() {
        let m = matched_extension(Path::new("/b/Book.FB2.Zip"), &[".fb2.zip", ".fb2"]);
        assert_eq!(m.as_deref(), Some(".FB2.Zip"));
    }

    #[test]
    fn compound_extension_listed_first_wins() {
        let m = matched_extension(Path::new("x.fb2.zip"), &[".fb2.zip", ".zip"]);
        assert_eq!(m.as_deref(), Some(".fb2.zip"));
    }

    #[test]
    fn bare_extension_name_does_not_match() {
        assert_eq!(matched_extension(Path::new("/b/.fb2"), &[".fb2"]), None);
    }

    #[test]
    fn plain_zip_is_not_fb2_zip() {
        assert_eq!(matched_extension(Path::new("photos.zip"), &[".fb2.zip", ".fb2"]), None);
    }

    #[test]
    fn non_ascii_name_near_boundary_does_not_panic() {
        assert_eq!(matched_extension(Path::new("книга"), &[".fb2"]), None);
        assert_eq!(matched_extension(Path::new("ж.fb2"), &[".fb2.zip"]), None);
    }

    // =========================================================================
    // ExtractorRegistry
    // =========================================================================

    #[test]
    fn default_registry_supports_builtin_formats() {
        let registry = ExtractorRegistry::with_defaults();
        assert!(registry.supports(Path::new("a.fb2")));
        assert!(registry.supports(Path::new("a.FB2.ZIP")));
        assert!(registry.supports(Path::new("a.epub")));
        assert!(!registry.supports(Path::new("a.pdf")));
        assert!(!registry.supports(Path::new("a.zip")));
    }

    #[test]
    fn supported_extensions_is_the_union() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(registry.supported_extensions(), vec![".fb2.zip", ".fb2", ".epub"]);
    }

    #[test]
    fn supported_extensions_deduplicates() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.register(Greedy);
        assert_eq!(
            registry.supported_extensions(),
            vec![".fb2.zip", ".fb2", ".epub", ".txt"]
        );
    }

    #[test]
    fn extension_of_reports_compound_suffix() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(
            registry.extension_of(Path::new("dir/Roadside.Fb2.zip")).as_deref(),
            Some(".Fb2.zip")
        );
        assert_eq!(registry.extension_of(Path::new("notes.txt")), None);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(registry.extract(&PathBuf::from("/nope/a.mobi")), Extraction::Unsupported);
    }

    #[test]
    fn empty_registry_supports_nothing() {
        let registry = ExtractorRegistry::new();
        assert!(registry.find(Path::new("a.fb2")).is_none());
        assert!(registry.supported_extensions().is_empty());
    }

    #[test]
    fn first_registered_extractor_wins() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("book.fb2");
        write_fb2(&path, &Fb2Book::new("Title"));

        let mut greedy_first = ExtractorRegistry::new();
        greedy_first.register(Greedy);
        greedy_first.register(Fb2Extractor);
        assert_eq!(greedy_first.find(&path).unwrap().format_name(), "greedy");
        assert_eq!(greedy_first.extract(&path), Extraction::Unreadable);

        let mut fb2_first = ExtractorRegistry::new();
        fb2_first.register(Fb2Extractor);
        fb2_first.register(Greedy);
        assert!(matches!(fb2_first.extract(&path), Extraction::Metadata(_)));
    }

    #[test]
    fn missing_file_is_unreadable_not_error() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(
            registry.extract(Path::new("/definitely/not/here.fb2")),
            Extraction::Unreadable
        );
    }
}
