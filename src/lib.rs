//! # Shelfwise
//!
//! Sorts a folder of e-book files into a browsable tree using the metadata
//! embedded in the books:
//!
//! ```text
//! organized_books/<Author>/<Series | No series>/[NN. ]<Title><ext>
//! ```
//!
//! A book with several authors is copied once per author. Files no extractor
//! understands are moved to `not_organized/`, keeping their relative path.
//! Source books are never modified.
//!
//! # Architecture: One Pass, Four Steps
//!
//! ```text
//! 1. Survey      root/            →  supported + unsupported files
//! 2. Extract     book file        →  BookMetadata        (FB2, FB2.zip, EPUB)
//! 3. Normalize   raw author/series →  canonical spelling (known-names lists)
//! 4. Place       metadata         →  collision-free copy under organized_books/
//! ```
//!
//! Files are handled one at a time. A failure on one file is logged and
//! counted; only a root that cannot be enumerated stops the run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`organize`] | The run itself: enumeration, partitioning, copies, moves, progress events |
//! | [`extract`] | Format detection and metadata extraction for FB2, zipped FB2 and EPUB |
//! | [`normalizer`] | Maps name spellings to canonical ones by embedding then fuzzy similarity |
//! | [`known_names`] | File-locked JSON lists of canonical author and series names |
//! | [`embedding`] | `Embedder` trait, cosine similarity, external-command embedder |
//! | [`paths`] | Destination path composition and `name (N).ext` collision handling |
//! | [`naming`] | Path-segment sanitizing and book file names |
//! | [`types`] | `Author`, `BookMetadata` and the session result types |
//! | [`config`] | `shelfwise.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting for surveys, progress and summaries |
//!
//! # Design Decisions
//!
//! ## Copy, Then Move
//!
//! Supported books are copied so the user's originals stay where they were
//! until they are satisfied with the result. Unsupported files are moved, which
//! leaves the root holding only what was organized.
//!
//! ## Canonical Names Grow With the Library
//!
//! The first spelling seen for an author or series becomes canonical and is
//! persisted. Later spellings close enough to it are folded in, so
//! "Strugatsky" and "Strugatskiy" share one folder. Without an embedding
//! provider, fuzzy matching alone decides.

pub mod config;
pub mod embedding;
pub mod extract;
pub mod known_names;
pub mod naming;
pub mod normalizer;
pub mod organize;
pub mod output;
pub mod paths;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
