//! CLI output formatting for the `check`, `organize` and `names` commands.
//!
//! # Book-First Display
//!
//! A book is shown by its positional index and title; the file it came from
//! and the copies made from it follow as indented context lines. Paths are
//! shown relative to the library root so the output reads as an inventory.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Books (3)
//! 001 dune2.fb2
//! 002 picnic.fb2.zip
//! 003 sub/solaris.epub
//!
//! Formats
//!     .epub: 1
//!     .fb2: 1
//!     .fb2.zip: 1
//!
//! Other files (1)
//!     notes.txt
//! ```
//!
//! ## Organize
//!
//! ```text
//! Found 3 books, 1 other file
//! 001 Dune Messiah
//!     Source: dune2.fb2
//!     → organized_books/Frank Herbert/Dune/02. Dune Messiah.fb2
//! 002 (picnic.fb2.zip)
//!     Skipped: no readable metadata
//! Moved notes.txt → not_organized/notes.txt
//!
//! Organized: 1, unsupported: 1, unreadable: 1
//! ```
//!
//! ## Names
//!
//! ```text
//! Known authors (2)
//!     Frank Herbert
//!     Ursula K. Le Guin
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::known_names::NameKind;
use crate::organize::{OrganizeEvent, Survey};
use crate::types::OrganizationSessionResult;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `path` relative to `root` with forward slashes, or in full when it lies
/// outside.
fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// check
// ============================================================================

/// Format what an organize run would pick up, without touching anything.
pub fn format_survey(survey: &Survey) -> Vec<String> {
    let mut lines = vec![format!("Books ({})", survey.supported.len())];
    for (i, file) in survey.supported.iter().enumerate() {
        lines.push(format!(
            "{} {}",
            format_index(i + 1),
            relative(&file.path, &survey.root)
        ));
    }

    let formats = survey.formats();
    if !formats.is_empty() {
        lines.push(String::new());
        lines.push("Formats".to_string());
        for (extension, count) in &formats {
            lines.push(format!("{}{extension}: {count}", indent(1)));
        }
    }

    if !survey.unsupported.is_empty() {
        lines.push(String::new());
        lines.push(format!("Other files ({})", survey.unsupported.len()));
        for path in &survey.unsupported {
            lines.push(format!("{}{}", indent(1), relative(path, &survey.root)));
        }
    }
    lines
}

pub fn print_survey(survey: &Survey) {
    for line in format_survey(survey) {
        println!("{}", line);
    }
}

// ============================================================================
// organize
// ============================================================================

/// Format a single organize progress event as display lines.
pub fn format_event(event: &OrganizeEvent, root: &Path) -> Vec<String> {
    match event {
        OrganizeEvent::Started {
            supported,
            unsupported,
        } => vec![format!(
            "Found {}, {}",
            plural(*supported, "book", "books"),
            plural(*unsupported, "other file", "other files")
        )],
        OrganizeEvent::BookOrganized {
            index,
            source,
            title,
            destinations,
        } => {
            let mut lines = vec![
                format!("{} {}", format_index(*index), title),
                format!("{}Source: {}", indent(1), relative(source, root)),
            ];
            for destination in destinations {
                lines.push(format!("{}\u{2192} {}", indent(1), relative(destination, root)));
            }
            lines
        }
        OrganizeEvent::Unreadable { source } => vec![
            format!("({})", relative(source, root)),
            format!("{}Skipped: no readable metadata", indent(1)),
        ],
        OrganizeEvent::Moved {
            source,
            destination,
        } => vec![format!(
            "Moved {} \u{2192} {}",
            relative(source, root),
            relative(destination, root)
        )],
        OrganizeEvent::Failed { source, reason } => vec![
            format!("({})", relative(source, root)),
            format!("{}Failed: {reason}", indent(1)),
        ],
        OrganizeEvent::Cancelled => vec!["Cancelled".to_string()],
    }
}

/// Format the end-of-run report.
pub fn format_session(result: &OrganizationSessionResult) -> Vec<String> {
    let mut lines = vec![String::new(), result.summary.clone()];
    if !result.organized_books.is_empty() {
        lines.push(format!(
            "{}Books: {}",
            indent(1),
            result.organized_root.display()
        ));
    }
    if result.unsupported_files_count > 0 && !result.cancelled {
        lines.push(format!(
            "{}Other files: {}",
            indent(1),
            result.not_organized_root.display()
        ));
    }
    lines
}

pub fn print_session(result: &OrganizationSessionResult) {
    for line in format_session(result) {
        println!("{}", line);
    }
}

// ============================================================================
// names
// ============================================================================

/// Format one known-names list.
pub fn format_names(kind: NameKind, names: &[String]) -> Vec<String> {
    let label = match kind {
        NameKind::Author => "authors",
        NameKind::Series => "series",
    };
    if names.is_empty() {
        return vec![format!("No known {label}")];
    }
    let mut lines = vec![format!("Known {label} ({})", names.len())];
    lines.extend(names.iter().map(|n| format!("{}{n}", indent(1))));
    lines
}

pub fn print_names(kind: NameKind, names: &[String]) {
    for line in format_names(kind, names) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organize::SupportedFile;
    use crate::types::OrganizationResult;
    use std::path::PathBuf;

    fn root() -> PathBuf {
        PathBuf::from("/lib")
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads_to_three() {
        assert_eq!(format_index(7), "007");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn relative_strips_root() {
        assert_eq!(relative(Path::new("/lib/a/b.fb2"), &root()), "a/b.fb2");
    }

    #[test]
    fn relative_keeps_outside_paths() {
        assert_eq!(relative(Path::new("/elsewhere/b.fb2"), &root()), "/elsewhere/b.fb2");
    }

    #[test]
    fn plural_picks_form() {
        assert_eq!(plural(1, "book", "books"), "1 book");
        assert_eq!(plural(0, "book", "books"), "0 books");
    }

    // =========================================================================
    // format_survey()
    // =========================================================================

    #[test]
    fn survey_lists_books_formats_and_others() {
        let survey = Survey {
            root: root(),
            supported: vec![
                SupportedFile {
                    path: root().join("a.fb2"),
                    extension: ".fb2".into(),
                },
                SupportedFile {
                    path: root().join("sub/b.EPUB"),
                    extension: ".EPUB".into(),
                },
            ],
            unsupported: vec![root().join("notes.txt")],
        };
        assert_eq!(
            format_survey(&survey),
            vec![
                "Books (2)",
                "001 a.fb2",
                "002 sub/b.EPUB",
                "",
                "Formats",
                "    .epub: 1",
                "    .fb2: 1",
                "",
                "Other files (1)",
                "    notes.txt",
            ]
        );
    }

    #[test]
    fn empty_survey_is_one_line() {
        let survey = Survey {
            root: root(),
            supported: vec![],
            unsupported: vec![],
        };
        assert_eq!(format_survey(&survey), vec!["Books (0)"]);
    }

    // =========================================================================
    // format_event()
    // =========================================================================

    #[test]
    fn started_event_counts() {
        let lines = format_event(
            &OrganizeEvent::Started {
                supported: 1,
                unsupported: 2,
            },
            &root(),
        );
        assert_eq!(lines, vec!["Found 1 book, 2 other files"]);
    }

    #[test]
    fn organized_book_lists_each_copy() {
        let lines = format_event(
            &OrganizeEvent::BookOrganized {
                index: 3,
                source: root().join("picnic.fb2"),
                title: "Roadside Picnic".into(),
                destinations: vec![
                    root().join("organized_books/Arkady Strugatsky/No series/Roadside Picnic.fb2"),
                    root().join("organized_books/Boris Strugatsky/No series/Roadside Picnic.fb2"),
                ],
            },
            &root(),
        );
        assert_eq!(
            lines,
            vec![
                "003 Roadside Picnic",
                "    Source: picnic.fb2",
                "    \u{2192} organized_books/Arkady Strugatsky/No series/Roadside Picnic.fb2",
                "    \u{2192} organized_books/Boris Strugatsky/No series/Roadside Picnic.fb2",
            ]
        );
    }

    #[test]
    fn unreadable_and_failed_show_file_name() {
        let unreadable = format_event(
            &OrganizeEvent::Unreadable {
                source: root().join("x.fb2"),
            },
            &root(),
        );
        assert_eq!(unreadable, vec!["(x.fb2)", "    Skipped: no readable metadata"]);

        let failed = format_event(
            &OrganizeEvent::Failed {
                source: root().join("y.epub"),
                reason: "disk full".into(),
            },
            &root(),
        );
        assert_eq!(failed, vec!["(y.epub)", "    Failed: disk full"]);
    }

    #[test]
    fn moved_event_is_one_line() {
        let lines = format_event(
            &OrganizeEvent::Moved {
                source: root().join("a/n.txt"),
                destination: root().join("not_organized/a/n.txt"),
            },
            &root(),
        );
        assert_eq!(lines, vec!["Moved a/n.txt \u{2192} not_organized/a/n.txt"]);
    }

    // =========================================================================
    // format_session()
    // =========================================================================

    fn session(books: usize, unsupported: usize) -> OrganizationSessionResult {
        OrganizationSessionResult {
            organized_books: (0..books)
                .map(|i| OrganizationResult {
                    original_file_path: root().join(format!("{i}.fb2")),
                    title: format!("T{i}"),
                    created_file_paths: vec![],
                })
                .collect(),
            unsupported_files_count: unsupported,
            unreadable_files_count: 0,
            failed_files_count: 0,
            organized_root: root().join("organized_books"),
            not_organized_root: root().join("not_organized"),
            cancelled: false,
            summary: format!("Organized: {books}, unsupported: {unsupported}"),
        }
    }

    #[test]
    fn session_shows_summary_and_used_roots() {
        assert_eq!(
            format_session(&session(2, 1)),
            vec![
                "",
                "Organized: 2, unsupported: 1",
                "    Books: /lib/organized_books",
                "    Other files: /lib/not_organized",
            ]
        );
    }

    #[test]
    fn session_omits_unused_roots() {
        assert_eq!(
            format_session(&session(0, 0)),
            vec!["", "Organized: 0, unsupported: 0"]
        );
    }

    // =========================================================================
    // format_names()
    // =========================================================================

    #[test]
    fn names_are_listed_in_order() {
        let names = vec!["Frank Herbert".to_string(), "Ursula K. Le Guin".to_string()];
        assert_eq!(
            format_names(NameKind::Author, &names),
            vec!["Known authors (2)", "    Frank Herbert", "    Ursula K. Le Guin"]
        );
    }

    #[test]
    fn empty_list_says_so() {
        assert_eq!(format_names(NameKind::Series, &[]), vec!["No known series"]);
    }
}
