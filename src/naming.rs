//! Path-segment sanitizing and book file-name composition.
//!
//! Every author, series and title string that ends up on disk goes through
//! [`sanitize`] first. The rules are the union of what Windows, macOS and
//! Linux reject, so a tree built on one machine can be copied to any other:
//!
//! - `< > : " / \ | ? *` and ASCII control characters become `_`
//! - leading/trailing whitespace, `.` and `_` are trimmed
//! - the result is capped at [`MAX_SEGMENT_BYTES`] on a char boundary
//! - an empty result falls back to a caller-supplied default
//!
//! [`sanitize`] is idempotent: feeding its output back in returns it unchanged.
//!
//! ## File names
//!
//! A book file name is `NN. Title.ext` when the book has a series number and
//! `Title.ext` otherwise:
//!
//! - `(Some(3), "Roadside Picnic", ".fb2")` → `03. Roadside Picnic.fb2`
//! - `(Some(120), "Tail", ".epub")` → `120. Tail.epub`
//! - `(None, "Solaris", ".fb2.zip")` → `Solaris.fb2.zip`

/// Replacement for every character that cannot appear in a path segment.
pub const PLACEHOLDER: char = '_';

/// Fallback used when a sanitized title comes out empty.
pub const UNTITLED: &str = "Untitled";

/// Folder used for books that do not belong to a series.
pub const NO_SERIES: &str = "No series";

/// Longest sanitized segment, in bytes. Leaves room for the `NN. ` prefix,
/// a ` (k)` collision suffix and a compound extension under the common
/// 255-byte file-name limit.
pub const MAX_SEGMENT_BYTES: usize = 150;

const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

fn is_illegal(c: char) -> bool {
    c.is_control() || ILLEGAL.contains(&c)
}

fn is_trimmed(c: char) -> bool {
    c.is_whitespace() || c == '.' || c == PLACEHOLDER
}

/// Make `input` safe to use as a single path segment.
///
/// Returns the sanitized `fallback` when nothing usable is left; if the
/// fallback itself sanitizes to nothing, [`UNTITLED`] is returned.
pub fn sanitize(input: &str, fallback: &str) -> String {
    clean(input)
        .or_else(|| clean(fallback))
        .unwrap_or_else(|| UNTITLED.to_string())
}

fn clean(input: &str) -> Option<String> {
    let replaced: String = input
        .chars()
        .map(|c| if is_illegal(c) { PLACEHOLDER } else { c })
        .collect();
    let trimmed = truncate_at_boundary(replaced.trim_matches(is_trimmed), MAX_SEGMENT_BYTES)
        .trim_matches(is_trimmed);
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn truncate_at_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Compose a book file name from an already-sanitized title.
///
/// Series numbers are zero-padded to two digits; larger numbers print in
/// full. The extension is appended verbatim and should include its leading
/// dot.
pub fn book_file_name(series_number: Option<u32>, title: &str, extension: &str) -> String {
    match series_number {
        Some(n) => format!("{n:02}. {title}{extension}"),
        None => format!("{title}{extension}"),
    }
}
