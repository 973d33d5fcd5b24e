//! FictionBook 2 (`.fb2`) and zipped FictionBook (`.fb2.zip`).
//!
//! Only the `<description>` header is read. The parser is a streaming pass
//! that stops at `</description>`, so a truncated or damaged `<body>` never
//! costs the metadata.
//!
//! ```text
//! <FictionBook>
//!   <description>
//!     <title-info>
//!       <author><first-name/><middle-name/><last-name/><nickname/></author>  (1..n)
//!       <book-title/>
//!       <sequence name="…" number="…"/>
//!     </title-info>
//!     <src-title-info/>  ← original-language header of a translation; ignored
//!     <document-info>
//!       <author/>   ← who made the file; not a book author
//!     </document-info>
//!   </description>
//!   <body>…</body>
//! </FictionBook>
//! ```
//!
//! The declared encoding (`windows-1251` is common) is honoured.

use super::xml::{self, TextCapture};
use super::{ExtractError, MetadataExtractor, matched_extension};
use crate::types::{Author, BookMetadata};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use zip::ZipArchive;

const EXTENSIONS: &[&str] = &[".fb2.zip", ".fb2"];
const ZIPPED: &[&str] = &[".fb2.zip"];
const ROOT: &str = "FictionBook";

pub struct Fb2Extractor;

impl MetadataExtractor for Fb2Extractor {
    fn format_name(&self) -> &'static str {
        "FB2"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn read_metadata(&self, path: &Path) -> Result<BookMetadata, ExtractError> {
        if matched_extension(path, ZIPPED).is_some() {
            let bytes = read_first_fb2_entry(path)?;
            parse(bytes.as_slice())
        } else {
            parse(BufReader::new(File::open(path)?))
        }
    }
}

/// Bytes of the first archive entry whose name ends in `.fb2`.
fn read_first_fb2_entry(path: &Path) -> Result<Vec<u8>, ExtractError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_file() && entry.name().to_ascii_lowercase().ends_with(".fb2") {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            return Ok(bytes);
        }
    }
    Err(ExtractError::MissingEntry(".fb2".to_string()))
}

/// Parse the description header of an FB2 document.
pub(crate) fn parse<R: BufRead>(source: R) -> Result<BookMetadata, ExtractError> {
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut header = Header::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = xml::local_name(&e);
                if name == "sequence" {
                    header.sequence(
                        xml::attribute(&e, "name", reader.decoder()),
                        xml::attribute(&e, "number", reader.decoder()),
                    );
                }
                header.open(name)?;
            }
            Event::Empty(e) => {
                let name = xml::local_name(&e);
                if name == "sequence" {
                    header.sequence(
                        xml::attribute(&e, "name", reader.decoder()),
                        xml::attribute(&e, "number", reader.decoder()),
                    );
                }
                header.open(name)?;
                header.close();
            }
            Event::End(_) => {
                if header.close().as_deref() == Some("description") {
                    break;
                }
            }
            Event::Text(t) => header.text(&t.unescape()?),
            Event::CData(c) => header.text(&String::from_utf8_lossy(&c)),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    header.finish()
}

#[derive(Debug, Clone, Copy)]
enum AuthorField {
    First,
    Middle,
    Last,
    Nickname,
}

impl AuthorField {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "first-name" => Some(Self::First),
            "middle-name" => Some(Self::Middle),
            "last-name" => Some(Self::Last),
            "nickname" => Some(Self::Nickname),
            _ => None,
        }
    }

    /// First occurrence wins.
    fn assign(self, author: &mut Author, value: Option<String>) {
        let slot = match self {
            Self::First => &mut author.first_name,
            Self::Middle => &mut author.middle_name,
            Self::Last => &mut author.last_name,
            Self::Nickname => &mut author.nickname,
        };
        if slot.is_none() {
            *slot = value;
        }
    }
}

/// Running state of the header scan. Depths count the root as 1.
#[derive(Debug, Default)]
struct Header {
    root_seen: bool,
    stack: Vec<String>,
    title: Option<String>,
    title_capture: Option<TextCapture>,
    title_seen: bool,
    authors: Vec<Author>,
    author: Option<(usize, Author)>,
    field: Option<(AuthorField, TextCapture)>,
    series: Option<(Option<String>, Option<String>)>,
}

impl Header {
    fn open(&mut self, name: String) -> Result<(), ExtractError> {
        if self.stack.is_empty() {
            if self.root_seen || name != ROOT {
                return Err(ExtractError::MissingMarkup(ROOT));
            }
            self.root_seen = true;
        }
        let depth = self.stack.len() + 1;

        match name.as_str() {
            "book-title" if !self.title_seen && !self.in_ignored_block() => {
                self.title_seen = true;
                self.title_capture = Some(TextCapture::at(depth));
            }
            "author" if self.author.is_none() && !self.in_ignored_block() => {
                self.author = Some((depth, Author::default()));
            }
            tag => {
                let direct_child = matches!(self.author, Some((d, _)) if d + 1 == depth);
                if direct_child && self.field.is_none() {
                    if let Some(field) = AuthorField::from_tag(tag) {
                        self.field = Some((field, TextCapture::at(depth)));
                    }
                }
            }
        }

        self.stack.push(name);
        Ok(())
    }

    /// Close the innermost element and return its name.
    fn close(&mut self) -> Option<String> {
        let depth = self.stack.len();

        if self.title_capture.as_ref().is_some_and(|c| c.ends_at(depth)) {
            self.title = self.title_capture.take().and_then(TextCapture::finish);
        }
        if self.field.as_ref().is_some_and(|(_, c)| c.ends_at(depth)) {
            if let (Some((field, capture)), Some((_, author))) =
                (self.field.take(), self.author.as_mut())
            {
                field.assign(author, capture.finish());
            }
        }
        if matches!(self.author, Some((d, _)) if d == depth) {
            if let Some((_, author)) = self.author.take() {
                self.authors.push(author);
            }
        }

        self.stack.pop()
    }

    fn text(&mut self, text: &str) {
        if let Some(capture) = self.title_capture.as_mut() {
            capture.push(text);
        }
        if let Some((_, capture)) = self.field.as_mut() {
            capture.push(text);
        }
    }

    /// Record the first `<sequence>` only.
    fn sequence(&mut self, name: Option<String>, number: Option<String>) {
        if self.series.is_none() && !self.stack.is_empty() && !self.in_ignored_block() {
            self.series = Some((name, number));
        }
    }

    /// Inside the file creator's block or a translation's source header.
    fn in_ignored_block(&self) -> bool {
        self.stack
            .iter()
            .any(|n| n == "document-info" || n == "src-title-info")
    }

    fn finish(self) -> Result<BookMetadata, ExtractError> {
        if !self.root_seen {
            return Err(ExtractError::MissingMarkup(ROOT));
        }
        let (series_name, series_number) = match self.series {
            Some((name, number)) => (
                name.filter(|n| !n.is_empty()),
                number.and_then(|n| n.parse::<u32>().ok()),
            ),
            None => (None, None),
        };
        Ok(BookMetadata::new(
            self.title,
            self.authors,
            series_name,
            series_number,
        ))
    }
}
