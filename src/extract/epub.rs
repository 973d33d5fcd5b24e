//! EPUB 2 and 3 (`.epub`).
//!
//! An EPUB is a zip archive. `META-INF/container.xml` names the OPF package
//! document, whose `<metadata>` block carries Dublin Core fields:
//!
//! - `dc:title`: first one, trimmed
//! - `dc:creator`: every one whose `opf:role` is absent or `aut`
//! - series: Calibre's `calibre:series` / `calibre:series_index` meta pair,
//!   else EPUB3 `belongs-to-collection` refined by `group-position`
//!
//! Creators are free-form display names and are split into name parts on
//! whitespace. When the container file is missing, the first `.opf` entry in
//! the archive is used.

use super::xml::{self, TextCapture};
use super::{ExtractError, MetadataExtractor};
use crate::types::{Author, BookMetadata};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::{BufRead, Read, Seek};
use std::path::Path;
use zip::ZipArchive;
use zip::result::ZipError;

const EXTENSIONS: &[&str] = &[".epub"];
const CONTAINER: &str = "META-INF/container.xml";
const ROOT: &str = "package";

pub struct EpubExtractor;

impl MetadataExtractor for EpubExtractor {
    fn format_name(&self) -> &'static str {
        "EPUB"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn read_metadata(&self, path: &Path) -> Result<BookMetadata, ExtractError> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let opf_path = match read_entry(&mut archive, CONTAINER) {
            Ok(container) => rootfile_path(container.as_slice())?,
            Err(ExtractError::MissingEntry(_)) => None,
            Err(e) => return Err(e),
        };
        let opf_path = match opf_path {
            Some(p) => p,
            None => first_opf_entry(&mut archive)?,
        };
        let opf = read_entry(&mut archive, &opf_path)?;
        parse_opf(opf.as_slice())
    }
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(ExtractError::MissingEntry(name.to_string())),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn first_opf_entry<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String, ExtractError> {
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_file() && entry.name().to_ascii_lowercase().ends_with(".opf") {
            return Ok(entry.name().to_string());
        }
    }
    Err(ExtractError::MissingEntry(".opf".to_string()))
}

/// `full-path` of the first `<rootfile>` in `container.xml`.
fn rootfile_path<R: BufRead>(source: R) -> Result<Option<String>, ExtractError> {
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if xml::local_name(&e) == "rootfile" => {
                let path = xml::attribute(&e, "full-path", reader.decoder());
                return Ok(path.filter(|p| !p.is_empty()));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

/// What the active text capture belongs to.
#[derive(Debug)]
enum Target {
    Title,
    Creator,
    Collection { id: Option<String> },
    Position { refines: String },
}

#[derive(Debug, Default)]
struct Package {
    root_seen: bool,
    depth: usize,
    metadata_depth: Option<usize>,
    capture: Option<(Target, TextCapture)>,
    title: Option<String>,
    title_seen: bool,
    creators: Vec<String>,
    calibre_series: Option<String>,
    calibre_index: Option<String>,
    collection: Option<(Option<String>, String)>,
    positions: Vec<(String, String)>,
}

/// Parse the `<metadata>` block of an OPF package document.
pub(crate) fn parse_opf<R: BufRead>(source: R) -> Result<BookMetadata, ExtractError> {
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut package = Package::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                package.open(&e, &reader)?;
            }
            Event::Empty(e) => {
                package.open(&e, &reader)?;
                package.close();
            }
            Event::End(_) => {
                if package.close() {
                    break;
                }
            }
            Event::Text(t) => {
                if let Some((_, capture)) = package.capture.as_mut() {
                    capture.push(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some((_, capture)) = package.capture.as_mut() {
                    capture.push(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    package.finish()
}

impl Package {
    fn open<R>(&mut self, e: &BytesStart<'_>, reader: &Reader<R>) -> Result<(), ExtractError> {
        let name = xml::local_name(e);
        if self.depth == 0 {
            if self.root_seen || name != ROOT {
                return Err(ExtractError::MissingMarkup("OPF package"));
            }
            self.root_seen = true;
        }
        self.depth += 1;

        if name == "metadata" && self.metadata_depth.is_none() {
            self.metadata_depth = Some(self.depth);
            return Ok(());
        }
        if self.metadata_depth.is_none() || self.capture.is_some() {
            return Ok(());
        }

        let decoder = reader.decoder();
        let target = match name.as_str() {
            "title" if !self.title_seen => {
                self.title_seen = true;
                Some(Target::Title)
            }
            "creator" => {
                let role = xml::attribute(e, "role", decoder);
                role.is_none_or(|r| r.eq_ignore_ascii_case("aut"))
                    .then_some(Target::Creator)
            }
            "meta" => self.meta(e, decoder),
            _ => None,
        };
        if let Some(target) = target {
            self.capture = Some((target, TextCapture::at(self.depth)));
        }
        Ok(())
    }

    /// Handle a `<meta>` element. Calibre pairs carry their value in
    /// `content`; EPUB3 refinements carry it as text, which needs a capture.
    fn meta(&mut self, e: &BytesStart<'_>, decoder: quick_xml::encoding::Decoder) -> Option<Target> {
        match xml::attribute(e, "name", decoder).as_deref() {
            Some("calibre:series") => {
                self.calibre_series = self
                    .calibre_series
                    .take()
                    .or_else(|| xml::attribute(e, "content", decoder));
                return None;
            }
            Some("calibre:series_index") => {
                self.calibre_index = self
                    .calibre_index
                    .take()
                    .or_else(|| xml::attribute(e, "content", decoder));
                return None;
            }
            _ => {}
        }
        match xml::attribute(e, "property", decoder).as_deref() {
            Some("belongs-to-collection") if self.collection.is_none() => Some(Target::Collection {
                id: xml::attribute(e, "id", decoder),
            }),
            Some("group-position") => xml::attribute(e, "refines", decoder)
                .map(|refines| Target::Position { refines }),
            _ => None,
        }
    }

    /// Close the innermost element. Returns true when `</metadata>` closed.
    fn close(&mut self) -> bool {
        if self.capture.as_ref().is_some_and(|(_, c)| c.ends_at(self.depth)) {
            if let Some((target, capture)) = self.capture.take() {
                let text = capture.finish();
                match target {
                    Target::Title => self.title = text,
                    Target::Creator => self.creators.extend(text),
                    Target::Collection { id } => {
                        if let Some(name) = text {
                            self.collection = Some((id, name));
                        }
                    }
                    Target::Position { refines } => {
                        if let Some(value) = text {
                            self.positions.push((refines, value));
                        }
                    }
                }
            }
        }
        let metadata_closed = self.metadata_depth == Some(self.depth);
        self.depth = self.depth.saturating_sub(1);
        metadata_closed
    }

    fn finish(self) -> Result<BookMetadata, ExtractError> {
        if !self.root_seen {
            return Err(ExtractError::MissingMarkup("OPF package"));
        }

        let (series_name, series_index) = match self.calibre_series.filter(|s| !s.is_empty()) {
            Some(name) => (Some(name), self.calibre_index),
            None => match self.collection {
                Some((id, name)) => {
                    let position = id.and_then(|id| {
                        let target = format!("#{id}");
                        self.positions
                            .into_iter()
                            .find(|(refines, _)| *refines == target)
                            .map(|(_, value)| value)
                    });
                    (Some(name), position)
                }
                None => (None, None),
            },
        };

        let authors = self
            .creators
            .iter()
            .map(|c| Author::from_display_name(c))
            .collect();

        Ok(BookMetadata::new(
            self.title,
            authors,
            series_name,
            series_index.as_deref().and_then(parse_series_index),
        ))
    }
}

/// Accepts whole numbers written as integers or as floats with no fraction
/// (`"2"`, `"2.0"`); anything else is treated as absent.
fn parse_series_index(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX)).then_some(f as u32)
}
