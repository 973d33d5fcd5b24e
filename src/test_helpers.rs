//! Shared test utilities for the shelfwise test suite.
//!
//! Fixture writers build real book files in a temp directory so extractor and
//! organizer tests run against the same bytes a user's library would hold.
//! Scripted embedders stand in for an external embedding provider.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_fb2(
//!     &tmp.path().join("picnic.fb2"),
//!     &Fb2Book::new("Roadside Picnic")
//!         .author("Arkady", "Strugatsky")
//!         .author("Boris", "Strugatsky"),
//! );
//!
//! let embedder = MapEmbedder::new().with("Tolkien", &[1.0, 0.0]);
//! ```

use crate::embedding::{EmbedError, Embedder};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// =========================================================================
// FB2 fixtures
// =========================================================================

/// Builder for a minimal, valid FictionBook document.
#[derive(Debug, Clone, Default)]
pub struct Fb2Book {
    title: Option<String>,
    authors: Vec<(Option<String>, Option<String>, Option<String>)>,
    sequence: Option<(String, String)>,
}

impl Fb2Book {
    pub fn new(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Self::default()
        }
    }

    pub fn untitled() -> Self {
        Self::default()
    }

    pub fn author(mut self, first: &str, last: &str) -> Self {
        self.authors
            .push((Some(first.to_string()), Some(last.to_string()), None));
        self
    }

    pub fn nickname(mut self, nickname: &str) -> Self {
        self.authors.push((None, None, Some(nickname.to_string())));
        self
    }

    /// `<sequence name=… number=…/>`, both written verbatim.
    pub fn sequence(mut self, name: &str, number: &str) -> Self {
        self.sequence = Some((name.to_string(), number.to_string()));
        self
    }

    pub fn to_xml(&self) -> String {
        let mut info = String::new();
        for (first, last, nickname) in &self.authors {
            info.push_str("<author>");
            if let Some(f) = first {
                info.push_str(&format!("<first-name>{}</first-name>", escape(f)));
            }
            if let Some(l) = last {
                info.push_str(&format!("<last-name>{}</last-name>", escape(l)));
            }
            if let Some(n) = nickname {
                info.push_str(&format!("<nickname>{}</nickname>", escape(n)));
            }
            info.push_str("</author>\n");
        }
        if let Some(title) = &self.title {
            info.push_str(&format!("<book-title>{}</book-title>\n", escape(title)));
        }
        if let Some((name, number)) = &self.sequence {
            info.push_str(&format!(
                "<sequence name=\"{}\" number=\"{}\"/>\n",
                escape(name),
                escape(number)
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0">
<description>
<title-info>
<genre>sf</genre>
{info}<lang>en</lang>
</title-info>
<document-info><author><nickname>fixture</nickname></author></document-info>
</description>
<body><section><p>Once upon a time.</p></section></body>
</FictionBook>
"#
        )
    }
}

pub fn write_fb2(path: &Path, book: &Fb2Book) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, book.to_xml()).unwrap();
}

/// Zip holding the document as `book.fb2`.
pub fn write_fb2_zip(path: &Path, book: &Fb2Book) {
    write_zip(path, &[("book.fb2", book.to_xml().as_bytes())]);
}

/// Write an uncompressed zip with the given entries, in order.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

// =========================================================================
// EPUB fixtures
// =========================================================================

/// Builder for a minimal EPUB 2 package with Calibre series metadata.
#[derive(Debug, Clone, Default)]
pub struct EpubBook {
    title: String,
    creators: Vec<String>,
    series: Option<(String, String)>,
}

impl EpubBook {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    pub fn creator(mut self, name: &str) -> Self {
        self.creators.push(name.to_string());
        self
    }

    pub fn series(mut self, name: &str, index: &str) -> Self {
        self.series = Some((name.to_string(), index.to_string()));
        self
    }

    pub fn to_opf(&self) -> String {
        let mut metadata = format!("<dc:title>{}</dc:title>\n", escape(&self.title));
        for creator in &self.creators {
            metadata.push_str(&format!(
                "<dc:creator opf:role=\"aut\">{}</dc:creator>\n",
                escape(creator)
            ));
        }
        if let Some((name, index)) = &self.series {
            metadata.push_str(&format!(
                "<meta name=\"calibre:series\" content=\"{}\"/>\n\
                 <meta name=\"calibre:series_index\" content=\"{}\"/>\n",
                escape(name),
                escape(index)
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="uid">
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
{metadata}<dc:language>en</dc:language>
</metadata>
<manifest><item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/></manifest>
<spine><itemref idref="c1"/></spine>
</package>
"#
        )
    }
}

const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

pub fn write_epub(path: &Path, book: &EpubBook) {
    let opf = book.to_opf();
    write_zip(
        path,
        &[
            ("mimetype", b"application/epub+zip".as_slice()),
            ("META-INF/container.xml", CONTAINER_XML.as_bytes()),
            ("OEBPS/content.opf", opf.as_bytes()),
            ("OEBPS/c1.xhtml", b"<html/>".as_slice()),
        ],
    );
}

// =========================================================================
// Scripted embedders
// =========================================================================

/// Returns fixed vectors for known texts and fails for anything else.
///
/// Counts every call so tests can check memoization.
#[derive(Debug, Default)]
pub struct MapEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    calls: Arc<AtomicUsize>,
}

impl MapEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: &[f32]) -> Self {
        self.vectors.insert(text.to_string(), vector.to_vec());
        self
    }

    /// Shared call counter; keep it before boxing the embedder.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Embedder for MapEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| EmbedError::Provider(format!("no vector for {text:?}")))
    }
}

/// Fails every call, like an unreachable provider.
#[derive(Debug, Default)]
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        Err(EmbedError::Provider("provider unavailable".to_string()))
    }
}
