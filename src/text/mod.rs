//! Text decoding for streaming handlers.
//!
//! Text-based handlers never load a whole document: they open a
//! [`SectionReader`] over the document content and work one section at a
//! time. [`TextOptions`] carries the per-handler settings (section size and
//! source charset) and picks the charset to decode with:
//!
//! - parsed content is always UTF-8 (the extraction encoding);
//! - raw content uses the configured charset, then the document's declared
//!   encoding, then a detected one.

pub mod section_reader;

pub use section_reader::{SectionBreak, SectionReader, DEFAULT_MAX_READ_SIZE};

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};

use crate::charset::{self, CharDecoder, Charset, CharsetDetector, DefaultCharsetDetector};
use crate::document::ParseState;
use crate::error::Result;
use crate::handler::HandlerDoc;

/// Bytes inspected for charset detection.
const DETECTION_SAMPLE_SIZE: usize = 4096;

/// Section reader over a borrowed content stream.
pub type DocumentSections<'a> = SectionReader<BufReader<&'a mut dyn Read>>;

/// Text streaming settings of a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    /// Maximum characters per section
    pub max_read_size: usize,
    /// Charset of raw content; detected when `None`
    pub source_charset: Option<String>,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            max_read_size: DEFAULT_MAX_READ_SIZE,
            source_charset: None,
        }
    }
}

impl TextOptions {
    /// Set the maximum section size.
    pub fn with_max_read_size(mut self, max_read_size: usize) -> Self {
        self.max_read_size = max_read_size;
        self
    }

    /// Set the charset of raw content.
    pub fn with_source_charset(mut self, charset: impl Into<String>) -> Self {
        self.source_charset = Some(charset.into());
        self
    }

    /// Open a section reader over `input` with the default charset detector.
    pub fn sections<'a>(
        &self,
        input: &'a mut dyn Read,
        doc: &HandlerDoc<'_>,
    ) -> Result<DocumentSections<'a>> {
        self.sections_with_detector(input, doc, &DefaultCharsetDetector)
    }

    /// Open a section reader, detecting the charset with `detector` when needed.
    pub fn sections_with_detector<'a>(
        &self,
        input: &'a mut dyn Read,
        doc: &HandlerDoc<'_>,
        detector: &dyn CharsetDetector,
    ) -> Result<DocumentSections<'a>> {
        let mut buffered = BufReader::with_capacity(DETECTION_SAMPLE_SIZE, input);
        let configured = self.source_charset.as_deref().or(doc.content_encoding);
        let charset = match (doc.parse_state, configured) {
            (ParseState::Parsed, _) => Charset::Utf8,
            (ParseState::Unparsed, Some(name)) => Charset::parse(name)?,
            (ParseState::Unparsed, None) => {
                let sample = buffered.fill_buf()?;
                charset::resolve(detector, sample, doc.content_type)
            },
        };
        log::trace!("Reading \"{}\" as {}", doc.reference, charset);
        Ok(SectionReader::new(CharDecoder::new(buffered, charset), self.max_read_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::Properties;

    fn view<'a>(
        metadata: &'a mut Properties,
        parse_state: ParseState,
        encoding: Option<&'a str>,
    ) -> HandlerDoc<'a> {
        HandlerDoc {
            reference: "test.txt",
            content_type: Some("text/plain"),
            content_encoding: encoding,
            parse_state,
            metadata,
            embedding: None,
        }
    }

    #[test]
    fn test_parsed_content_is_always_utf8() {
        let options = TextOptions::default().with_source_charset("ISO-8859-1");
        let mut meta = Properties::new();
        let doc = view(&mut meta, ParseState::Parsed, None);
        let mut input: &[u8] = "café".as_bytes();
        let mut sections = options.sections(&mut input, &doc).unwrap();
        assert_eq!(sections.next_section().unwrap().unwrap(), "café");
    }

    #[test]
    fn test_configured_charset_for_raw_content() {
        let options = TextOptions::default().with_source_charset("ISO-8859-1");
        let mut meta = Properties::new();
        let doc = view(&mut meta, ParseState::Unparsed, Some("UTF-8"));
        let mut input: &[u8] = b"caf\xe9";
        let mut sections = options.sections(&mut input, &doc).unwrap();
        assert_eq!(sections.next_section().unwrap().unwrap(), "café");
    }

    #[test]
    fn test_declared_encoding_before_detection() {
        let options = TextOptions::default();
        let mut meta = Properties::new();
        let doc = view(&mut meta, ParseState::Unparsed, Some("ISO-8859-1"));
        let mut input: &[u8] = b"\x93x";
        let mut sections = options.sections(&mut input, &doc).unwrap();
        // ISO-8859-1 keeps 0x93 as a C1 control, windows-1252 would not
        assert_eq!(sections.next_section().unwrap().unwrap(), "\u{93}x");
    }

    #[test]
    fn test_detected_charset_for_raw_content() {
        let options = TextOptions::default();
        let mut meta = Properties::new();
        let doc = view(&mut meta, ParseState::Unparsed, None);
        let mut input: &[u8] = b"\x93hi\x94 caf\xe9";
        let mut sections = options.sections(&mut input, &doc).unwrap();
        assert_eq!(sections.next_section().unwrap().unwrap(), "\u{201c}hi\u{201d} café");
    }

    #[test]
    fn test_unknown_configured_charset_is_an_error() {
        let options = TextOptions::default().with_source_charset("nope");
        let mut meta = Properties::new();
        let doc = view(&mut meta, ParseState::Unparsed, None);
        let mut input: &[u8] = b"x";
        assert!(options.sections(&mut input, &doc).is_err());
    }
}
