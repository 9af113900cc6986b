//! Plain text parser.

use std::io::{BufRead, BufReader, Write};

use crate::charset::{self, CharDecoder, Charset, CharsetDetector, DefaultCharsetDetector};
use crate::content::ReadSeek;
use crate::content_type::charset_param;
use crate::document::keys;
use crate::error::Result;
use crate::parser::{DocumentParser, ParseContext};

const CHUNK_CHARS: usize = 8192;

/// Decodes text content and re-emits it as UTF-8.
///
/// The source charset is the declared content encoding, else the `charset`
/// parameter of the content type, else a detected one. The charset used is
/// recorded as `Content-Encoding`. Also the default fallback parser.
#[derive(Default)]
pub struct PlainTextParser {
    detector: Option<Box<dyn CharsetDetector>>,
}

impl std::fmt::Debug for PlainTextParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainTextParser")
            .field("custom_detector", &self.detector.is_some())
            .finish()
    }
}

impl PlainTextParser {
    /// Parser with the default charset detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `detector` when no charset is declared.
    pub fn with_detector(mut self, detector: Box<dyn CharsetDetector>) -> Self {
        self.detector = Some(detector);
        self
    }
}

impl DocumentParser for PlainTextParser {
    fn name(&self) -> &str {
        "PlainTextParser"
    }

    fn parse(&self, input: &mut dyn ReadSeek, ctx: &mut ParseContext<'_>) -> Result<()> {
        let mut buffered = BufReader::new(input);
        let declared = ctx
            .content_encoding()
            .map(str::to_string)
            .or_else(|| ctx.content_type().and_then(charset_param));
        let charset = match declared {
            Some(name) => Charset::from_name(&name).unwrap_or_else(|| {
                log::warn!("Unknown declared charset {}, using UTF-8", name);
                Charset::Utf8
            }),
            None => {
                let detector: &dyn CharsetDetector = match &self.detector {
                    Some(d) => d.as_ref(),
                    None => &DefaultCharsetDetector,
                };
                let sample = buffered.fill_buf()?;
                charset::resolve(detector, sample, ctx.content_type())
            },
        };
        ctx.metadata.set(keys::PARSE_CONTENT_ENCODING, charset.name());

        let mut decoder = CharDecoder::new(buffered, charset);
        let mut chunk = String::with_capacity(CHUNK_CHARS);
        loop {
            chunk.clear();
            if decoder.read_chars(&mut chunk, CHUNK_CHARS)? == 0 {
                break;
            }
            ctx.output().write_all(chunk.as_bytes())?;
        }
        Ok(())
    }
}
