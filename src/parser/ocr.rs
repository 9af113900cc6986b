//! Image text extraction through an external OCR executable.

use std::io::{self, Write};
use std::process::Command;

use crate::content::ReadSeek;
use crate::error::{Error, Result};
use crate::parser::hints::{OcrHints, ParseHints};
use crate::parser::{DocumentParser, HintAwareParser, ParseContext};

/// Runs OCR on image content when the registry's OCR hints allow it.
///
/// Without usable OCR hints, or for content types outside the OCR
/// restriction, no text is extracted.
#[derive(Debug, Clone, Default)]
pub struct OcrParser {
    ocr: Option<OcrHints>,
}

impl OcrParser {
    /// Parser that does nothing until it receives OCR hints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether OCR hints were received.
    pub fn is_enabled(&self) -> bool {
        self.ocr.is_some()
    }
}

impl HintAwareParser for OcrParser {
    fn init_hints(&mut self, hints: &ParseHints) {
        self.ocr = hints.ocr.clone();
    }
}

impl DocumentParser for OcrParser {
    fn name(&self) -> &str {
        "OcrParser"
    }

    fn parse(&self, input: &mut dyn ReadSeek, ctx: &mut ParseContext<'_>) -> Result<()> {
        let Some(ocr) = &self.ocr else {
            log::debug!("OCR not enabled, no text extracted");
            return Ok(());
        };
        let content_type = ctx.content_type().unwrap_or_default().to_string();
        if !ocr.applies_to(&content_type) {
            log::debug!("OCR not applicable to {}", content_type);
            return Ok(());
        }

        let mut image = tempfile::NamedTempFile::new()?;
        io::copy(input, &mut image)?;
        image.flush()?;

        let mut command = Command::new(&ocr.executable);
        command.arg(image.path()).arg("stdout");
        if !ocr.languages.is_empty() {
            command.arg("-l").arg(ocr.languages.join("+"));
        }
        log::debug!("Running OCR: {:?}", command);
        let result = command.output()?;
        if !result.status.success() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "OCR exited with {}: {}",
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            )));
        }
        ctx.output().write_all(&result.stdout)?;
        if !ocr.languages.is_empty() {
            ctx.metadata.set("ocr.languages", ocr.languages.join("+"));
        }
        Ok(())
    }

    fn as_hint_aware(&mut self) -> Option<&mut dyn HintAwareParser> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::hints::OcrConfig;
    use crate::parser::{context_metadata, IgnoreEmbedded};
    use std::io::Cursor;

    fn run(parser: &OcrParser, content_type: &str) -> Result<String> {
        let mut meta = context_metadata(content_type, "scan.png", None);
        let mut out = Vec::new();
        let mut sink = IgnoreEmbedded;
        {
            let mut ctx = ParseContext::new(&mut meta, &mut out, &mut sink);
            parser.parse(&mut Cursor::new(b"\x89PNG".to_vec()), &mut ctx)?;
        }
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_disabled_without_hints() {
        let parser = OcrParser::new();
        assert!(!parser.is_enabled());
        assert_eq!(run(&parser, "image/png").unwrap(), "");
    }

    #[test]
    fn test_disabled_when_ocr_hints_missing() {
        let mut parser = OcrParser::new();
        parser.init_hints(&ParseHints::default());
        assert!(!parser.is_enabled());
    }

    #[test]
    fn test_content_type_restriction() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("fake-ocr");
        std::fs::write(&exe, b"").unwrap();
        let hints = ParseHints {
            ocr: OcrConfig::default()
                .with_path(&exe)
                .with_content_types("image/tiff")
                .validate()
                .unwrap(),
            ..ParseHints::default()
        };
        let mut parser = OcrParser::new();
        parser.init_hints(&hints);
        assert!(parser.is_enabled());
        // Outside the restriction the executable is never started.
        assert_eq!(run(&parser, "image/png").unwrap(), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_executable_and_captures_stdout() {
        let echo = std::path::Path::new("/bin/echo");
        if !echo.is_file() {
            return;
        }
        let hints = ParseHints {
            ocr: OcrConfig::default()
                .with_path(echo)
                .with_languages(["eng", "deu"])
                .validate()
                .unwrap(),
            ..ParseHints::default()
        };
        let mut parser = OcrParser::new();
        parser.init_hints(&hints);
        let text = run(&parser, "image/png").unwrap();
        assert!(text.ends_with(" stdout -l eng+deu\n"), "{:?}", text);
    }
}
