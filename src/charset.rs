//! Character set names, detection and incremental decoding.
//!
//! Raw (unparsed) content can be in any encoding. Handlers that work on text
//! decode it through [`CharDecoder`], which converts bytes to characters a
//! chunk at a time so the whole document is never held in memory. When no
//! charset is configured, a [`CharsetDetector`] guesses one from a sample of
//! leading bytes.

use std::io::Read;

use crate::content_type;
use crate::error::{Error, Result};

/// Size of the byte chunks read from the underlying stream.
const READ_CHUNK_SIZE: usize = 8192;

/// Character sets the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// UTF-8 (also used for US-ASCII)
    #[default]
    Utf8,
    /// UTF-16, little endian
    Utf16Le,
    /// UTF-16, big endian
    Utf16Be,
    /// ISO-8859-1 (Latin-1)
    Iso8859_1,
    /// Windows-1252
    Windows1252,
}

impl Charset {
    /// Look up a charset by name, ignoring case and common aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf-8" | "utf8" | "us-ascii" | "ascii" => Some(Self::Utf8),
            "utf-16le" | "utf16le" => Some(Self::Utf16Le),
            // Unmarked UTF-16 is big endian.
            "utf-16be" | "utf16be" | "utf-16" | "utf16" => Some(Self::Utf16Be),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => Some(Self::Iso8859_1),
            "windows-1252" | "cp1252" | "x-cp1252" => Some(Self::Windows1252),
            _ => None,
        }
    }

    /// Like [`Charset::from_name`], but an unknown name is an error.
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_name(name).ok_or_else(|| Error::Charset(name.to_string()))
    }

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Iso8859_1 => "ISO-8859-1",
            Self::Windows1252 => "windows-1252",
        }
    }
}

impl std::fmt::Display for Charset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Guesses the charset of raw content.
pub trait CharsetDetector: Send + Sync {
    /// Best-guess charset name for `sample`, or `None` if undetermined.
    fn detect(&self, sample: &[u8], content_type: Option<&str>) -> Option<String>;
}

/// Detector using byte-order marks, the declared content type, UTF-8
/// validity and a UTF-16 zero-byte heuristic, in that order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCharsetDetector;

impl CharsetDetector for DefaultCharsetDetector {
    fn detect(&self, sample: &[u8], content_type: Option<&str>) -> Option<String> {
        if sample.starts_with(&[0xEF, 0xBB, 0xBF]) {
            return Some(Charset::Utf8.name().to_string());
        }
        if sample.starts_with(&[0xFF, 0xFE]) {
            return Some(Charset::Utf16Le.name().to_string());
        }
        if sample.starts_with(&[0xFE, 0xFF]) {
            return Some(Charset::Utf16Be.name().to_string());
        }
        if let Some(declared) = content_type.and_then(content_type::charset_param) {
            if Charset::from_name(&declared).is_some() {
                return Some(declared);
            }
        }
        if sample.is_empty() {
            return None;
        }
        if let Some(utf16) = guess_utf16(sample) {
            return Some(utf16.name().to_string());
        }
        match std::str::from_utf8(sample) {
            Ok(_) => Some(Charset::Utf8.name().to_string()),
            Err(e) if e.error_len().is_none() => Some(Charset::Utf8.name().to_string()),
            Err(_) => Some(Charset::Windows1252.name().to_string()),
        }
    }
}

// Mostly-ASCII UTF-16 text has a zero in every other byte.
fn guess_utf16(sample: &[u8]) -> Option<Charset> {
    if sample.len() < 4 {
        return None;
    }
    let pairs = sample.len() / 2;
    let even_zeros = sample.iter().step_by(2).filter(|&&b| b == 0).count();
    let odd_zeros = sample.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();
    if odd_zeros * 10 >= pairs * 7 && even_zeros * 10 < pairs {
        Some(Charset::Utf16Le)
    } else if even_zeros * 10 >= pairs * 7 && odd_zeros * 10 < pairs {
        Some(Charset::Utf16Be)
    } else {
        None
    }
}

/// Resolve the charset to decode with, logging and falling back to UTF-8
/// when detection fails or yields an unsupported name.
pub fn resolve(
    detector: &dyn CharsetDetector,
    sample: &[u8],
    content_type: Option<&str>,
) -> Charset {
    match detector.detect(sample, content_type) {
        Some(name) => Charset::from_name(&name).unwrap_or_else(|| {
            log::warn!("Detected charset \"{}\" is not supported, falling back to UTF-8", name);
            Charset::Utf8
        }),
        None => {
            log::warn!("Could not detect charset, falling back to UTF-8");
            Charset::Utf8
        },
    }
}

/// Incremental byte-to-character decoder.
pub struct CharDecoder<R: Read> {
    reader: R,
    charset: Charset,
    pending: Vec<u8>,
    decoded: String,
    pos: usize,
    at_start: bool,
    eof: bool,
}

impl<R: Read> CharDecoder<R> {
    /// Decode `reader` as `charset`. A leading byte-order mark is dropped.
    pub fn new(reader: R, charset: Charset) -> Self {
        Self {
            reader,
            charset,
            pending: Vec::new(),
            decoded: String::new(),
            pos: 0,
            at_start: true,
            eof: false,
        }
    }

    /// Charset used for decoding.
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Append up to `max_chars` characters to `out`.
    ///
    /// Returns the number of characters appended; fewer than `max_chars`
    /// means the end of the stream was reached.
    pub fn read_chars(&mut self, out: &mut String, max_chars: usize) -> Result<usize> {
        let mut count = 0;
        while count < max_chars {
            if self.pos >= self.decoded.len() && !self.refill()? {
                break;
            }
            let available = &self.decoded[self.pos..];
            let wanted = max_chars - count;
            let mut taken = 0;
            let mut end = available.len();
            for (idx, _) in available.char_indices() {
                if taken == wanted {
                    end = idx;
                    break;
                }
                taken += 1;
            }
            out.push_str(&available[..end]);
            self.pos += end;
            count += taken;
        }
        Ok(count)
    }

    // Decode at least one more character. Returns false at end of stream.
    fn refill(&mut self) -> Result<bool> {
        self.decoded.clear();
        self.pos = 0;
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while self.decoded.is_empty() {
            if self.eof {
                if self.pending.is_empty() {
                    return Ok(false);
                }
                // Dangling partial sequence at end of input.
                self.pending.clear();
                self.decoded.push(char::REPLACEMENT_CHARACTER);
                break;
            }
            let n = self.reader.read(&mut chunk)?;
            if n == 0 {
                self.eof = true;
            } else {
                self.pending.extend_from_slice(&chunk[..n]);
            }
            self.decode_pending();
            if self.at_start && !self.decoded.is_empty() {
                self.at_start = false;
                if self.decoded.starts_with('\u{feff}') {
                    self.decoded.drain(..'\u{feff}'.len_utf8());
                }
            }
        }
        Ok(true)
    }

    fn decode_pending(&mut self) {
        match self.charset {
            Charset::Utf8 => self.decode_utf8(),
            Charset::Utf16Le => self.decode_utf16(u16::from_le_bytes),
            Charset::Utf16Be => self.decode_utf16(u16::from_be_bytes),
            Charset::Iso8859_1 => {
                self.decoded.extend(self.pending.drain(..).map(char::from));
            },
            Charset::Windows1252 => {
                self.decoded
                    .extend(self.pending.drain(..).map(windows_1252_char));
            },
        }
    }

    fn decode_utf8(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    self.decoded.push_str(s);
                    self.pending.clear();
                    return;
                },
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(s) = std::str::from_utf8(&self.pending[..valid]) {
                        self.decoded.push_str(s);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            self.decoded.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        },
                        None => {
                            // Incomplete sequence: wait for more bytes.
                            self.pending.drain(..valid);
                            return;
                        },
                    }
                },
            }
        }
    }

    fn decode_utf16(&mut self, to_unit: fn([u8; 2]) -> u16) {
        let usable = self.pending.len() - self.pending.len() % 2;
        let mut units: Vec<u16> = self.pending[..usable]
            .chunks_exact(2)
            .map(|pair| to_unit([pair[0], pair[1]]))
            .collect();
        let mut keep = self.pending.len() - usable;
        // Keep a trailing high surrogate for the next chunk.
        if !self.eof {
            if let Some(&last) = units.last() {
                if (0xD800..0xDC00).contains(&last) {
                    units.pop();
                    keep += 2;
                }
            }
        }
        self.decoded.extend(
            char::decode_utf16(units).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
        );
        let consumed = self.pending.len() - keep;
        self.pending.drain(..consumed);
    }
}

fn windows_1252_char(byte: u8) -> char {
    const HIGH: [char; 32] = [
        '\u{20AC}', '\u{81}', '\u{201A}', '\u{192}', '\u{201E}', '\u{2026}', '\u{2020}',
        '\u{2021}', '\u{2C6}', '\u{2030}', '\u{160}', '\u{2039}', '\u{152}', '\u{8D}', '\u{17D}',
        '\u{8F}', '\u{90}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}',
        '\u{2013}', '\u{2014}', '\u{2DC}', '\u{2122}', '\u{161}', '\u{203A}', '\u{153}', '\u{9D}',
        '\u{17E}', '\u{178}',
    ];
    match byte {
        0x80..=0x9F => HIGH[(byte - 0x80) as usize],
        _ => char::from(byte),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8], charset: Charset, step: usize) -> String {
        let mut decoder = CharDecoder::new(bytes, charset);
        let mut out = String::new();
        while decoder.read_chars(&mut out, step).unwrap() == step {}
        out
    }

    #[test]
    fn test_charset_names() {
        assert_eq!(Charset::from_name("utf8"), Some(Charset::Utf8));
        assert_eq!(Charset::from_name(" ISO_8859-1 "), Some(Charset::Iso8859_1));
        assert_eq!(Charset::from_name("CP1252"), Some(Charset::Windows1252));
        assert!(Charset::from_name("klingon").is_none());
        assert!(matches!(Charset::parse("klingon"), Err(Error::Charset(_))));
    }

    #[test]
    fn test_decode_utf8_small_steps() {
        let text = "héllo wörld ✓";
        assert_eq!(decode_all(text.as_bytes(), Charset::Utf8, 1), text);
        assert_eq!(decode_all(text.as_bytes(), Charset::Utf8, 5), text);
    }

    #[test]
    fn test_decode_utf8_split_across_reads() {
        // A reader returning one byte at a time splits every multi-byte char.
        struct OneByte<'a>(&'a [u8]);
        impl Read for OneByte<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.0.is_empty() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }
        let text = "日本語テキスト";
        let mut decoder = CharDecoder::new(OneByte(text.as_bytes()), Charset::Utf8);
        let mut out = String::new();
        assert_eq!(decoder.read_chars(&mut out, 100).unwrap(), 7);
        assert_eq!(out, text);
    }

    #[test]
    fn test_decode_utf8_invalid_bytes() {
        assert_eq!(decode_all(b"a\xffb", Charset::Utf8, 10), "a\u{fffd}b");
        assert_eq!(decode_all(b"ab\xe2\x82", Charset::Utf8, 10), "ab\u{fffd}");
    }

    #[test]
    fn test_decode_strips_bom() {
        assert_eq!(decode_all(b"\xef\xbb\xbfabc", Charset::Utf8, 2), "abc");
        assert_eq!(decode_all(b"\xff\xfea\x00b\x00", Charset::Utf16Le, 10), "ab");
    }

    #[test]
    fn test_decode_utf16() {
        let be: Vec<u8> = "hi 😀".encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        assert_eq!(decode_all(&be, Charset::Utf16Be, 2), "hi 😀");
        let le: Vec<u8> = "hi 😀".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(decode_all(&le, Charset::Utf16Le, 100), "hi 😀");
    }

    #[test]
    fn test_decode_single_byte_charsets() {
        assert_eq!(decode_all(b"caf\xe9", Charset::Iso8859_1, 10), "café");
        assert_eq!(decode_all(b"\x93quoted\x94 \x80", Charset::Windows1252, 10), "\u{201c}quoted\u{201d} €");
    }

    #[test]
    fn test_default_detector() {
        let detector = DefaultCharsetDetector;
        assert_eq!(detector.detect(b"\xef\xbb\xbfx", None).as_deref(), Some("UTF-8"));
        assert_eq!(detector.detect(b"plain", None).as_deref(), Some("UTF-8"));
        assert_eq!(detector.detect(b"caf\xe9 au lait", None).as_deref(), Some("windows-1252"));
        assert_eq!(
            detector.detect(b"caf\xe9", Some("text/plain; charset=ISO-8859-1")).as_deref(),
            Some("ISO-8859-1")
        );
        assert_eq!(detector.detect(b"a\x00b\x00c\x00d\x00", None).as_deref(), Some("UTF-16LE"));
        assert_eq!(detector.detect(b"", None), None);
    }

    #[test]
    fn test_resolve_falls_back_to_utf8() {
        struct Clueless;
        impl CharsetDetector for Clueless {
            fn detect(&self, _: &[u8], _: Option<&str>) -> Option<String> {
                None
            }
        }
        struct Exotic;
        impl CharsetDetector for Exotic {
            fn detect(&self, _: &[u8], _: Option<&str>) -> Option<String> {
                Some("EBCDIC-037".to_string())
            }
        }
        assert_eq!(resolve(&Clueless, b"x", None), Charset::Utf8);
        assert_eq!(resolve(&Exotic, b"x", None), Charset::Utf8);
    }
}
