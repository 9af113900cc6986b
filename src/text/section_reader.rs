//! Bounded, boundary-aware text reader.
//!
//! [`SectionReader`] hands out decoded text in sections of at most
//! `max_read_size` characters. Each section ends, when possible, after the
//! last paragraph break in the buffer, otherwise after the last sentence end,
//! otherwise after the last whitespace, and only as a last resort exactly at
//! the limit. Text following the break is carried into the next section, so
//! the reader never holds more than one section's worth of characters.

use lazy_static::lazy_static;
use regex::Regex;
use std::io::Read;

use crate::charset::CharDecoder;
use crate::error::Result;

/// Default maximum number of characters per section.
pub const DEFAULT_MAX_READ_SIZE: usize = 10 * 1024;

lazy_static! {
    /// Blank line (possibly with trailing spaces or CRs)
    static ref RE_PARAGRAPH: Regex = Regex::new(r"\n[ \t\r\x0C]*\n").unwrap();

    /// Sentence terminator, optional closing quotes/brackets, then whitespace
    static ref RE_SENTENCE: Regex = Regex::new(r#"[.!?][)"'\]\u{201D}\u{2019}]*\s"#).unwrap();

    /// Any whitespace
    static ref RE_WORD: Regex = Regex::new(r"\s").unwrap();
}

/// Where a section was cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionBreak {
    /// After a blank line
    Paragraph,
    /// After a sentence terminator
    Sentence,
    /// After whitespace
    Word,
    /// Exactly at the size limit
    Limit,
    /// End of the text
    End,
}

/// Reads decoded text one bounded section at a time.
pub struct SectionReader<R: Read> {
    decoder: CharDecoder<R>,
    max_read_size: usize,
    buffer: String,
    buffer_chars: usize,
    sections_read: usize,
    last_break: Option<SectionBreak>,
}

impl<R: Read> SectionReader<R> {
    /// Read sections of at most `max_read_size` characters from `decoder`.
    ///
    /// A zero `max_read_size` is treated as [`DEFAULT_MAX_READ_SIZE`].
    pub fn new(decoder: CharDecoder<R>, max_read_size: usize) -> Self {
        let max_read_size = if max_read_size == 0 {
            DEFAULT_MAX_READ_SIZE
        } else {
            max_read_size
        };
        Self {
            decoder,
            max_read_size,
            buffer: String::new(),
            buffer_chars: 0,
            sections_read: 0,
            last_break: None,
        }
    }

    /// Maximum characters per section.
    pub fn max_read_size(&self) -> usize {
        self.max_read_size
    }

    /// Number of sections returned so far.
    pub fn sections_read(&self) -> usize {
        self.sections_read
    }

    /// How the most recent section was cut.
    pub fn last_break(&self) -> Option<SectionBreak> {
        self.last_break
    }

    /// Next section, or `None` once the text is exhausted.
    pub fn next_section(&mut self) -> Result<Option<String>> {
        let wanted = self.max_read_size - self.buffer_chars;
        let read = self.decoder.read_chars(&mut self.buffer, wanted)?;
        self.buffer_chars += read;

        if self.buffer.is_empty() {
            return Ok(None);
        }

        let (section, kind) = if read < wanted {
            (std::mem::take(&mut self.buffer), SectionBreak::End)
        } else {
            let (cut, kind) = find_break(&self.buffer);
            let rest = self.buffer.split_off(cut);
            (std::mem::replace(&mut self.buffer, rest), kind)
        };
        self.buffer_chars = self.buffer.chars().count();
        self.sections_read += 1;
        self.last_break = Some(kind);
        Ok(Some(section))
    }
}

// Byte offset to cut at (exclusive) and the kind of boundary found.
fn find_break(text: &str) -> (usize, SectionBreak) {
    let candidates: [(&Regex, SectionBreak); 3] = [
        (&*RE_PARAGRAPH, SectionBreak::Paragraph),
        (&*RE_SENTENCE, SectionBreak::Sentence),
        (&*RE_WORD, SectionBreak::Word),
    ];
    for (re, kind) in candidates {
        if let Some(m) = re.find_iter(text).last() {
            if m.end() > 0 {
                return (m.end(), kind);
            }
        }
    }
    (text.len(), SectionBreak::Limit)
}

impl<R: Read> Iterator for SectionReader<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_section().transpose()
    }
}
