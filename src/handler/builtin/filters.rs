use regex::Regex;
use std::io::Read;

use crate::error::Result;
use crate::handler::restrictions::whole_value_regex;
use crate::handler::{filter_sections, DocumentFilter, HandlerDoc, OnMatch};
use crate::text::TextOptions;

/// Matches documents whose text contains a pattern.
///
/// Content is streamed section by section and reading stops at the first
/// section containing a match.
#[derive(Debug, Clone)]
pub struct RegexContentFilter {
    pattern: Regex,
    on_match: OnMatch,
    text: TextOptions,
}

impl RegexContentFilter {
    /// Filter including documents containing `pattern`.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            on_match: OnMatch::Include,
            text: TextOptions::default(),
        })
    }

    /// Set the match disposition.
    pub fn with_on_match(mut self, on_match: OnMatch) -> Self {
        self.on_match = on_match;
        self
    }

    /// Set the text streaming options.
    pub fn with_text_options(mut self, text: TextOptions) -> Self {
        self.text = text;
        self
    }
}

impl DocumentFilter for RegexContentFilter {
    fn name(&self) -> &str {
        "RegexContentFilter"
    }

    fn on_match(&self) -> OnMatch {
        self.on_match
    }

    fn is_match(&self, doc: &HandlerDoc<'_>, input: &mut dyn Read) -> Result<bool> {
        let mut sections = self.text.sections(input, doc)?;
        filter_sections(&mut sections, |section, _| Ok(self.pattern.is_match(section)))
    }
}

/// Matches documents with a metadata value matching a pattern.
///
/// The whole value must match. Content is not read.
#[derive(Debug, Clone)]
pub struct RegexMetadataFilter {
    field: String,
    pattern: Regex,
    on_match: OnMatch,
}

impl RegexMetadataFilter {
    /// Filter including documents whose `field` has a value matching `pattern`.
    pub fn new(field: impl Into<String>, pattern: &str, case_sensitive: bool) -> Result<Self> {
        Ok(Self {
            field: field.into(),
            pattern: whole_value_regex(pattern, case_sensitive)?,
            on_match: OnMatch::Include,
        })
    }

    /// Set the match disposition.
    pub fn with_on_match(mut self, on_match: OnMatch) -> Self {
        self.on_match = on_match;
        self
    }
}

impl DocumentFilter for RegexMetadataFilter {
    fn name(&self) -> &str {
        "RegexMetadataFilter"
    }

    fn on_match(&self) -> OnMatch {
        self.on_match
    }

    fn is_match(&self, doc: &HandlerDoc<'_>, _input: &mut dyn Read) -> Result<bool> {
        Ok(doc
            .metadata
            .get_values(&self.field)
            .iter()
            .any(|v| self.pattern.is_match(v)))
    }
}
