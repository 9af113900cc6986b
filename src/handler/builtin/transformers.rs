use regex::Regex;
use std::io::{Read, Write};

use crate::error::Result;
use crate::handler::{transform_sections, DocumentTransformer, HandlerDoc};
use crate::text::TextOptions;

/// Replaces every match of a pattern in the document text.
///
/// Replacement happens per section: a match spanning a section boundary is
/// not replaced. `$1`-style group references are expanded.
#[derive(Debug, Clone)]
pub struct ReplaceTransformer {
    pattern: Regex,
    replacement: String,
    text: TextOptions,
}

impl ReplaceTransformer {
    /// Replace matches of `pattern` with `replacement`.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
            text: TextOptions::default(),
        })
    }

    /// Set the text streaming options.
    pub fn with_text_options(mut self, text: TextOptions) -> Self {
        self.text = text;
        self
    }
}

impl DocumentTransformer for ReplaceTransformer {
    fn name(&self) -> &str {
        "ReplaceTransformer"
    }

    fn transform_document(
        &self,
        doc: &mut HandlerDoc<'_>,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()> {
        let mut sections = self.text.sections(input, doc)?;
        transform_sections(&mut sections, output, |section, _| {
            Ok(self
                .pattern
                .replace_all(section, self.replacement.as_str())
                .into_owned())
        })
    }
}
