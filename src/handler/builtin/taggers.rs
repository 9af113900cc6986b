use std::io::Read;

use crate::error::Result;
use crate::handler::{tag_sections, DocumentTagger, HandlerDoc};
use crate::text::TextOptions;

/// Adds fixed metadata values.
#[derive(Debug, Clone, Default)]
pub struct ConstantTagger {
    constants: Vec<(String, Vec<String>)>,
    replace: bool,
}

impl ConstantTagger {
    /// Tagger adding no values yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `values` to `field`.
    pub fn with_constant<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.constants
            .push((field.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Replace existing field values instead of appending to them.
    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

impl DocumentTagger for ConstantTagger {
    fn name(&self) -> &str {
        "ConstantTagger"
    }

    fn tag_document(&self, doc: &mut HandlerDoc<'_>, _input: &mut dyn Read) -> Result<()> {
        for (field, values) in &self.constants {
            if self.replace {
                doc.metadata.set_all(field, values.iter().cloned());
            } else {
                doc.metadata.add_all(field, values.iter().cloned());
            }
        }
        Ok(())
    }
}

/// Records character, word and section counts of the document text.
///
/// Fields are `<prefix>.characters`, `<prefix>.words` and `<prefix>.sections`.
#[derive(Debug, Clone)]
pub struct TextStatisticsTagger {
    prefix: String,
    text: TextOptions,
}

impl Default for TextStatisticsTagger {
    fn default() -> Self {
        Self {
            prefix: "document.stats".to_string(),
            text: TextOptions::default(),
        }
    }
}

impl TextStatisticsTagger {
    /// Tagger writing under the default `document.stats` prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the text streaming options.
    pub fn with_text_options(mut self, text: TextOptions) -> Self {
        self.text = text;
        self
    }
}

impl DocumentTagger for TextStatisticsTagger {
    fn name(&self) -> &str {
        "TextStatisticsTagger"
    }

    fn tag_document(&self, doc: &mut HandlerDoc<'_>, input: &mut dyn Read) -> Result<()> {
        let mut sections = self.text.sections(input, doc)?;
        let mut characters = 0usize;
        let mut words = 0usize;
        // A word cut at the section limit continues in the next section.
        let mut in_word = false;
        tag_sections(&mut sections, |section, _| {
            for c in section.chars() {
                characters += 1;
                if c.is_whitespace() {
                    in_word = false;
                } else if !in_word {
                    in_word = true;
                    words += 1;
                }
            }
            Ok(())
        })?;
        let section_count = sections.sections_read();

        doc.metadata
            .set(&format!("{}.characters", self.prefix), characters.to_string());
        doc.metadata
            .set(&format!("{}.words", self.prefix), words.to_string());
        doc.metadata
            .set(&format!("{}.sections", self.prefix), section_count.to_string());
        Ok(())
    }
}
