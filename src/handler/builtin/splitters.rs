use regex::Regex;
use std::io::Read;

use crate::content::{CachedContent, ContentCache};
use crate::content_type::TEXT_PLAIN;
use crate::document::{Document, EmbeddedType};
use crate::error::Result;
use crate::handler::{derive_document, suppress_self_reference, DocumentSplitter, HandlerDoc};
use crate::text::TextOptions;

/// Splits out every match of a selector pattern as its own document.
///
/// Matches are found per section and named `split-<n>.txt`, numbered from 1.
/// A selector matching the entire document produces nothing.
#[derive(Debug, Clone)]
pub struct RegexSplitter {
    selector: Regex,
    text: TextOptions,
}

struct Selected {
    content: CachedContent,
    whole_section: bool,
}

impl RegexSplitter {
    /// Splitter emitting each match of `selector`.
    pub fn new(selector: &str) -> Result<Self> {
        Ok(Self {
            selector: Regex::new(selector)?,
            text: TextOptions::default(),
        })
    }

    /// Set the text streaming options.
    pub fn with_text_options(mut self, text: TextOptions) -> Self {
        self.text = text;
        self
    }
}

impl DocumentSplitter for RegexSplitter {
    fn name(&self) -> &str {
        "RegexSplitter"
    }

    fn split_document(
        &self,
        doc: &mut HandlerDoc<'_>,
        input: &mut dyn Read,
        cache: &ContentCache,
    ) -> Result<Vec<Document>> {
        let mut sections = self.text.sections(input, doc)?;
        let mut selected = Vec::new();
        while let Some(section) = sections.next_section()? {
            for m in self.selector.find_iter(&section) {
                if m.as_str().is_empty() {
                    continue;
                }
                let mut bytes = m.as_str().as_bytes();
                selected.push(Selected {
                    content: CachedContent::from_reader(&mut bytes, cache)?,
                    whole_section: m.start() == 0 && m.end() == section.len(),
                });
            }
        }
        let single_section = sections.sections_read() == 1;
        let selected =
            suppress_self_reference(selected, |s| Ok(single_section && s.whole_section))?;

        Ok(selected
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let name = format!("split-{}.txt", i + 1);
                derive_document(doc, &name, s.content, EmbeddedType::FileObject)
                    .with_content_type(TEXT_PLAIN)
                    .with_content_encoding("UTF-8")
            })
            .collect())
    }
}
