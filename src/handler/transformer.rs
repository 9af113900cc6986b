//! Transformers: content rewriting.
//!
//! Transformers write their result to an output sink instead of returning it,
//! one section at a time, so output order follows section order and only one
//! section is ever held in memory. Output is always UTF-8.

use std::io::{Read, Write};

use crate::error::Result;
use crate::handler::HandlerDoc;
use crate::text::SectionReader;

/// A document transformer.
pub trait DocumentTransformer: Send + Sync {
    /// Transformer name for logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Write the transformed content of `doc` to `output` as UTF-8.
    ///
    /// Text-based transformers should stream `input` through
    /// [`transform_sections`].
    fn transform_document(
        &self,
        doc: &mut HandlerDoc<'_>,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()>;
}

/// Transform each section and write it out before reading the next one.
pub fn transform_sections<R, F>(
    sections: &mut SectionReader<R>,
    output: &mut dyn Write,
    mut transform: F,
) -> Result<()>
where
    R: Read,
    F: FnMut(&str, usize) -> Result<String>,
{
    let mut index = 0;
    while let Some(section) = sections.next_section()? {
        let transformed = transform(&section, index)?;
        output.write_all(transformed.as_bytes())?;
        index += 1;
    }
    output.flush()?;
    Ok(())
}
