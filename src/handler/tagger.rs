//! Taggers: metadata enrichment.

use std::io::Read;

use crate::error::Result;
use crate::handler::HandlerDoc;
use crate::text::SectionReader;

/// A document tagger.
pub trait DocumentTagger: Send + Sync {
    /// Tagger name for logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Add or modify metadata of `doc`.
    ///
    /// `input` streams the document content; text-based taggers should read
    /// it through [`tag_sections`].
    fn tag_document(&self, doc: &mut HandlerDoc<'_>, input: &mut dyn Read) -> Result<()>;
}

/// Call `tag` for each section in order.
///
/// A document without any text still gets exactly one call, with an empty
/// section and index 0. All sections are read even if `tag` ignores them.
pub fn tag_sections<R, F>(sections: &mut SectionReader<R>, mut tag: F) -> Result<()>
where
    R: Read,
    F: FnMut(&str, usize) -> Result<()>,
{
    let mut index = 0;
    while let Some(section) = sections.next_section()? {
        tag(&section, index)?;
        index += 1;
    }
    if index == 0 {
        tag("", 0)?;
    }
    Ok(())
}
