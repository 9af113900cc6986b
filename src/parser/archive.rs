//! ZIP archive parser.

use std::io::Write;

use zip::ZipArchive;

use crate::content::ReadSeek;
use crate::error::{Error, Result};
use crate::parser::{DocumentParser, EmbeddedNode, ParseContext};

/// Lists archive entries and reports each file entry as an embedded document.
///
/// The container text is one line per file entry name. Directory entries
/// are skipped. Entry content is never read unless embedded documents are
/// wanted.
///
/// The number of file entries is stored in `archive.entries`. When nested
/// archives are merged into their container, each archive's count is merged
/// into that same field, outermost first. Equal counts collapse into one
/// value, so only the first value reliably belongs to the outermost archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipParser;

impl ZipParser {
    /// New ZIP parser.
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for ZipParser {
    fn name(&self) -> &str {
        "ZipParser"
    }

    fn parse(&self, input: &mut dyn ReadSeek, ctx: &mut ParseContext<'_>) -> Result<()> {
        let mut archive = ZipArchive::new(&mut *input)
            .map_err(|e| Error::Archive(format!("Failed to open ZIP archive: {}", e)))?;

        let mut file_count = 0usize;
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| Error::Archive(format!("Failed to read ZIP entry {}: {}", i, e)))?;
            if entry.is_dir() {
                continue;
            }
            file_count += 1;
            let name = entry.name().to_string();
            writeln!(ctx.output(), "{}", name)?;
            if ctx.wants_embedded() {
                ctx.handle_embedded(EmbeddedNode::package_entry(name), &mut entry)?;
            }
        }
        ctx.metadata.set("archive.entries", file_count.to_string());
        Ok(())
    }
}
