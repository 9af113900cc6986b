//! Parsers and the parse/decompose engine.
//!
//! A [`DocumentParser`] turns raw content into UTF-8 text written to an output
//! sink, plus metadata. Container formats also report their embedded
//! documents to the [`ParseContext`]; the engine in [`decompose`] decides
//! whether those are merged into the container or split out as derived
//! documents.
//!
//! Parsers are looked up by content type in a [`ParserRegistry`], which hands
//! shared [`ParseHints`] to every [`HintAwareParser`] once, on first use.

pub mod archive;
pub mod decompose;
pub mod hints;
pub mod ocr;
pub mod registry;
pub mod text;

pub use archive::ZipParser;
pub use decompose::{decompose, MAX_EMBEDDING_DEPTH};
pub use hints::{
    DecomposeMode, EmbeddedConfig, EmbeddedHints, OcrConfig, OcrHints, ParseHints,
};
pub use ocr::OcrParser;
pub use registry::{ParserRegistry, ParserRegistryBuilder};
pub use text::PlainTextParser;

use std::io::{Read, Write};

use crate::content::ReadSeek;
use crate::document::keys;
use crate::error::Result;
use crate::properties::Properties;

/// A content parser.
pub trait DocumentParser: Send + Sync {
    /// Parser name for logs.
    fn name(&self) -> &str;

    /// Extract the text of `input` into `ctx`.
    ///
    /// Metadata found in the document is added to `ctx.metadata`, which is
    /// seeded with the content type, resource name and declared encoding.
    /// Embedded documents are reported through
    /// [`ParseContext::handle_embedded`].
    fn parse(&self, input: &mut dyn ReadSeek, ctx: &mut ParseContext<'_>) -> Result<()>;

    /// The hint-aware side of this parser, if it has one.
    fn as_hint_aware(&mut self) -> Option<&mut dyn HintAwareParser> {
        None
    }
}

/// A parser that uses registry-wide hints.
pub trait HintAwareParser {
    /// Receive the registry hints. Called once, before the first parse.
    fn init_hints(&mut self, hints: &ParseHints);
}

/// Naming information of an embedded document, as exposed by its container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedNode {
    /// Path inside a package format (e.g. an archive entry)
    pub package_path: Option<String>,
    /// Resource name the format stores with the embedded file
    pub resource_name: Option<String>,
    /// Content type declared by the container
    pub content_type: Option<String>,
}

impl EmbeddedNode {
    /// Entry of a package format.
    pub fn package_entry(path: impl Into<String>) -> Self {
        Self {
            package_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Embedded file with its own name.
    pub fn named(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: Some(resource_name.into()),
            ..Self::default()
        }
    }

    /// Embedded object without a name.
    pub fn unnamed() -> Self {
        Self::default()
    }

    /// Set the declared content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Receives embedded documents found while parsing.
pub trait EmbeddedHandler {
    /// Whether embedded documents are wanted at all.
    fn wants_embedded(&self) -> bool;

    /// Handle one embedded document. Text it contributes to the container
    /// goes to `output`.
    fn handle_embedded(
        &mut self,
        node: EmbeddedNode,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()>;
}

/// Embedded handler discarding everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreEmbedded;

impl EmbeddedHandler for IgnoreEmbedded {
    fn wants_embedded(&self) -> bool {
        false
    }

    fn handle_embedded(
        &mut self,
        _node: EmbeddedNode,
        _input: &mut dyn Read,
        _output: &mut dyn Write,
    ) -> Result<()> {
        Ok(())
    }
}

/// Where a parser writes its results.
pub struct ParseContext<'a> {
    /// Parser metadata: seeded context keys plus extracted fields
    pub metadata: &'a mut Properties,
    output: &'a mut dyn Write,
    embedded: &'a mut dyn EmbeddedHandler,
}

impl<'a> ParseContext<'a> {
    /// Context writing text to `output` and embedded documents to `embedded`.
    pub fn new(
        metadata: &'a mut Properties,
        output: &'a mut dyn Write,
        embedded: &'a mut dyn EmbeddedHandler,
    ) -> Self {
        Self {
            metadata,
            output,
            embedded,
        }
    }

    /// Text output.
    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.output
    }

    /// Content type being parsed.
    pub fn content_type(&self) -> Option<&str> {
        self.metadata.get(keys::PARSE_CONTENT_TYPE)
    }

    /// Resource name being parsed.
    pub fn resource_name(&self) -> Option<&str> {
        self.metadata.get(keys::PARSE_RESOURCE_NAME)
    }

    /// Declared content encoding.
    pub fn content_encoding(&self) -> Option<&str> {
        self.metadata.get(keys::PARSE_CONTENT_ENCODING)
    }

    /// Whether reporting embedded documents is worthwhile.
    pub fn wants_embedded(&self) -> bool {
        self.embedded.wants_embedded()
    }

    /// Report an embedded document.
    pub fn handle_embedded(&mut self, node: EmbeddedNode, input: &mut dyn Read) -> Result<()> {
        self.embedded.handle_embedded(node, input, &mut *self.output)
    }
}

/// Metadata seeded before parsing.
pub fn context_metadata(
    content_type: &str,
    resource_name: &str,
    content_encoding: Option<&str>,
) -> Properties {
    let mut metadata = Properties::new();
    metadata.set(keys::PARSE_CONTENT_TYPE, content_type);
    metadata.set(keys::PARSE_RESOURCE_NAME, resource_name);
    if let Some(encoding) = content_encoding {
        metadata.set(keys::PARSE_CONTENT_ENCODING, encoding);
    }
    metadata
}
