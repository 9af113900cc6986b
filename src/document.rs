//! Document model shared by the parser engine and the handlers.
//!
//! A [`Document`] is created by the caller for a top-level input or by the
//! decomposition engine for an embedded one. Handlers mutate its metadata and
//! the parser replaces its content with extracted text, moving it from
//! [`ParseState::Unparsed`] to [`ParseState::Parsed`].

use crate::content::CachedContent;
use crate::handler::HandlerDoc;
use crate::properties::Properties;

/// Reserved metadata keys written by the importer.
pub mod keys {
    /// Document reference
    pub const REFERENCE: &str = "document.reference";
    /// Resolved content type
    pub const CONTENT_TYPE: &str = "document.contentType";
    /// Declared or detected content encoding
    pub const CONTENT_ENCODING: &str = "document.contentEncoding";
    /// Local name of an embedded document within its container
    pub const EMBEDDED_REFERENCE: &str = "document.embedded.reference";
    /// Reference of the direct container
    pub const EMBEDDED_PARENT_REFERENCE: &str = "document.embedded.parent.reference";
    /// Reference of the top-level document
    pub const EMBEDDED_ROOT_REFERENCE: &str = "document.embedded.root.reference";
    /// How the embedded document was named, see [`super::EmbeddedType`]
    pub const EMBEDDED_TYPE: &str = "document.embedded.type";

    /// Parser context: content type handed to the parser
    pub const PARSE_CONTENT_TYPE: &str = "Content-Type";
    /// Parser context: resource name handed to the parser
    pub const PARSE_RESOURCE_NAME: &str = "resourceName";
    /// Parser context: declared encoding handed to the parser
    pub const PARSE_CONTENT_ENCODING: &str = "Content-Encoding";
}

/// Separator between a container reference and an embedded document name.
pub const EMBEDDED_REFERENCE_SEPARATOR: char = '!';

/// Whether handlers see raw bytes or extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseState {
    /// Raw input bytes
    #[default]
    Unparsed,
    /// Extracted UTF-8 text
    Parsed,
}

impl ParseState {
    /// Whether the content is extracted text.
    pub fn is_parsed(self) -> bool {
        self == ParseState::Parsed
    }
}

/// How an embedded document got its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddedType {
    /// Entry of a package format (archive path)
    PackageFile,
    /// File embedded with its own resource name
    FileFile,
    /// Unnamed object; name synthesized from its content type
    FileObject,
    /// Unnamed object of unknown type
    Unknown,
}

impl EmbeddedType {
    /// Metadata value for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PackageFile => "package-file",
            Self::FileFile => "file-file",
            Self::FileObject => "file-object",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EmbeddedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linkage of a derived document to its container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embedding {
    /// Local name within the container
    pub embedded_reference: String,
    /// Reference of the direct container
    pub parent_reference: String,
    /// Reference of the top-level document
    pub root_reference: String,
    /// How the local name was obtained
    pub embedded_type: EmbeddedType,
}

/// A document flowing through the importer.
#[derive(Debug, Clone)]
pub struct Document {
    reference: String,
    /// Re-readable content: raw bytes before parsing, UTF-8 text after
    pub content: CachedContent,
    /// Document metadata
    pub metadata: Properties,
    /// Whether `content` holds raw bytes or extracted text
    pub parse_state: ParseState,
    /// Resolved content type
    pub content_type: Option<String>,
    /// Declared or detected charset of the raw content
    pub content_encoding: Option<String>,
    embedding: Option<Embedding>,
}

impl Document {
    /// New top-level document.
    pub fn new(reference: impl Into<String>, content: CachedContent) -> Self {
        Self {
            reference: reference.into(),
            content,
            metadata: Properties::new(),
            parse_state: ParseState::Unparsed,
            content_type: None,
            content_encoding: None,
            embedding: None,
        }
    }

    /// New document derived from a container.
    ///
    /// `metadata` is expected to be a copy of the container's metadata; the
    /// linkage keys are written into it.
    pub fn new_embedded(
        reference: impl Into<String>,
        content: CachedContent,
        metadata: Properties,
        embedding: Embedding,
    ) -> Self {
        let mut doc = Self {
            reference: reference.into(),
            content,
            metadata,
            parse_state: ParseState::Unparsed,
            content_type: None,
            content_encoding: None,
            embedding: None,
        };
        doc.metadata.set(keys::REFERENCE, doc.reference.clone());
        doc.metadata
            .set(keys::EMBEDDED_REFERENCE, embedding.embedded_reference.clone());
        doc.metadata
            .set(keys::EMBEDDED_PARENT_REFERENCE, embedding.parent_reference.clone());
        doc.metadata
            .set(keys::EMBEDDED_ROOT_REFERENCE, embedding.root_reference.clone());
        doc.metadata.set(keys::EMBEDDED_TYPE, embedding.embedded_type.as_str());
        doc.embedding = Some(embedding);
        doc
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the content encoding.
    pub fn with_content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    /// Set the metadata.
    pub fn with_metadata(mut self, metadata: Properties) -> Self {
        self.metadata = metadata;
        self
    }

    /// Unique document reference.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Linkage to the container, for derived documents.
    pub fn embedding(&self) -> Option<&Embedding> {
        self.embedding.as_ref()
    }

    /// Whether this document was derived from a container.
    pub fn is_embedded(&self) -> bool {
        self.embedding.is_some()
    }

    /// Reference of the top-level document of this tree.
    pub fn root_reference(&self) -> &str {
        self.embedding
            .as_ref()
            .map(|e| e.root_reference.as_str())
            .unwrap_or(&self.reference)
    }

    /// Reference of the direct container, for derived documents.
    pub fn parent_reference(&self) -> Option<&str> {
        self.embedding.as_ref().map(|e| e.parent_reference.as_str())
    }

    /// Borrow everything but the content as a handler view.
    pub fn handler_view(&mut self) -> HandlerDoc<'_> {
        HandlerDoc {
            reference: &self.reference,
            content_type: self.content_type.as_deref(),
            content_encoding: self.content_encoding.as_deref(),
            parse_state: self.parse_state,
            metadata: &mut self.metadata,
            embedding: self.embedding.as_ref(),
        }
    }
}

/// Build the reference of a document embedded in `parent_reference`.
pub fn embedded_reference(parent_reference: &str, name: &str) -> String {
    format!("{}{}{}", parent_reference, EMBEDDED_REFERENCE_SEPARATOR, name)
}
