//! Document handlers: filters, taggers, transformers and splitters.
//!
//! Handlers run in configured order before parsing (on raw content) and after
//! parsing (on extracted text). Each one is a small capability trait:
//!
//! - [`DocumentFilter`]: reports whether a document matches; the importer
//!   folds the results into one accept/reject decision with
//!   [`OnMatchCombinator`].
//! - [`DocumentTagger`]: adds or changes metadata.
//! - [`DocumentTransformer`]: rewrites content.
//! - [`DocumentSplitter`]: derives new documents from the content.
//!
//! Text-based implementations stream their input through a
//! [`SectionReader`](crate::text::SectionReader) with the helpers
//! [`filter_sections`], [`tag_sections`] and [`transform_sections`], so at
//! most one section of text is held in memory. Whether a handler runs at all
//! is decided first by its [`Restrictions`].

pub mod builtin;
pub mod filter;
pub mod restrictions;
pub mod splitter;
pub mod tagger;
pub mod transformer;

pub use filter::{
    combine_on_match, filter_sections, DocumentFilter, FilterOutcome, OnMatch, OnMatchCombinator,
};
pub use restrictions::{PropertyMatcher, Restrictions};
pub use splitter::{derive_document, suppress_self_reference, DocumentSplitter};
pub use tagger::{tag_sections, DocumentTagger};
pub use transformer::{transform_sections, DocumentTransformer};

use crate::document::{Embedding, ParseState};
use crate::properties::Properties;

/// The view of a document a handler works on.
///
/// Content is passed to handlers separately as a stream; everything else a
/// handler may read, plus mutable metadata, is here.
#[derive(Debug)]
pub struct HandlerDoc<'a> {
    /// Document reference
    pub reference: &'a str,
    /// Resolved content type
    pub content_type: Option<&'a str>,
    /// Declared or detected charset of raw content
    pub content_encoding: Option<&'a str>,
    /// Whether content is raw bytes or extracted text
    pub parse_state: ParseState,
    /// Document metadata
    pub metadata: &'a mut Properties,
    /// Container linkage of derived documents
    pub embedding: Option<&'a Embedding>,
}

impl HandlerDoc<'_> {
    /// Reference of the top-level document of this tree.
    pub fn root_reference(&self) -> &str {
        self.embedding
            .map(|e| e.root_reference.as_str())
            .unwrap_or(self.reference)
    }
}

/// One configured handler.
pub enum Handler {
    /// Accept/reject decision
    Filter(Box<dyn DocumentFilter>),
    /// Metadata enrichment
    Tagger(Box<dyn DocumentTagger>),
    /// Content rewriting
    Transformer(Box<dyn DocumentTransformer>),
    /// Derived-document production
    Splitter(Box<dyn DocumentSplitter>),
}

impl Handler {
    /// Name used in logs and errors.
    pub fn name(&self) -> &str {
        match self {
            Handler::Filter(h) => h.name(),
            Handler::Tagger(h) => h.name(),
            Handler::Transformer(h) => h.name(),
            Handler::Splitter(h) => h.name(),
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Handler::Filter(_) => "Filter",
            Handler::Tagger(_) => "Tagger",
            Handler::Transformer(_) => "Transformer",
            Handler::Splitter(_) => "Splitter",
        };
        write!(f, "{}({})", kind, self.name())
    }
}

/// A handler together with the restrictions deciding when it applies.
#[derive(Debug)]
pub struct HandlerEntry {
    /// The handler
    pub handler: Handler,
    /// Applicability predicate
    pub restrictions: Restrictions,
}

impl HandlerEntry {
    /// Handler applying to every document.
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            restrictions: Restrictions::default(),
        }
    }

    /// Set the restrictions.
    pub fn with_restrictions(mut self, restrictions: Restrictions) -> Self {
        self.restrictions = restrictions;
        self
    }

    /// Unrestricted filter entry.
    pub fn filter(filter: impl DocumentFilter + 'static) -> Self {
        Self::new(Handler::Filter(Box::new(filter)))
    }

    /// Unrestricted tagger entry.
    pub fn tagger(tagger: impl DocumentTagger + 'static) -> Self {
        Self::new(Handler::Tagger(Box::new(tagger)))
    }

    /// Unrestricted transformer entry.
    pub fn transformer(transformer: impl DocumentTransformer + 'static) -> Self {
        Self::new(Handler::Transformer(Box::new(transformer)))
    }

    /// Unrestricted splitter entry.
    pub fn splitter(splitter: impl DocumentSplitter + 'static) -> Self {
        Self::new(Handler::Splitter(Box::new(splitter)))
    }
}
