//! The import pipeline.
//!
//! [`Importer::import_document`] runs one document through:
//!
//! 1. content type resolution (when the caller did not supply one);
//! 2. pre-parse handlers, on raw content;
//! 3. parser dispatch and decomposition, replacing the content with
//!    extracted UTF-8 text (ignored content types pass through unchanged);
//! 4. post-parse handlers, on extracted text;
//! 5. the same pipeline, recursively, for every derived document produced by
//!    the parser or by splitters.
//!
//! Filters are folded into a single decision with [`OnMatchCombinator`]; a
//! rejected document is not parsed further and produces no derived documents.

use crate::content::{CachedContent, ContentCache};
use crate::content_type::{self, SNIFF_LENGTH};
use crate::document::{keys, Document, ParseState};
use crate::error::{Error, Result};
use crate::handler::{FilterOutcome, Handler, HandlerEntry, OnMatch, OnMatchCombinator};
use crate::parser::{decompose, ParserRegistry};

/// Content encoding of parsed and transformed content.
const EXTRACTED_ENCODING: &str = "UTF-8";

/// Outcome of importing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImporterStatus {
    /// Imported
    Success,
    /// Rejected by filters
    Rejected {
        /// Rejecting filter (or the unmatched include filters)
        filter: String,
    },
    /// Processing failed; only used for derived documents
    Error {
        /// Error description
        message: String,
    },
}

/// Result of importing a document and, recursively, its derived documents.
#[derive(Debug)]
pub struct ImporterResponse {
    /// Document reference
    pub reference: String,
    /// Outcome
    pub status: ImporterStatus,
    /// The imported document, on success
    pub document: Option<Document>,
    /// Responses of derived documents, in the order they were produced
    pub nested: Vec<ImporterResponse>,
}

impl ImporterResponse {
    fn new(reference: String, status: ImporterStatus) -> Self {
        Self {
            reference,
            status,
            document: None,
            nested: Vec::new(),
        }
    }

    /// Whether the document was imported.
    pub fn is_success(&self) -> bool {
        self.status == ImporterStatus::Success
    }

    /// This response and all nested ones, depth first.
    pub fn flatten(&self) -> Vec<&ImporterResponse> {
        let mut all = vec![self];
        for child in &self.nested {
            all.extend(child.flatten());
        }
        all
    }

    /// Find a response by reference anywhere in the tree.
    pub fn find(&self, reference: &str) -> Option<&ImporterResponse> {
        self.flatten().into_iter().find(|r| r.reference == reference)
    }
}

/// Runs documents through handlers and parsers.
#[derive(Debug)]
pub struct Importer {
    registry: ParserRegistry,
    pre_parse_handlers: Vec<HandlerEntry>,
    post_parse_handlers: Vec<HandlerEntry>,
    cache: ContentCache,
}

enum Stage {
    Continue(Vec<Document>),
    Rejected(String),
}

impl Importer {
    /// Importer parsing with `registry` and no handlers.
    pub fn new(registry: ParserRegistry) -> Self {
        Self {
            registry,
            pre_parse_handlers: Vec::new(),
            post_parse_handlers: Vec::new(),
            cache: ContentCache::default(),
        }
    }

    /// Append a handler run on raw content.
    pub fn with_pre_parse_handler(mut self, entry: HandlerEntry) -> Self {
        self.pre_parse_handlers.push(entry);
        self
    }

    /// Append a handler run on extracted text.
    pub fn with_post_parse_handler(mut self, entry: HandlerEntry) -> Self {
        self.post_parse_handlers.push(entry);
        self
    }

    /// Set the content cache used for parser and transformer output.
    pub fn with_cache(mut self, cache: ContentCache) -> Self {
        self.cache = cache;
        self
    }

    /// The parser registry.
    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// The content cache.
    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Import `document` and every document derived from it.
    ///
    /// A failure of the document itself is returned as an error. Failures of
    /// derived documents are reported in their own response.
    pub fn import_document(&self, mut document: Document) -> Result<ImporterResponse> {
        let reference = document.reference().to_string();
        let stage = self
            .process(&mut document)
            .map_err(|e| with_reference(&reference, e))?;
        let derived = match stage {
            Stage::Rejected(filter) => {
                log::info!("Rejected \"{}\" by {}", reference, filter);
                return Ok(ImporterResponse::new(
                    reference,
                    ImporterStatus::Rejected { filter },
                ));
            },
            Stage::Continue(derived) => derived,
        };

        let mut response = ImporterResponse::new(reference, ImporterStatus::Success);
        for child in derived {
            let child_reference = child.reference().to_string();
            match self.import_document(child) {
                Ok(nested) => response.nested.push(nested),
                Err(e) => {
                    log::warn!("Could not import \"{}\": {}", child_reference, e);
                    response.nested.push(ImporterResponse::new(
                        child_reference,
                        ImporterStatus::Error {
                            message: e.to_string(),
                        },
                    ));
                },
            }
        }
        response.document = Some(document);
        Ok(response)
    }

    fn process(&self, doc: &mut Document) -> Result<Stage> {
        self.resolve_content_type(doc)?;

        let mut derived = match self.run_handlers(&self.pre_parse_handlers, doc)? {
            Stage::Continue(derived) => derived,
            rejected => return Ok(rejected),
        };

        let content_type = doc.content_type.clone().unwrap_or_default();
        match self.registry.get_parser(doc.reference(), &content_type) {
            Some(parser) => {
                let mut writer = self.cache.writer();
                let found = decompose(&self.registry, parser.as_ref(), doc, &mut writer, &self.cache)?;
                doc.content = writer
                    .finish()
                    .map_err(|e| Error::parse(doc.reference(), e))?;
                doc.content_encoding = Some(EXTRACTED_ENCODING.to_string());
                derived.extend(found);
            },
            None => log::debug!("Passing \"{}\" through unparsed", doc.reference()),
        }
        doc.parse_state = ParseState::Parsed;

        match self.run_handlers(&self.post_parse_handlers, doc)? {
            Stage::Continue(more) => derived.extend(more),
            rejected => return Ok(rejected),
        }
        Ok(Stage::Continue(derived))
    }

    fn resolve_content_type(&self, doc: &mut Document) -> Result<()> {
        if doc.content_type.is_none() {
            let sample = doc.content.head(SNIFF_LENGTH)?;
            let detected = content_type::detect(&sample, doc.reference());
            log::debug!("Detected content type {} for \"{}\"", detected, doc.reference());
            doc.content_type = Some(detected);
        }
        if doc.content_encoding.is_none() {
            doc.content_encoding = doc
                .content_type
                .as_deref()
                .and_then(content_type::charset_param);
        }
        // Parameters live on in the content encoding; handlers and parsers see the media type.
        doc.content_type = doc.content_type.as_deref().map(content_type::base_type);

        let reference = doc.reference().to_string();
        doc.metadata.set(keys::REFERENCE, reference);
        if let Some(ct) = &doc.content_type {
            doc.metadata.set(keys::CONTENT_TYPE, ct.clone());
        }
        if let Some(encoding) = &doc.content_encoding {
            doc.metadata.set(keys::CONTENT_ENCODING, encoding.clone());
        }
        Ok(())
    }

    fn run_handlers(&self, entries: &[HandlerEntry], doc: &mut Document) -> Result<Stage> {
        let reference = doc.reference().to_string();
        let mut combinator = OnMatchCombinator::new();
        let mut include_filters = Vec::new();
        let mut derived = Vec::new();

        for entry in entries {
            let name = entry.handler.name();
            let wrap = |e: Error| Error::handler(reference.as_str(), name, e);
            let mut input = doc.content.open().map_err(wrap)?;
            let mut view = doc.handler_view();
            if !entry.restrictions.applies_to(&view) {
                log::debug!("{} does not apply to \"{}\"", name, reference);
                continue;
            }
            log::debug!("Running {} on \"{}\"", name, reference);

            match &entry.handler {
                Handler::Filter(filter) => {
                    let matched = filter.is_match(&view, &mut input).map_err(wrap)?;
                    let on_match = filter.on_match();
                    if on_match == OnMatch::Include {
                        include_filters.push(name);
                    }
                    if combinator.record(on_match, matched) == FilterOutcome::Reject {
                        return Ok(Stage::Rejected(name.to_string()));
                    }
                },
                Handler::Tagger(tagger) => {
                    tagger.tag_document(&mut view, &mut input).map_err(wrap)?;
                },
                Handler::Transformer(transformer) => {
                    let mut writer = self.cache.writer();
                    transformer
                        .transform_document(&mut view, &mut input, &mut writer)
                        .map_err(wrap)?;
                    drop(input);
                    replace_content(doc, writer.finish().map_err(wrap)?);
                },
                Handler::Splitter(splitter) => {
                    let found = splitter
                        .split_document(&mut view, &mut input, &self.cache)
                        .map_err(wrap)?;
                    derived.extend(found);
                },
            }
        }

        if combinator.accepted() {
            Ok(Stage::Continue(derived))
        } else {
            Ok(Stage::Rejected(include_filters.join(", ")))
        }
    }
}

/// Name the document in errors that do not already.
fn with_reference(reference: &str, e: Error) -> Error {
    if e.reference().is_some() {
        e
    } else {
        Error::parse(reference, e)
    }
}

fn replace_content(doc: &mut Document, content: CachedContent) {
    doc.content = content;
    // Transformers always write UTF-8.
    doc.content_encoding = Some(EXTRACTED_ENCODING.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::builtin::{ConstantTagger, RegexContentFilter, ReplaceTransformer};
    use crate::handler::Restrictions;

    fn importer() -> Importer {
        Importer::new(ParserRegistry::builder().build().unwrap())
    }

    fn text_doc(reference: &str, text: &str) -> Document {
        Document::new(reference, CachedContent::from_bytes(text.to_string()))
    }

    #[test]
    fn test_plain_import_sets_reserved_keys() {
        let response = importer()
            .import_document(text_doc("a.txt", "hello"))
            .unwrap();
        assert!(response.is_success());
        let doc = response.document.unwrap();
        assert_eq!(doc.parse_state, ParseState::Parsed);
        assert_eq!(doc.metadata.get(keys::REFERENCE), Some("a.txt"));
        assert_eq!(doc.metadata.get(keys::CONTENT_TYPE), Some("text/plain"));
        assert_eq!(doc.content.read_to_string().unwrap(), "hello");
    }

    #[test]
    fn test_declared_content_type_charset_becomes_encoding() {
        let doc = text_doc("a", "x").with_content_type("text/plain; charset=ISO-8859-1");
        let response = importer().import_document(doc).unwrap();
        let doc = response.document.unwrap();
        assert_eq!(doc.metadata.get(keys::CONTENT_ENCODING), Some("ISO-8859-1"));
        assert_eq!(doc.content_encoding.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn test_declared_content_type_parameters_are_dropped() {
        let doc = text_doc("a", "x").with_content_type("Text/Plain; charset=UTF-8");
        let response = importer().import_document(doc).unwrap();
        let doc = response.document.unwrap();
        assert_eq!(doc.content_type.as_deref(), Some("text/plain"));
        assert_eq!(doc.metadata.get(keys::CONTENT_TYPE), Some("text/plain"));
        assert_eq!(doc.metadata.get(keys::CONTENT_ENCODING), Some("UTF-8"));
    }

    #[test]
    fn test_errors_name_the_document() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "spill file gone");
        let err = with_reference("a.txt", Error::Io(io));
        assert_eq!(err.reference(), Some("a.txt"));
        assert!(err.to_string().contains("spill file gone"));

        let handler = Error::handler("b.txt", "ReplaceTransformer", "boom");
        assert_eq!(with_reference("a.txt", handler).reference(), Some("b.txt"));
    }

    #[test]
    fn test_exclude_filter_rejects() {
        let importer = importer().with_post_parse_handler(HandlerEntry::filter(
            RegexContentFilter::new("spam")
                .unwrap()
                .with_on_match(OnMatch::Exclude),
        ));
        let response = importer
            .import_document(text_doc("a.txt", "buy spam now"))
            .unwrap();
        assert_eq!(
            response.status,
            ImporterStatus::Rejected {
                filter: "RegexContentFilter".to_string()
            }
        );
        assert!(response.document.is_none());
    }

    #[test]
    fn test_unmatched_include_filter_rejects() {
        let importer = importer().with_pre_parse_handler(HandlerEntry::filter(
            RegexContentFilter::new("wanted").unwrap(),
        ));
        let response = importer.import_document(text_doc("a.txt", "other")).unwrap();
        assert!(matches!(response.status, ImporterStatus::Rejected { .. }));
    }

    #[test]
    fn test_restricted_handler_is_skipped() {
        let importer = importer().with_post_parse_handler(
            HandlerEntry::tagger(ConstantTagger::new().with_constant("tagged", ["yes"]))
                .with_restrictions(Restrictions::new().with_content_types("text/html").unwrap()),
        );
        let response = importer.import_document(text_doc("a.txt", "x")).unwrap();
        assert!(!response.document.unwrap().metadata.contains_key("tagged"));
    }

    #[test]
    fn test_pre_parse_transformer_output_is_parsed() {
        let importer = importer().with_pre_parse_handler(HandlerEntry::transformer(
            ReplaceTransformer::new("cat", "dog").unwrap(),
        ));
        let response = importer
            .import_document(text_doc("a.txt", "the cat sat"))
            .unwrap();
        let doc = response.document.unwrap();
        assert_eq!(doc.content.read_to_string().unwrap(), "the dog sat");
    }

    #[test]
    fn test_ignored_content_type_passes_through() {
        let registry = ParserRegistry::builder()
            .ignore_content_types("text/plain")
            .build()
            .unwrap();
        let response = Importer::new(registry)
            .import_document(text_doc("a.txt", "raw bytes"))
            .unwrap();
        let doc = response.document.unwrap();
        assert_eq!(doc.parse_state, ParseState::Parsed);
        assert_eq!(doc.content.read_to_string().unwrap(), "raw bytes");
    }
}
