//! Recursive parse and decompose engine.
//!
//! [`decompose`] runs a parser on a document and handles the embedded
//! documents the parser reports, in one of two modes chosen from the
//! container's content type (see [`EmbeddedHints::mode_for`]):
//!
//! - **Merge**: every embedded document is parsed recursively, with the parser
//!   the registry picks for it, into the container's own output. Its
//!   extracted metadata is merged into the container's, deduplicated per
//!   field.
//! - **Split**: the container's output only holds its own text. Each embedded
//!   document is cached and returned as a derived [`Document`] with a copy of
//!   the container metadata and linkage to its parent and root. Callers feed
//!   these back through the whole import pipeline.
//!
//! Embedded documents are named, in order of preference, by their package
//! path, their stored resource name, or `embedded-<n>.<ext>` from their
//! content type (`embedded-<n>.unknown` without one). `<n>` counts the
//! embedded documents of a container from 1.

use std::io::{Read, Write};

use crate::content::{CachedContent, ContentCache};
use crate::content_type::{self, OCTET_STREAM, SNIFF_LENGTH};
use crate::document::{embedded_reference, keys, Document, EmbeddedType, Embedding};
use crate::error::{Error, Result};
use crate::handler::suppress_self_reference;
use crate::parser::hints::{DecomposeMode, EmbeddedHints};
use crate::parser::registry::ParserRegistry;
use crate::parser::{context_metadata, DocumentParser, EmbeddedHandler, EmbeddedNode, ParseContext};
use crate::properties::Properties;

/// Deepest level of embedded documents parsed within one merge pass.
pub const MAX_EMBEDDING_DEPTH: usize = 32;

/// Parse `doc` with `parser`, writing extracted text to `output`.
///
/// Metadata extracted by the parser (and, in merge mode, by embedded
/// documents) is merged into `doc.metadata`. Returns the derived documents of
/// a split container, in the order they were found; empty otherwise.
///
/// Any failure is reported as [`Error::Parse`] naming the document.
pub fn decompose(
    registry: &ParserRegistry,
    parser: &dyn DocumentParser,
    doc: &mut Document,
    output: &mut dyn Write,
    cache: &ContentCache,
) -> Result<Vec<Document>> {
    let reference = doc.reference().to_string();
    decompose_inner(registry, parser, doc, output, cache).map_err(|e| wrap_parse(&reference, e))
}

fn decompose_inner(
    registry: &ParserRegistry,
    parser: &dyn DocumentParser,
    doc: &mut Document,
    output: &mut dyn Write,
    cache: &ContentCache,
) -> Result<Vec<Document>> {
    let hints = &registry.hints().embedded;
    let content_type = doc
        .content_type
        .as_deref()
        .map(content_type::base_type)
        .unwrap_or_else(|| OCTET_STREAM.to_string());
    let mode = hints.mode_for(&content_type);
    log::debug!(
        "Decomposing \"{}\" ({}) in {:?} mode",
        doc.reference(),
        content_type,
        mode
    );

    let mut parse_metadata = context_metadata(
        doc.content_type.as_deref().unwrap_or(OCTET_STREAM),
        doc.reference(),
        doc.content_encoding.as_deref(),
    );
    let mut collector = EmbeddedCollector {
        registry,
        hints,
        cache,
        mode,
        extract: hints.extracts_from(&content_type),
        container_reference: doc.reference(),
        root_reference: doc.root_reference(),
        container_metadata: &doc.metadata,
        depth: 0,
        sequence: 0,
        merged_metadata: Properties::new(),
        derived: Vec::new(),
    };

    let mut input = doc.content.open()?;
    {
        let mut ctx = ParseContext::new(&mut parse_metadata, output, &mut collector);
        parser.parse(&mut input, &mut ctx)?;
    }
    output.flush()?;
    drop(input);

    let EmbeddedCollector {
        merged_metadata,
        derived,
        ..
    } = collector;

    let derived = suppress_self_reference(derived, |only| only.content.content_eq(&doc.content))?;

    doc.metadata.merge(&parse_metadata);
    doc.metadata.merge(&merged_metadata);
    Ok(derived)
}

// Parse errors of nested documents already name their document.
fn wrap_parse(reference: &str, e: Error) -> Error {
    match e {
        Error::Parse { .. } => e,
        other => Error::parse(reference, other),
    }
}

/// Receives the embedded documents of one container.
struct EmbeddedCollector<'a> {
    registry: &'a ParserRegistry,
    hints: &'a EmbeddedHints,
    cache: &'a ContentCache,
    mode: DecomposeMode,
    extract: bool,
    container_reference: &'a str,
    root_reference: &'a str,
    container_metadata: &'a Properties,
    depth: usize,
    sequence: usize,
    merged_metadata: Properties,
    derived: Vec<Document>,
}

impl EmbeddedCollector<'_> {
    fn name_node(&mut self, node: &EmbeddedNode, content_type: &str) -> (String, EmbeddedType) {
        self.sequence += 1;
        if let Some(path) = node.package_path.as_deref().filter(|p| !p.is_empty()) {
            return (path.to_string(), EmbeddedType::PackageFile);
        }
        if let Some(name) = node.resource_name.as_deref().filter(|n| !n.is_empty()) {
            return (name.to_string(), EmbeddedType::FileFile);
        }
        let extension = if content_type == OCTET_STREAM {
            None
        } else {
            content_type::extension_for(content_type)
        };
        match extension {
            Some(ext) => (
                format!("embedded-{}.{}", self.sequence, ext),
                EmbeddedType::FileObject,
            ),
            None => (
                format!("embedded-{}.unknown", self.sequence),
                EmbeddedType::Unknown,
            ),
        }
    }

    fn merge_embedded(
        &mut self,
        reference: &str,
        content_type: &str,
        content: &CachedContent,
        output: &mut dyn Write,
    ) -> Result<()> {
        if self.depth + 1 >= MAX_EMBEDDING_DEPTH {
            log::warn!(
                "Not parsing \"{}\": embedded deeper than {} levels",
                reference,
                MAX_EMBEDDING_DEPTH
            );
            return Ok(());
        }
        let Some(parser) = self.registry.get_parser(reference, content_type) else {
            return Ok(());
        };

        let mut nested_metadata = context_metadata(content_type, reference, None);
        let mut nested = EmbeddedCollector {
            registry: self.registry,
            hints: self.hints,
            cache: self.cache,
            mode: DecomposeMode::Merge,
            extract: self.hints.extracts_from(content_type),
            container_reference: reference,
            root_reference: self.root_reference,
            container_metadata: self.container_metadata,
            depth: self.depth + 1,
            sequence: 0,
            merged_metadata: Properties::new(),
            derived: Vec::new(),
        };
        let mut tracked = LineTracker::new(output);
        let mut input = content.open()?;
        {
            let mut ctx = ParseContext::new(&mut nested_metadata, &mut tracked, &mut nested);
            parser
                .parse(&mut input, &mut ctx)
                .map_err(|e| wrap_parse(reference, e))?;
        }
        tracked.end_line()?;

        // Seeded context keys describe the embedded document, not the container.
        for key in [
            keys::PARSE_CONTENT_TYPE,
            keys::PARSE_RESOURCE_NAME,
            keys::PARSE_CONTENT_ENCODING,
        ] {
            nested_metadata.remove(key);
        }
        nested_metadata.merge(&nested.merged_metadata);
        self.merged_metadata.merge(&nested_metadata);
        Ok(())
    }
}

impl EmbeddedHandler for EmbeddedCollector<'_> {
    fn wants_embedded(&self) -> bool {
        self.extract
    }

    fn handle_embedded(
        &mut self,
        node: EmbeddedNode,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()> {
        if !self.extract {
            log::debug!(
                "Skipping embedded document of \"{}\": container excluded",
                self.container_reference
            );
            return Ok(());
        }

        let content = CachedContent::from_reader(input, self.cache)?;
        let hint_name = node
            .package_path
            .as_deref()
            .or(node.resource_name.as_deref())
            .unwrap_or("");
        let content_type = match &node.content_type {
            Some(ct) => content_type::base_type(ct),
            None => content_type::detect(&content.head(SNIFF_LENGTH)?, hint_name),
        };
        if !self.hints.extracts_embedded(&content_type) {
            log::debug!(
                "Skipping embedded {} document of \"{}\"",
                content_type,
                self.container_reference
            );
            return Ok(());
        }

        let (name, embedded_type) = self.name_node(&node, &content_type);
        let reference = embedded_reference(self.container_reference, &name);
        match self.mode {
            DecomposeMode::Merge => {
                log::debug!("Merging embedded document \"{}\"", reference);
                self.merge_embedded(&reference, &content_type, &content, output)
            },
            DecomposeMode::Split => {
                log::debug!("Splitting out embedded document \"{}\" ({})", reference, embedded_type);
                let derived = Document::new_embedded(
                    reference,
                    content,
                    self.container_metadata.clone(),
                    Embedding {
                        embedded_reference: name,
                        parent_reference: self.container_reference.to_string(),
                        root_reference: self.root_reference.to_string(),
                        embedded_type,
                    },
                )
                .with_content_type(content_type);
                self.derived.push(derived);
                Ok(())
            },
        }
    }
}

/// Writer remembering whether output ends mid-line.
struct LineTracker<'a> {
    inner: &'a mut dyn Write,
    open_line: bool,
}

impl<'a> LineTracker<'a> {
    fn new(inner: &'a mut dyn Write) -> Self {
        Self {
            inner,
            open_line: false,
        }
    }

    // Terminate the last line so the next sibling starts on its own line.
    fn end_line(&mut self) -> Result<()> {
        if self.open_line {
            self.inner.write_all(b"\n")?;
            self.open_line = false;
        }
        Ok(())
    }
}

impl Write for LineTracker<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        if n > 0 {
            self.open_line = buf[n - 1] != b'\n';
        }
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ReadSeek;
    use crate::document::ParseState;
    use crate::parser::hints::EmbeddedConfig;
    use crate::parser::PlainTextParser;

    /// Container test double: `name=body` lines become embedded documents,
    /// `meta:key=value` lines become metadata, other lines are text.
    /// Names: empty is unnamed, `?` unnamed HTML, `@x` a resource name,
    /// `#x` a nested container, anything else a package path.
    struct LineContainer;

    impl DocumentParser for LineContainer {
        fn name(&self) -> &str {
            "LineContainer"
        }

        fn parse(&self, input: &mut dyn ReadSeek, ctx: &mut ParseContext<'_>) -> Result<()> {
            let mut text = String::new();
            input.read_to_string(&mut text)?;
            for line in text.lines() {
                if let Some(meta) = line.strip_prefix("meta:") {
                    let (k, v) = meta.split_once('=').unwrap_or((meta, ""));
                    ctx.metadata.add(k, v);
                } else if let Some((name, body)) = line.split_once('=') {
                    let node = match name {
                        "" => EmbeddedNode::unnamed(),
                        "?" => EmbeddedNode::unnamed().with_content_type("text/html"),
                        n if n.starts_with('@') => EmbeddedNode::named(&n[1..]),
                        n if n.starts_with('#') => EmbeddedNode::package_entry(&n[1..])
                            .with_content_type("application/x-lines"),
                        n => EmbeddedNode::package_entry(n),
                    };
                    let body = body.replace("\\n", "\n");
                    ctx.handle_embedded(node, &mut body.as_bytes())?;
                } else {
                    writeln!(ctx.output(), "{}", line)?;
                }
            }
            Ok(())
        }
    }

    struct Failing;

    impl DocumentParser for Failing {
        fn name(&self) -> &str {
            "Failing"
        }

        fn parse(&self, _input: &mut dyn ReadSeek, _ctx: &mut ParseContext<'_>) -> Result<()> {
            Err(Error::Archive("truncated".to_string()))
        }
    }

    fn registry(embedded: EmbeddedConfig) -> ParserRegistry {
        ParserRegistry::builder()
            .register("application/x-lines", Box::new(LineContainer))
            .register("application/x-broken", Box::new(Failing))
            .register("text/plain", Box::new(PlainTextParser::new()))
            .embedded(embedded)
            .build()
            .unwrap()
    }

    fn container(text: &str) -> Document {
        let mut doc = Document::new("box.lines", CachedContent::from_bytes(text.to_string()))
            .with_content_type("application/x-lines");
        doc.metadata.add("origin", "test");
        doc
    }

    fn run(registry: &ParserRegistry, doc: &mut Document) -> Result<(String, Vec<Document>)> {
        let mut out = Vec::new();
        let derived = decompose(registry, &LineContainer, doc, &mut out, &ContentCache::default())?;
        Ok((String::from_utf8(out).unwrap(), derived))
    }

    #[test]
    fn test_merge_folds_embedded_text_and_metadata() {
        let r = registry(EmbeddedConfig::default());
        let mut doc = container("intro\nmeta:k=x\na.txt=alpha\nb.txt=beta\nmeta:k=y");
        let (text, derived) = run(&r, &mut doc).unwrap();
        assert!(derived.is_empty());
        assert_eq!(text, "intro\nalpha\nbeta\n");
        assert_eq!(doc.metadata.get_values("k"), ["x", "y"]);
        assert_eq!(doc.metadata.get(keys::PARSE_CONTENT_TYPE), Some("application/x-lines"));
    }

    #[test]
    fn test_merge_dedups_metadata_per_field() {
        let r = registry(EmbeddedConfig::default());
        // Nested containers contribute "x" again and a new "z".
        let inner = "meta:k=x\\nmeta:k=z";
        let mut doc = container(&format!("meta:k=x\n#in={}\n#in2={}", inner, inner));
        doc.metadata.add("k", "parent");
        let (_, _) = run(&r, &mut doc).unwrap();
        assert_eq!(doc.metadata.get_values("k"), ["parent", "x", "z"]);
    }

    #[test]
    fn test_split_produces_linked_documents() {
        let r = registry(EmbeddedConfig::default().with_split_content_types("application/x-lines"));
        let mut doc = container("intro\na.txt=alpha\ndir/b.txt=beta");
        let (text, derived) = run(&r, &mut doc).unwrap();
        assert_eq!(text, "intro\n");
        assert_eq!(derived.len(), 2);

        let a = &derived[0];
        assert_eq!(a.reference(), "box.lines!a.txt");
        assert_eq!(a.parent_reference(), Some("box.lines"));
        assert_eq!(a.root_reference(), "box.lines");
        assert_eq!(a.embedding().unwrap().embedded_type, EmbeddedType::PackageFile);
        assert_eq!(a.content.read_to_string().unwrap(), "alpha");
        assert_eq!(a.content_type.as_deref(), Some("text/plain"));
        assert_eq!(a.parse_state, ParseState::Unparsed);
        assert_eq!(a.metadata.get("origin"), Some("test"));

        assert_eq!(derived[1].reference(), "box.lines!dir/b.txt");
    }

    #[test]
    fn test_split_naming_priority_and_sequence() {
        let r = registry(EmbeddedConfig::default().with_split_content_types("application/x-lines"));
        let mut doc = container("pkg.txt=a\n@named.bin=b\n?=<p>c</p>\n=\u{1}\u{2}");
        let (_, derived) = run(&r, &mut doc).unwrap();
        let names: Vec<_> = derived
            .iter()
            .map(|d| {
                let e = d.embedding().unwrap();
                (e.embedded_reference.clone(), e.embedded_type)
            })
            .collect();
        assert_eq!(
            names,
            vec![
                ("pkg.txt".to_string(), EmbeddedType::PackageFile),
                ("named.bin".to_string(), EmbeddedType::FileFile),
                ("embedded-3.html".to_string(), EmbeddedType::FileObject),
                ("embedded-4.unknown".to_string(), EmbeddedType::Unknown),
            ]
        );
    }

    #[test]
    fn test_split_guard_suppresses_container_copy() {
        let r = registry(EmbeddedConfig::default().with_split_content_types("application/x-lines"));
        // The only embedded document has exactly the container's bytes.
        let text = "self=self";
        let mut doc = container(text);
        let (_, derived) = run(&r, &mut doc).unwrap();
        assert_eq!(derived.len(), 1, "different bytes are kept");

        let mut quine = Document::new("q", CachedContent::from_bytes(&b"=="[..]))
            .with_content_type("application/x-lines");
        let mut out = Vec::new();
        let derived = decompose(&r, &SelfEmbedding, &mut quine, &mut out, &ContentCache::default())
            .unwrap();
        assert!(derived.is_empty());
    }

    /// Reports its own full content as its only embedded document.
    struct SelfEmbedding;

    impl DocumentParser for SelfEmbedding {
        fn name(&self) -> &str {
            "SelfEmbedding"
        }

        fn parse(&self, input: &mut dyn ReadSeek, ctx: &mut ParseContext<'_>) -> Result<()> {
            let mut reader: &mut dyn ReadSeek = input;
            ctx.handle_embedded(EmbeddedNode::unnamed(), &mut reader)
        }
    }

    #[test]
    fn test_no_extract_container() {
        let r = registry(
            EmbeddedConfig::default()
                .with_split_content_types("application/x-lines")
                .with_no_extract_container_content_types("application/x-lines"),
        );
        let mut doc = container("intro\na.txt=alpha");
        let (text, derived) = run(&r, &mut doc).unwrap();
        assert_eq!(text, "intro\n");
        assert!(derived.is_empty());
    }

    #[test]
    fn test_no_extract_embedded_type_in_both_modes() {
        for split in [false, true] {
            let mut config =
                EmbeddedConfig::default().with_no_extract_embedded_content_types("text/html");
            if split {
                config = config.with_split_content_types("application/x-lines");
            }
            let r = registry(config);
            let mut doc = container("?=<p>skip</p>\nkeep.txt=kept");
            let (text, derived) = run(&r, &mut doc).unwrap();
            if split {
                assert_eq!(derived.len(), 1);
                assert_eq!(derived[0].reference(), "box.lines!keep.txt");
            } else {
                assert_eq!(text, "kept\n");
            }
        }
    }

    #[test]
    fn test_parse_failure_names_document() {
        let r = registry(EmbeddedConfig::default());
        let mut doc = container("");
        let err = decompose(&r, &Failing, &mut doc, &mut Vec::new(), &ContentCache::default())
            .unwrap_err();
        assert_eq!(err.reference(), Some("box.lines"));
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_nested_failure_names_embedded_document() {
        let r = ParserRegistry::builder()
            .register("application/x-lines", Box::new(LineContainer))
            .register("text/html", Box::new(Failing))
            .build()
            .unwrap();
        let mut doc = container("ok.txt=fine\n?=x");
        let err = run(&r, &mut doc).unwrap_err();
        assert_eq!(err.reference(), Some("box.lines!embedded-2.html"));
    }
}
