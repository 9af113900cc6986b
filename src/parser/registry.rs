//! Content type to parser routing.
//!
//! The registry is assembled with a [`ParserRegistryBuilder`] and frozen the
//! first time it is used: shared hints are validated and handed to every
//! hint-aware parser exactly once, even when the first lookups race on
//! several threads. After that, lookups are lock-free reads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;

use crate::content_type::base_type;
use crate::error::Result;
use crate::handler::restrictions::whole_value_regex;
use crate::parser::hints::{EmbeddedConfig, EmbeddedHints, OcrConfig, ParseHints};
use crate::parser::text::PlainTextParser;
use crate::parser::DocumentParser;

/// Builds a [`ParserRegistry`].
pub struct ParserRegistryBuilder {
    parsers: Vec<(String, Box<dyn DocumentParser>)>,
    fallback: Option<Box<dyn DocumentParser>>,
    ignored_content_types: Option<String>,
    ocr: OcrConfig,
    embedded: EmbeddedConfig,
}

impl Default for ParserRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistryBuilder {
    /// Empty builder; the fallback defaults to [`PlainTextParser`].
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
            fallback: None,
            ignored_content_types: None,
            ocr: OcrConfig::default(),
            embedded: EmbeddedConfig::default(),
        }
    }

    /// Use `parser` for `content_type` (parameters are ignored).
    ///
    /// A later registration for the same type replaces an earlier one.
    pub fn register(mut self, content_type: &str, parser: Box<dyn DocumentParser>) -> Self {
        self.parsers.push((base_type(content_type), parser));
        self
    }

    /// Parser for content types without a registration.
    pub fn fallback(mut self, parser: Box<dyn DocumentParser>) -> Self {
        self.fallback = Some(parser);
        self
    }

    /// Content types passed through without parsing.
    pub fn ignore_content_types(mut self, pattern: impl Into<String>) -> Self {
        self.ignored_content_types = Some(pattern.into());
        self
    }

    /// OCR settings for hint-aware parsers.
    pub fn ocr(mut self, ocr: OcrConfig) -> Self {
        self.ocr = ocr;
        self
    }

    /// Embedded-document policy.
    pub fn embedded(mut self, embedded: EmbeddedConfig) -> Self {
        self.embedded = embedded;
        self
    }

    /// Compile patterns and build the registry.
    ///
    /// OCR settings are validated later, on first use.
    pub fn build(self) -> Result<ParserRegistry> {
        let ignored = self
            .ignored_content_types
            .as_deref()
            .map(|p| whole_value_regex(p, false))
            .transpose()?;
        let embedded = EmbeddedHints::from_config(&self.embedded)?;
        Ok(ParserRegistry {
            ignored,
            pending: Mutex::new(Some(Pending {
                parsers: self.parsers,
                fallback: self
                    .fallback
                    .unwrap_or_else(|| Box::new(PlainTextParser::new())),
                ocr: self.ocr,
                embedded,
            })),
            frozen: OnceLock::new(),
        })
    }
}

struct Pending {
    parsers: Vec<(String, Box<dyn DocumentParser>)>,
    fallback: Box<dyn DocumentParser>,
    ocr: OcrConfig,
    embedded: EmbeddedHints,
}

struct Frozen {
    parsers: HashMap<String, Arc<dyn DocumentParser>>,
    fallback: Arc<dyn DocumentParser>,
    hints: ParseHints,
}

/// Maps content types to parsers.
pub struct ParserRegistry {
    ignored: Option<Regex>,
    pending: Mutex<Option<Pending>>,
    frozen: OnceLock<Frozen>,
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("ignored", &self.ignored)
            .field("initialized", &self.frozen.get().is_some())
            .finish()
    }
}

impl ParserRegistry {
    /// Start building a registry.
    pub fn builder() -> ParserRegistryBuilder {
        ParserRegistryBuilder::new()
    }

    /// Parser for a document, or `None` when its content type is ignored.
    ///
    /// Unregistered content types get the fallback parser.
    pub fn get_parser(&self, reference: &str, content_type: &str) -> Option<Arc<dyn DocumentParser>> {
        let content_type = base_type(content_type);
        if self
            .ignored
            .as_ref()
            .is_some_and(|re| re.is_match(&content_type))
        {
            log::debug!("Not parsing \"{}\": content type {} is ignored", reference, content_type);
            return None;
        }
        let frozen = self.frozen();
        let parser = frozen
            .parsers
            .get(&content_type)
            .unwrap_or(&frozen.fallback);
        log::debug!(
            "Parsing \"{}\" ({}) with {}",
            reference,
            content_type,
            parser.name()
        );
        Some(Arc::clone(parser))
    }

    /// Hints shared by the registry's parsers.
    pub fn hints(&self) -> &ParseHints {
        &self.frozen().hints
    }

    /// Whether the one-time hint propagation has run.
    pub fn is_initialized(&self) -> bool {
        self.frozen.get().is_some()
    }

    fn frozen(&self) -> &Frozen {
        self.frozen.get_or_init(|| {
            let pending = self
                .pending
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            match pending {
                Some(pending) => freeze(pending),
                // Only reachable if a previous initializer panicked.
                None => {
                    log::error!(
                        "Parser registry initialization panicked earlier; registered parsers are lost, using the plain-text fallback"
                    );
                    freeze(Pending {
                        parsers: Vec::new(),
                        fallback: Box::new(PlainTextParser::new()),
                        ocr: OcrConfig::default(),
                        embedded: EmbeddedHints::default(),
                    })
                },
            }
        })
    }
}

fn freeze(pending: Pending) -> Frozen {
    log::info!("Initializing parser registry hints");
    let ocr = match pending.ocr.validate() {
        Ok(ocr) => ocr,
        Err(e) => {
            log::warn!("OCR disabled: {}", e);
            None
        },
    };
    let hints = ParseHints {
        ocr,
        embedded: pending.embedded,
    };

    let init = |mut parser: Box<dyn DocumentParser>| -> Arc<dyn DocumentParser> {
        if let Some(aware) = parser.as_hint_aware() {
            aware.init_hints(&hints);
            log::debug!("Hints given to {}", parser.name());
        }
        Arc::from(parser)
    };

    let mut parsers = HashMap::new();
    for (content_type, parser) in pending.parsers {
        parsers.insert(content_type, init(parser));
    }
    let fallback = init(pending.fallback);

    Frozen {
        parsers,
        fallback,
        hints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ReadSeek;
    use crate::parser::{HintAwareParser, ParseContext};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Named(&'static str);

    impl DocumentParser for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn parse(&self, _input: &mut dyn ReadSeek, _ctx: &mut ParseContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    struct Counting {
        inits: Arc<AtomicUsize>,
    }

    impl DocumentParser for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn parse(&self, _input: &mut dyn ReadSeek, _ctx: &mut ParseContext<'_>) -> Result<()> {
            Ok(())
        }

        fn as_hint_aware(&mut self) -> Option<&mut dyn HintAwareParser> {
            Some(self)
        }
    }

    impl HintAwareParser for Counting {
        fn init_hints(&mut self, _hints: &ParseHints) {
            self.inits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn registry() -> ParserRegistry {
        ParserRegistry::builder()
            .register("text/html", Box::new(Named("html")))
            .register("application/pdf", Box::new(Named("pdf")))
            .fallback(Box::new(Named("fallback")))
            .ignore_content_types("image/.*|video/.*")
            .build()
            .unwrap()
    }

    #[test]
    fn test_ignored_types_have_no_parser() {
        let r = registry();
        assert!(r.get_parser("a.png", "image/png").is_none());
        assert!(r.get_parser("a.mp4", "VIDEO/MP4").is_none());
    }

    #[test]
    fn test_exact_registration_wins() {
        let r = registry();
        assert_eq!(r.get_parser("a.html", "text/html").unwrap().name(), "html");
        assert_eq!(
            r.get_parser("a.html", "text/html; charset=UTF-8").unwrap().name(),
            "html"
        );
        assert_eq!(r.get_parser("a.pdf", "application/pdf").unwrap().name(), "pdf");
    }

    #[test]
    fn test_unregistered_types_use_fallback() {
        let r = registry();
        assert_eq!(r.get_parser("a.xyz", "application/x-xyz").unwrap().name(), "fallback");
        assert_eq!(r.get_parser("a", "text/htmlx").unwrap().name(), "fallback");
    }

    #[test]
    fn test_default_fallback_is_plain_text() {
        let r = ParserRegistry::builder().build().unwrap();
        assert_eq!(r.get_parser("a", "text/plain").unwrap().name(), "PlainTextParser");
    }

    #[test]
    fn test_hints_propagated_lazily() {
        let inits = Arc::new(AtomicUsize::new(0));
        let r = ParserRegistry::builder()
            .register("text/x-count", Box::new(Counting { inits: inits.clone() }))
            .build()
            .unwrap();
        assert!(!r.is_initialized());
        assert_eq!(inits.load(Ordering::SeqCst), 0);
        r.get_parser("a", "text/x-count");
        r.get_parser("b", "text/x-count");
        assert!(r.is_initialized());
        assert_eq!(inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hints_propagated_once_under_concurrency() {
        let inits = Arc::new(AtomicUsize::new(0));
        let r = Arc::new(
            ParserRegistry::builder()
                .register("text/x-count", Box::new(Counting { inits: inits.clone() }))
                .fallback(Box::new(Counting { inits: inits.clone() }))
                .build()
                .unwrap(),
        );
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let r = Arc::clone(&r);
                std::thread::spawn(move || {
                    let ct = if i % 2 == 0 { "text/x-count" } else { "text/other" };
                    r.get_parser("doc", ct).map(|p| p.name().to_string())
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().as_deref(), Some("counting"));
        }
        // One registered parser plus the fallback, each initialized once.
        assert_eq!(inits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_ocr_executable_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let r = ParserRegistry::builder()
            .ocr(OcrConfig::default().with_path(dir.path().join("nope")))
            .build()
            .unwrap();
        assert!(r.hints().ocr.is_none());
        assert!(r.get_parser("a", "text/plain").is_some());
    }

    #[test]
    fn test_invalid_ignore_pattern_fails_build() {
        assert!(ParserRegistry::builder()
            .ignore_content_types("(")
            .build()
            .is_err());
    }
}
