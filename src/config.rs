//! Importer configuration.
//!
//! An [`ImporterConfig`] is plain data: it can be built in code or loaded
//! from JSON, and is turned into a live [`Importer`] with
//! [`ImporterConfig::build`]. Handlers and parsers are selected by a `type`
//! tag and constructed explicitly; there is no name-based dynamic loading.
//!
//! # Example
//!
//! ```
//! use doc_importer::config::ImporterConfig;
//!
//! let config = ImporterConfig::from_json_str(r#"{
//!     "post_parse_handlers": [
//!         { "handler": { "type": "regex_content_filter", "pattern": "draft", "on_match": "exclude" } }
//!     ],
//!     "parse": {
//!         "ignored_content_types": "video/.*",
//!         "hints": { "embedded": { "split_content_types": "application/zip" } }
//!     }
//! }"#).unwrap();
//! let importer = config.build().unwrap();
//! assert!(importer.registry().get_parser("movie.mp4", "video/mp4").is_none());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::content::{ContentCache, DEFAULT_MAX_MEMORY_CACHE_SIZE};
use crate::error::{Error, Result};
use crate::handler::builtin::{
    ConstantTagger, RegexContentFilter, RegexMetadataFilter, RegexSplitter, ReplaceTransformer,
    TextStatisticsTagger,
};
use crate::handler::{Handler, HandlerEntry, OnMatch, PropertyMatcher, Restrictions};
use crate::importer::Importer;
use crate::parser::{
    DocumentParser, EmbeddedConfig, OcrConfig, OcrParser, ParserRegistry, PlainTextParser,
    ZipParser,
};
use crate::text::TextOptions;

fn default_true() -> bool {
    true
}

/// Complete importer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    /// Bytes kept in memory per content buffer before spilling to disk
    pub max_memory_cache_size: usize,
    /// Handlers run on raw content, in order
    pub pre_parse_handlers: Vec<HandlerEntryConfig>,
    /// Handlers run on extracted text, in order
    pub post_parse_handlers: Vec<HandlerEntryConfig>,
    /// Parser dispatch and hints
    pub parse: ParseConfig,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            max_memory_cache_size: DEFAULT_MAX_MEMORY_CACHE_SIZE,
            pre_parse_handlers: Vec::new(),
            post_parse_handlers: Vec::new(),
            parse: ParseConfig::default(),
        }
    }
}

impl ImporterConfig {
    /// Parse a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Append a pre-parse handler.
    pub fn with_pre_parse_handler(mut self, entry: HandlerEntryConfig) -> Self {
        self.pre_parse_handlers.push(entry);
        self
    }

    /// Append a post-parse handler.
    pub fn with_post_parse_handler(mut self, entry: HandlerEntryConfig) -> Self {
        self.post_parse_handlers.push(entry);
        self
    }

    /// Set the parse configuration.
    pub fn with_parse(mut self, parse: ParseConfig) -> Self {
        self.parse = parse;
        self
    }

    /// Construct the importer.
    pub fn build(&self) -> Result<Importer> {
        if self.max_memory_cache_size == 0 {
            return Err(Error::Config(
                "max_memory_cache_size must be greater than zero".to_string(),
            ));
        }
        let mut importer = Importer::new(self.parse.build_registry()?)
            .with_cache(ContentCache::new(self.max_memory_cache_size));
        for entry in &self.pre_parse_handlers {
            importer = importer.with_pre_parse_handler(entry.build()?);
        }
        for entry in &self.post_parse_handlers {
            importer = importer.with_post_parse_handler(entry.build()?);
        }
        Ok(importer)
    }
}

/// A handler with its applicability restrictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerEntryConfig {
    /// The handler
    pub handler: HandlerConfig,
    /// When it applies
    #[serde(default)]
    pub restrictions: RestrictionsConfig,
}

impl HandlerEntryConfig {
    /// Unrestricted handler.
    pub fn new(handler: HandlerConfig) -> Self {
        Self {
            handler,
            restrictions: RestrictionsConfig::default(),
        }
    }

    /// Set the restrictions.
    pub fn with_restrictions(mut self, restrictions: RestrictionsConfig) -> Self {
        self.restrictions = restrictions;
        self
    }

    /// Construct the handler entry.
    pub fn build(&self) -> Result<HandlerEntry> {
        Ok(HandlerEntry::new(self.handler.build()?).with_restrictions(self.restrictions.build()?))
    }
}

/// Handler applicability as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestrictionsConfig {
    /// Content-type pattern
    pub content_types: Option<String>,
    /// Field/value patterns; any match is enough
    pub restrict_to: Vec<PropertyMatcherConfig>,
    /// Whether `restrict_to` value patterns are case sensitive
    pub case_sensitive: bool,
}

impl Default for RestrictionsConfig {
    fn default() -> Self {
        Self {
            content_types: None,
            restrict_to: Vec::new(),
            case_sensitive: true,
        }
    }
}

impl RestrictionsConfig {
    /// Construct the restrictions.
    pub fn build(&self) -> Result<Restrictions> {
        let mut restrictions = match &self.content_types {
            Some(pattern) => Restrictions::new().with_content_types(pattern)?,
            None => Restrictions::new(),
        };
        for matcher in &self.restrict_to {
            restrictions = restrictions.restrict_to(PropertyMatcher::new(
                matcher.field.as_str(),
                &matcher.value,
                self.case_sensitive,
            )?);
        }
        Ok(restrictions)
    }
}

/// One metadata restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMatcherConfig {
    /// Metadata field
    pub field: String,
    /// Value pattern
    pub value: String,
}

/// Values a constant tagger adds to one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantConfig {
    /// Metadata field
    pub field: String,
    /// Values to add
    pub values: Vec<String>,
}

/// Built-in handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandlerConfig {
    /// See [`RegexContentFilter`]
    RegexContentFilter {
        /// Pattern searched in the text
        pattern: String,
        /// Match disposition
        #[serde(default)]
        on_match: OnMatch,
        /// Text streaming options
        #[serde(default)]
        text: TextOptions,
    },
    /// See [`RegexMetadataFilter`]
    RegexMetadataFilter {
        /// Metadata field
        field: String,
        /// Pattern one value must match
        pattern: String,
        /// Match disposition
        #[serde(default)]
        on_match: OnMatch,
        /// Case-sensitive matching
        #[serde(default = "default_true")]
        case_sensitive: bool,
    },
    /// See [`ConstantTagger`]
    ConstantTagger {
        /// Values to add
        constants: Vec<ConstantConfig>,
        /// Replace existing values
        #[serde(default)]
        replace: bool,
    },
    /// See [`TextStatisticsTagger`]
    TextStatisticsTagger {
        /// Field prefix
        #[serde(default)]
        prefix: Option<String>,
        /// Text streaming options
        #[serde(default)]
        text: TextOptions,
    },
    /// See [`ReplaceTransformer`]
    ReplaceTransformer {
        /// Pattern to replace
        pattern: String,
        /// Replacement, with `$n` group references
        replacement: String,
        /// Text streaming options
        #[serde(default)]
        text: TextOptions,
    },
    /// See [`RegexSplitter`]
    RegexSplitter {
        /// Pattern selecting derived documents
        selector: String,
        /// Text streaming options
        #[serde(default)]
        text: TextOptions,
    },
}

impl HandlerConfig {
    /// Construct the handler.
    pub fn build(&self) -> Result<Handler> {
        Ok(match self {
            HandlerConfig::RegexContentFilter {
                pattern,
                on_match,
                text,
            } => Handler::Filter(Box::new(
                RegexContentFilter::new(pattern)?
                    .with_on_match(*on_match)
                    .with_text_options(text.clone()),
            )),
            HandlerConfig::RegexMetadataFilter {
                field,
                pattern,
                on_match,
                case_sensitive,
            } => Handler::Filter(Box::new(
                RegexMetadataFilter::new(field.as_str(), pattern, *case_sensitive)?
                    .with_on_match(*on_match),
            )),
            HandlerConfig::ConstantTagger { constants, replace } => {
                let tagger = constants
                    .iter()
                    .fold(ConstantTagger::new(), |t, c| {
                        t.with_constant(c.field.as_str(), c.values.iter().cloned())
                    })
                    .with_replace(*replace);
                Handler::Tagger(Box::new(tagger))
            },
            HandlerConfig::TextStatisticsTagger { prefix, text } => {
                let mut tagger = TextStatisticsTagger::new().with_text_options(text.clone());
                if let Some(prefix) = prefix {
                    tagger = tagger.with_prefix(prefix.as_str());
                }
                Handler::Tagger(Box::new(tagger))
            },
            HandlerConfig::ReplaceTransformer {
                pattern,
                replacement,
                text,
            } => Handler::Transformer(Box::new(
                ReplaceTransformer::new(pattern, replacement.as_str())?
                    .with_text_options(text.clone()),
            )),
            HandlerConfig::RegexSplitter { selector, text } => Handler::Splitter(Box::new(
                RegexSplitter::new(selector)?.with_text_options(text.clone()),
            )),
        })
    }
}

/// Built-in parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParserConfig {
    /// See [`PlainTextParser`]
    PlainText,
    /// See [`ZipParser`]
    Zip,
    /// See [`OcrParser`]
    Ocr,
}

impl ParserConfig {
    /// Construct the parser.
    pub fn build(&self) -> Box<dyn DocumentParser> {
        match self {
            ParserConfig::PlainText => Box::new(PlainTextParser::new()),
            ParserConfig::Zip => Box::new(ZipParser::new()),
            ParserConfig::Ocr => Box::new(OcrParser::new()),
        }
    }
}

/// Parser registered for one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserMapping {
    /// Content type, without parameters
    pub content_type: String,
    /// Parser to use
    pub parser: ParserConfig,
}

impl ParserMapping {
    /// Map `content_type` to `parser`.
    pub fn new(content_type: impl Into<String>, parser: ParserConfig) -> Self {
        Self {
            content_type: content_type.into(),
            parser,
        }
    }
}

/// Shared parser hints as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HintsConfig {
    /// OCR settings
    pub ocr: OcrConfig,
    /// Embedded-document policy
    pub embedded: EmbeddedConfig,
}

/// Parser dispatch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Content types passed through unparsed
    pub ignored_content_types: Option<String>,
    /// Content type to parser mappings
    pub parsers: Vec<ParserMapping>,
    /// Parser for everything else
    pub fallback: ParserConfig,
    /// Shared parser hints
    pub hints: HintsConfig,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            ignored_content_types: None,
            parsers: vec![
                ParserMapping::new("application/zip", ParserConfig::Zip),
                ParserMapping::new("image/png", ParserConfig::Ocr),
                ParserMapping::new("image/jpeg", ParserConfig::Ocr),
                ParserMapping::new("image/tiff", ParserConfig::Ocr),
            ],
            fallback: ParserConfig::PlainText,
            hints: HintsConfig::default(),
        }
    }
}

impl ParseConfig {
    /// Construct the parser registry.
    pub fn build_registry(&self) -> Result<ParserRegistry> {
        let mut builder = ParserRegistry::builder()
            .fallback(self.fallback.build())
            .ocr(self.hints.ocr.clone())
            .embedded(self.hints.embedded.clone());
        if let Some(pattern) = &self.ignored_content_types {
            builder = builder.ignore_content_types(pattern.as_str());
        }
        for mapping in &self.parsers {
            if mapping.content_type.trim().is_empty() {
                return Err(Error::Config("parser mapping without content type".to_string()));
            }
            builder = builder.register(&mapping.content_type, mapping.parser.build());
        }
        builder.build()
    }
}
