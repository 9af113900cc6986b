//! Settings shared by all parsers of a registry.
//!
//! Hints are supplied once when the registry is built and handed to every
//! hint-aware parser the first time the registry is used. OCR settings are
//! only validated at that point; a missing OCR executable disables OCR with a
//! warning instead of failing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::content_type::base_type;
use crate::error::{Error, Result};
use crate::handler::restrictions::whole_value_regex;

/// Name of the OCR executable looked up inside an install directory.
#[cfg(windows)]
const OCR_EXECUTABLE: &str = "tesseract.exe";
#[cfg(not(windows))]
const OCR_EXECUTABLE: &str = "tesseract";

/// OCR settings as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// OCR executable, or the directory containing it. OCR is off when unset.
    pub path: Option<PathBuf>,
    /// Recognition languages (e.g. `eng`, `fra`)
    pub languages: Vec<String>,
    /// Content types to run OCR on; all when unset
    pub content_types: Option<String>,
}

impl OcrConfig {
    /// Set the executable or install directory.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the recognition languages.
    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict OCR to content types matching `pattern`.
    pub fn with_content_types(mut self, pattern: impl Into<String>) -> Self {
        self.content_types = Some(pattern.into());
        self
    }

    /// Validate into usable OCR hints.
    ///
    /// `Ok(None)` when OCR is not configured; an error when it is configured
    /// but the executable cannot be found or the pattern is invalid.
    pub fn validate(&self) -> Result<Option<OcrHints>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let executable = locate_executable(path).ok_or_else(|| {
            Error::Config(format!("OCR executable not found at {}", path.display()))
        })?;
        let content_types = self
            .content_types
            .as_deref()
            .map(|p| whole_value_regex(p, false))
            .transpose()?;
        Ok(Some(OcrHints {
            executable,
            languages: self.languages.clone(),
            content_types,
        }))
    }
}

fn locate_executable(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let candidate = path.join(OCR_EXECUTABLE);
    candidate.is_file().then_some(candidate)
}

/// Validated OCR settings.
#[derive(Debug, Clone)]
pub struct OcrHints {
    /// OCR executable
    pub executable: PathBuf,
    /// Recognition languages
    pub languages: Vec<String>,
    /// Content types to run OCR on; all when `None`
    pub content_types: Option<Regex>,
}

impl OcrHints {
    /// Whether OCR should run on `content_type`. Parameters are ignored.
    pub fn applies_to(&self, content_type: &str) -> bool {
        self.content_types
            .as_ref()
            .map_or(true, |re| re.is_match(&base_type(content_type)))
    }
}

/// Embedded-document policy as configured.
///
/// All fields are content-type patterns matched against the whole type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedConfig {
    /// Containers whose embedded documents become separate documents
    pub split_content_types: Option<String>,
    /// Containers whose embedded documents are not extracted at all
    pub no_extract_container_content_types: Option<String>,
    /// Embedded documents that are never extracted
    pub no_extract_embedded_content_types: Option<String>,
}

impl EmbeddedConfig {
    /// Split containers matching `pattern`.
    pub fn with_split_content_types(mut self, pattern: impl Into<String>) -> Self {
        self.split_content_types = Some(pattern.into());
        self
    }

    /// Skip embedded documents of containers matching `pattern`.
    pub fn with_no_extract_container_content_types(mut self, pattern: impl Into<String>) -> Self {
        self.no_extract_container_content_types = Some(pattern.into());
        self
    }

    /// Skip embedded documents matching `pattern`.
    pub fn with_no_extract_embedded_content_types(mut self, pattern: impl Into<String>) -> Self {
        self.no_extract_embedded_content_types = Some(pattern.into());
        self
    }
}

/// How embedded documents of a container are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecomposeMode {
    /// Embedded text and metadata are folded into the container
    Merge,
    /// Embedded documents become derived documents
    Split,
}

/// Compiled embedded-document policy.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedHints {
    split: Option<Regex>,
    no_extract_container: Option<Regex>,
    no_extract_embedded: Option<Regex>,
}

impl EmbeddedHints {
    /// Compile the configured patterns.
    pub fn from_config(config: &EmbeddedConfig) -> Result<Self> {
        let compile = |p: &Option<String>| {
            p.as_deref()
                .map(|p| whole_value_regex(p, false))
                .transpose()
        };
        Ok(Self {
            split: compile(&config.split_content_types)?,
            no_extract_container: compile(&config.no_extract_container_content_types)?,
            no_extract_embedded: compile(&config.no_extract_embedded_content_types)?,
        })
    }

    /// Decomposition mode of a container.
    pub fn mode_for(&self, container_content_type: &str) -> DecomposeMode {
        match &self.split {
            Some(re) if re.is_match(container_content_type) => DecomposeMode::Split,
            _ => DecomposeMode::Merge,
        }
    }

    /// Whether embedded documents of this container are extracted at all.
    pub fn extracts_from(&self, container_content_type: &str) -> bool {
        !pattern_matches(&self.no_extract_container, container_content_type)
    }

    /// Whether an embedded document of this type is extracted.
    pub fn extracts_embedded(&self, embedded_content_type: &str) -> bool {
        !pattern_matches(&self.no_extract_embedded, embedded_content_type)
    }
}

fn pattern_matches(pattern: &Option<Regex>, content_type: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(content_type))
}

/// Everything hint-aware parsers receive.
#[derive(Debug, Clone, Default)]
pub struct ParseHints {
    /// OCR settings; `None` when OCR is off or unusable
    pub ocr: Option<OcrHints>,
    /// Embedded-document policy
    pub embedded: EmbeddedHints,
}
