//! Handler applicability.
//!
//! A handler runs on a document only when its [`Restrictions`] apply: the
//! content type must match the configured pattern (when one is set), and, when
//! field restrictions are present, at least one of them must match one of the
//! values of its metadata field.
//!
//! Patterns must match the whole value, not a substring of it.

use regex::{Regex, RegexBuilder};

use crate::error::Result;
use crate::handler::HandlerDoc;

/// Compile `pattern` so it must match an entire value.
pub(crate) fn whole_value_regex(pattern: &str, case_sensitive: bool) -> Result<Regex> {
    let anchored = format!("^(?:{})$", pattern);
    Ok(RegexBuilder::new(&anchored)
        .case_insensitive(!case_sensitive)
        .build()?)
}

/// A metadata field whose values are matched against a pattern.
#[derive(Debug, Clone)]
pub struct PropertyMatcher {
    /// Metadata field name
    pub field: String,
    /// Pattern one of the field values must match
    pub value: Regex,
}

impl PropertyMatcher {
    /// Matcher for `field` values matching `pattern` (whole value).
    pub fn new(field: impl Into<String>, pattern: &str, case_sensitive: bool) -> Result<Self> {
        Ok(Self {
            field: field.into(),
            value: whole_value_regex(pattern, case_sensitive)?,
        })
    }

    /// Whether any value of the field matches.
    pub fn matches(&self, doc: &HandlerDoc<'_>) -> bool {
        doc.metadata
            .get_values(&self.field)
            .iter()
            .any(|v| self.value.is_match(v))
    }
}

/// When a handler applies.
#[derive(Debug, Clone, Default)]
pub struct Restrictions {
    /// Content types the handler applies to; all when `None`
    pub content_types: Option<Regex>,
    /// Metadata restrictions; any one matching is enough
    pub restrict_to: Vec<PropertyMatcher>,
}

impl Restrictions {
    /// Restrictions applying to every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only apply to content types matching `pattern` (case-insensitive).
    pub fn with_content_types(mut self, pattern: &str) -> Result<Self> {
        self.content_types = Some(whole_value_regex(pattern, false)?);
        Ok(self)
    }

    /// Add a field restriction.
    pub fn restrict_to(mut self, matcher: PropertyMatcher) -> Self {
        self.restrict_to.push(matcher);
        self
    }

    /// Whether the handler should run on `doc`.
    pub fn applies_to(&self, doc: &HandlerDoc<'_>) -> bool {
        if let Some(re) = &self.content_types {
            match doc.content_type {
                Some(ct) if re.is_match(ct) => {},
                _ => return false,
            }
        }
        self.restrict_to.is_empty() || self.restrict_to.iter().any(|m| m.matches(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ParseState;
    use crate::properties::Properties;

    fn view<'a>(meta: &'a mut Properties, ct: Option<&'a str>) -> HandlerDoc<'a> {
        HandlerDoc {
            reference: "doc",
            content_type: ct,
            content_encoding: None,
            parse_state: ParseState::Unparsed,
            metadata: meta,
            embedding: None,
        }
    }

    #[test]
    fn test_unrestricted_applies_to_everything() {
        let mut meta = Properties::new();
        assert!(Restrictions::new().applies_to(&view(&mut meta, None)));
    }

    #[test]
    fn test_content_type_must_match_whole_value() {
        let r = Restrictions::new().with_content_types("text/.*").unwrap();
        let mut meta = Properties::new();
        assert!(r.applies_to(&view(&mut meta, Some("text/html"))));
        assert!(r.applies_to(&view(&mut meta, Some("TEXT/PLAIN"))));
        assert!(!r.applies_to(&view(&mut meta, Some("application/xtext/html"))));
        assert!(!r.applies_to(&view(&mut meta, None)));
    }

    #[test]
    fn test_any_field_restriction_is_enough() {
        let r = Restrictions::new()
            .restrict_to(PropertyMatcher::new("lang", "en", true).unwrap())
            .restrict_to(PropertyMatcher::new("source", "web.*", true).unwrap());
        let mut meta = Properties::new();
        meta.add("source", "filesystem");
        meta.add("source", "website");
        assert!(r.applies_to(&view(&mut meta, None)));

        let mut other = Properties::new();
        other.add("lang", "fr");
        assert!(!r.applies_to(&view(&mut other, None)));
    }

    #[test]
    fn test_field_case_sensitivity() {
        let sensitive = PropertyMatcher::new("lang", "en", true).unwrap();
        let insensitive = PropertyMatcher::new("lang", "en", false).unwrap();
        let mut meta = Properties::new();
        meta.add("lang", "EN");
        let doc = view(&mut meta, None);
        assert!(!sensitive.matches(&doc));
        assert!(insensitive.matches(&doc));
    }

    #[test]
    fn test_content_type_and_fields_both_required() {
        let r = Restrictions::new()
            .with_content_types("text/plain")
            .unwrap()
            .restrict_to(PropertyMatcher::new("lang", "en", true).unwrap());
        let mut meta = Properties::new();
        meta.add("lang", "en");
        assert!(!r.applies_to(&view(&mut meta, Some("text/html"))));
        assert!(r.applies_to(&view(&mut meta, Some("text/plain"))));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(Restrictions::new().with_content_types("(").is_err());
    }
}
