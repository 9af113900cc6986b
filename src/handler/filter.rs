//! Filters and the On-Match decision rule.
//!
//! A filter only answers "does this document match?". What a match means is
//! decided by its [`OnMatch`] disposition, folded across the whole chain by
//! [`OnMatchCombinator`]:
//!
//! - a filter that does not match defers;
//! - a matching `Exclude` filter rejects at once;
//! - otherwise, if the chain has any `Include` filter, one of them must have
//!   matched;
//! - a chain without `Include` filters accepts.

use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::error::Result;
use crate::handler::HandlerDoc;
use crate::text::SectionReader;

/// What a filter match means for the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnMatch {
    /// Keep documents that match
    #[default]
    Include,
    /// Drop documents that match
    Exclude,
}

/// A document filter.
pub trait DocumentFilter: Send + Sync {
    /// Filter name for logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Disposition of a match.
    fn on_match(&self) -> OnMatch;

    /// Whether the document matches.
    ///
    /// `input` streams the document content; text-based filters should read
    /// it through [`filter_sections`].
    fn is_match(&self, doc: &HandlerDoc<'_>, input: &mut dyn Read) -> Result<bool>;
}

/// Evaluate `predicate` on each section until it matches.
///
/// Returns `false` without calling `predicate` when there are no sections.
/// Sections after the first match are never read.
pub fn filter_sections<R, F>(sections: &mut SectionReader<R>, mut predicate: F) -> Result<bool>
where
    R: Read,
    F: FnMut(&str, usize) -> Result<bool>,
{
    let mut index = 0;
    while let Some(section) = sections.next_section()? {
        if predicate(&section, index)? {
            return Ok(true);
        }
        index += 1;
    }
    Ok(false)
}

/// Next step of a filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Keep evaluating the chain
    Continue,
    /// Reject the document without evaluating further filters
    Reject,
}

/// Folds filter results into one accept/reject decision.
#[derive(Debug, Clone, Default)]
pub struct OnMatchCombinator {
    has_include: bool,
    include_matched: bool,
}

impl OnMatchCombinator {
    /// Empty chain (accepts).
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of the next filter in the chain.
    pub fn record(&mut self, on_match: OnMatch, matched: bool) -> FilterOutcome {
        match on_match {
            OnMatch::Exclude if matched => return FilterOutcome::Reject,
            OnMatch::Exclude => {},
            OnMatch::Include => {
                self.has_include = true;
                self.include_matched |= matched;
            },
        }
        FilterOutcome::Continue
    }

    /// Decision for a chain that was never rejected.
    pub fn accepted(&self) -> bool {
        !self.has_include || self.include_matched
    }
}

/// Decision for a complete chain of `(disposition, matched)` results.
pub fn combine_on_match<I>(results: I) -> bool
where
    I: IntoIterator<Item = (OnMatch, bool)>,
{
    let mut combinator = OnMatchCombinator::new();
    for (on_match, matched) in results {
        if combinator.record(on_match, matched) == FilterOutcome::Reject {
            return false;
        }
    }
    combinator.accepted()
}
