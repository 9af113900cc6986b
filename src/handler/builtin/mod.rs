//! Built-in handlers.
//!
//! A small set of general-purpose handlers, available from configuration by
//! type name (see [`crate::config::HandlerConfig`]).

mod filters;
mod splitters;
mod taggers;
mod transformers;

pub use filters::{RegexContentFilter, RegexMetadataFilter};
pub use splitters::RegexSplitter;
pub use taggers::{ConstantTagger, TextStatisticsTagger};
pub use transformers::ReplaceTransformer;
