//! Splitters: derived-document production.

use std::io::Read;

use crate::content::{CachedContent, ContentCache};
use crate::document::{embedded_reference, Document, EmbeddedType, Embedding};
use crate::error::Result;
use crate::handler::HandlerDoc;

/// A document splitter.
pub trait DocumentSplitter: Send + Sync {
    /// Splitter name for logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Produce documents derived from `doc`.
    ///
    /// Derived content is buffered through `cache`. Build results with
    /// [`derive_document`] so linkage and metadata are set consistently.
    fn split_document(
        &self,
        doc: &mut HandlerDoc<'_>,
        input: &mut dyn Read,
        cache: &ContentCache,
    ) -> Result<Vec<Document>>;
}

/// Build a document derived from `parent` under the local name `name`.
///
/// The derived document gets a copy of the parent's current metadata.
pub fn derive_document(
    parent: &HandlerDoc<'_>,
    name: &str,
    content: CachedContent,
    embedded_type: EmbeddedType,
) -> Document {
    Document::new_embedded(
        embedded_reference(parent.reference, name),
        content,
        parent.metadata.clone(),
        Embedding {
            embedded_reference: name.to_string(),
            parent_reference: parent.reference.to_string(),
            root_reference: parent.root_reference().to_string(),
            embedded_type,
        },
    )
}

/// Drop a lone match that is the container itself.
///
/// When a selector yields exactly one match and `is_container` says it is
/// the whole container, emitting it would split the same document forever;
/// an empty list is returned instead. Any other match list is kept as is.
pub fn suppress_self_reference<T, F>(matches: Vec<T>, is_container: F) -> Result<Vec<T>>
where
    F: FnOnce(&T) -> Result<bool>,
{
    if let [only] = matches.as_slice() {
        if is_container(only)? {
            log::debug!("Suppressing derived document identical to its container");
            return Ok(Vec::new());
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{keys, ParseState};
    use crate::properties::Properties;

    #[test]
    fn test_lone_self_match_is_suppressed() {
        let kept = suppress_self_reference(vec!["whole"], |m| Ok(*m == "whole")).unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn test_several_matches_are_kept_even_if_one_is_whole() {
        let kept = suppress_self_reference(vec!["whole", "part"], |m| Ok(*m == "whole")).unwrap();
        assert_eq!(kept, vec!["whole", "part"]);
    }

    #[test]
    fn test_lone_partial_match_is_kept() {
        let kept = suppress_self_reference(vec!["part"], |m| Ok(*m == "whole")).unwrap();
        assert_eq!(kept, vec!["part"]);
    }

    #[test]
    fn test_derive_document_links_to_root_and_parent() {
        let mut meta = Properties::new();
        meta.add("source", "crawl");
        let root_embedding = Embedding {
            embedded_reference: "a.zip".to_string(),
            parent_reference: "root.zip".to_string(),
            root_reference: "root.zip".to_string(),
            embedded_type: EmbeddedType::PackageFile,
        };
        let parent = HandlerDoc {
            reference: "root.zip!a.zip",
            content_type: Some("application/zip"),
            content_encoding: None,
            parse_state: ParseState::Parsed,
            metadata: &mut meta,
            embedding: Some(&root_embedding),
        };
        let child = derive_document(
            &parent,
            "split-1",
            CachedContent::from_bytes(&b"x"[..]),
            EmbeddedType::FileObject,
        );
        assert_eq!(child.reference(), "root.zip!a.zip!split-1");
        assert_eq!(child.parent_reference(), Some("root.zip!a.zip"));
        assert_eq!(child.root_reference(), "root.zip");
        assert_eq!(child.metadata.get("source"), Some("crawl"));
        assert_eq!(child.metadata.get(keys::EMBEDDED_TYPE), Some("file-object"));
    }
}
