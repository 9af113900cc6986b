//! Tests for loading importer configuration from files.

use std::io::Write;

use doc_importer::config::{HandlerConfig, ImporterConfig, ParserConfig};
use doc_importer::{CachedContent, Document, Error, ImporterStatus, OnMatch};

fn write_config(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_and_run_pipeline() {
    let file = write_config(
        r#"{
            "max_memory_cache_size": 4096,
            "pre_parse_handlers": [
                {
                    "handler": {
                        "type": "constant_tagger",
                        "constants": [ { "field": "source", "values": ["inbox"] } ]
                    }
                }
            ],
            "post_parse_handlers": [
                {
                    "handler": { "type": "regex_content_filter", "pattern": "(?i)confidential",
                                 "on_match": "exclude" },
                    "restrictions": { "content_types": "text/.*" }
                },
                {
                    "handler": { "type": "replace_transformer", "pattern": "\\s+",
                                 "replacement": " " }
                },
                { "handler": { "type": "text_statistics_tagger", "prefix": "stats" } }
            ],
            "parse": { "ignored_content_types": "video/.*" }
        }"#,
    );
    let config = ImporterConfig::from_path(file.path()).unwrap();
    assert_eq!(config.max_memory_cache_size, 4096);
    assert_eq!(config.post_parse_handlers.len(), 3);
    assert!(matches!(
        config.post_parse_handlers[0].handler,
        HandlerConfig::RegexContentFilter {
            on_match: OnMatch::Exclude,
            ..
        }
    ));
    // Unlisted sections keep their defaults.
    assert_eq!(config.parse.fallback, ParserConfig::PlainText);
    assert!(!config.parse.parsers.is_empty());

    let importer = config.build().unwrap();
    assert_eq!(importer.cache().max_memory_size(), 4096);

    let doc = Document::new("memo.txt", CachedContent::from_bytes("two   words"));
    let response = importer.import_document(doc).unwrap();
    assert!(response.is_success());
    let doc = response.document.unwrap();
    assert_eq!(doc.content.read_to_string().unwrap(), "two words");
    assert_eq!(doc.metadata.get("source"), Some("inbox"));
    assert_eq!(doc.metadata.get("stats.words"), Some("2"));

    let secret = Document::new("memo2.txt", CachedContent::from_bytes("CONFIDENTIAL memo"));
    let response = importer.import_document(secret).unwrap();
    assert!(matches!(response.status, ImporterStatus::Rejected { .. }));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ImporterConfig::from_path(dir.path().join("absent.json"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_malformed_json_is_json_error() {
    let file = write_config("{ \"parse\": ");
    assert!(matches!(ImporterConfig::from_path(file.path()), Err(Error::Json(_))));
}

#[test]
fn test_invalid_ignore_pattern_fails_build() {
    let file = write_config(r#"{ "parse": { "ignored_content_types": "video/(" } }"#);
    let config = ImporterConfig::from_path(file.path()).unwrap();
    assert!(matches!(config.build(), Err(Error::InvalidPattern(_))));
}

#[test]
fn test_saved_config_reloads() {
    let config = ImporterConfig::default();
    let file = write_config(&config.to_json_string().unwrap());
    assert_eq!(ImporterConfig::from_path(file.path()).unwrap(), config);
}
