//! Import a document and print what came out
//!
//! Runs one file through the importer and prints the response tree: every
//! document reference with its status, content type and the start of its
//! extracted text.
//!
//! Usage:
//!   cargo run --release --bin doc_import -- path/to/file.zip
//!   cargo run --release --bin doc_import -- file.bin --content-type text/plain
//!   cargo run --release --bin doc_import -- file.zip --config importer.json --verbose

use doc_importer::{CachedContent, Document, ImporterConfig, ImporterResponse, ImporterStatus};
use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

const PREVIEW_CHARS: usize = 80;

struct ImportArgs {
    input: PathBuf,
    config: Option<PathBuf>,
    content_type: Option<String>,
    verbose: bool,
}

impl ImportArgs {
    fn from_args() -> Option<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut input = None;
        let mut config = None;
        let mut content_type = None;
        let mut verbose = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" => {
                    i += 1;
                    if i < args.len() {
                        config = Some(PathBuf::from(&args[i]));
                    }
                },
                "--content-type" => {
                    i += 1;
                    if i < args.len() {
                        content_type = Some(args[i].clone());
                    }
                },
                "--verbose" | "-v" => {
                    verbose = true;
                },
                other => {
                    input = Some(PathBuf::from(other));
                },
            }
            i += 1;
        }

        Some(Self {
            input: input?,
            config,
            content_type,
            verbose,
        })
    }
}

fn print_response(response: &ImporterResponse, depth: usize, verbose: bool) {
    let indent = "  ".repeat(depth);
    let status = match &response.status {
        ImporterStatus::Success => "ok".to_string(),
        ImporterStatus::Rejected { filter } => format!("rejected by {}", filter),
        ImporterStatus::Error { message } => format!("error: {}", message),
    };
    println!("{}{} [{}]", indent, response.reference, status);

    if let Some(doc) = &response.document {
        println!(
            "{}  content-type: {}",
            indent,
            doc.content_type.as_deref().unwrap_or("unknown")
        );
        if verbose {
            for (key, values) in doc.metadata.iter() {
                println!("{}  {} = {}", indent, key, values.join(" | "));
            }
        }
        match doc.content.read_to_string() {
            Ok(text) => {
                let preview: String = text.chars().take(PREVIEW_CHARS).collect();
                let preview = preview.replace('\n', " ");
                let ellipsis = if text.chars().count() > PREVIEW_CHARS {
                    "..."
                } else {
                    ""
                };
                println!("{}  text: {}{}", indent, preview.trim(), ellipsis);
            },
            Err(e) => println!("{}  text: <unreadable: {}>", indent, e),
        }
    }

    for child in &response.nested {
        print_response(child, depth + 1, verbose);
    }
}

fn main() {
    env_logger::init();

    let Some(args) = ImportArgs::from_args() else {
        eprintln!("Usage: doc_import <file> [--config <json>] [--content-type <type>] [--verbose]");
        process::exit(2);
    };

    let config = match &args.config {
        Some(path) => match ImporterConfig::from_path(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config {}: {}", path.display(), e);
                process::exit(1);
            },
        },
        None => ImporterConfig::default(),
    };
    let importer = match config.build() {
        Ok(importer) => importer,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            process::exit(1);
        },
    };

    let content = match File::open(&args.input)
        .map_err(doc_importer::Error::from)
        .and_then(|mut file| CachedContent::from_reader(&mut file, importer.cache()))
    {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {}: {}", args.input.display(), e);
            process::exit(1);
        },
    };

    let mut doc = Document::new(args.input.display().to_string(), content);
    if let Some(content_type) = args.content_type {
        doc = doc.with_content_type(content_type);
    }

    let start = Instant::now();
    match importer.import_document(doc) {
        Ok(response) => {
            print_response(&response, 0, args.verbose);
            let total = response.flatten().len();
            println!();
            println!("{} document(s) in {:.2?}", total, start.elapsed());
        },
        Err(e) => {
            eprintln!("Import failed: {}", e);
            process::exit(1);
        },
    }
}
