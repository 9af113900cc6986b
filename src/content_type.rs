//! Content type resolution and content-type to file extension mapping.

/// Content type used when nothing better can be determined.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Plain text content type.
pub const TEXT_PLAIN: &str = "text/plain";

/// Number of leading bytes inspected when sniffing.
pub const SNIFF_LENGTH: usize = 1024;

// Preferred extensions for common types; mime_guess lists several
// extensions for these and the first one is not always the usual one.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("application/xhtml+xml", "xhtml"),
    ("application/xml", "xml"),
    ("text/xml", "xml"),
    ("image/jpeg", "jpg"),
    ("image/tiff", "tif"),
    ("application/zip", "zip"),
    ("application/pdf", "pdf"),
    ("application/gzip", "gz"),
    ("application/msword", "doc"),
];

/// Resolve a content type from leading bytes and the document reference.
///
/// Checks, in order: well-known magic bytes, the reference's file extension,
/// whether the sample is valid UTF-8 text, and finally falls back to
/// [`OCTET_STREAM`].
pub fn detect(sample: &[u8], reference: &str) -> String {
    if let Some(ct) = sniff(sample) {
        return ct.to_string();
    }
    if let Some(ct) = from_reference(reference) {
        return ct;
    }
    if looks_like_text(sample) {
        return TEXT_PLAIN.to_string();
    }
    OCTET_STREAM.to_string()
}

/// Content type from well-known magic bytes.
pub fn sniff(sample: &[u8]) -> Option<&'static str> {
    const MAGIC: &[(&[u8], &str)] = &[
        (b"PK\x03\x04", "application/zip"),
        (b"PK\x05\x06", "application/zip"),
        (b"%PDF-", "application/pdf"),
        (b"\x1f\x8b", "application/gzip"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"II*\x00", "image/tiff"),
        (b"MM\x00*", "image/tiff"),
        (b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1", "application/x-tika-msoffice"),
    ];
    for (magic, ct) in MAGIC {
        if sample.starts_with(magic) {
            return Some(*ct);
        }
    }

    let text = String::from_utf8_lossy(&sample[..sample.len().min(256)]);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start().to_ascii_lowercase();
    if trimmed.starts_with("<!doctype html") || trimmed.starts_with("<html") {
        return Some("text/html");
    }
    if trimmed.starts_with("<?xml") {
        return Some("application/xml");
    }
    None
}

/// Content type guessed from the reference's file extension.
pub fn from_reference(reference: &str) -> Option<String> {
    // Strip URL query/fragment and embedded-document prefixes.
    let path = reference
        .rsplit('!')
        .next()
        .unwrap_or(reference)
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    if !name.contains('.') {
        return None;
    }
    mime_guess::from_path(name)
        .first_raw()
        .map(|s| s.to_string())
}

/// Preferred file extension for a content type, without the dot.
pub fn extension_for(content_type: &str) -> Option<String> {
    let base = base_type(content_type);
    if let Some((_, ext)) = PREFERRED_EXTENSIONS.iter().find(|(ct, _)| *ct == base) {
        return Some((*ext).to_string());
    }
    mime_guess::get_mime_extensions_str(&base)
        .and_then(|exts| exts.first())
        .map(|ext| (*ext).to_string())
}

/// Content type without parameters, lowercased (`"Text/HTML; charset=x"` → `"text/html"`).
pub fn base_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}

/// Charset parameter of a content type, if any.
pub fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

fn looks_like_text(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    let valid = match std::str::from_utf8(sample) {
        Ok(_) => true,
        // A multi-byte sequence cut by the sample boundary is still text.
        Err(e) => e.error_len().is_none(),
    };
    valid
        && !sample
            .iter()
            .any(|&b| b == 0 || (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c)))
}
