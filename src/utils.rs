//! Helpers for deriving archive entry names and MIME types from HTTP responses.

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap};
use url::Url;

/// Fallback entry name when neither the headers nor the URL provide one
pub const DEFAULT_FILE_NAME: &str = "download";

/// MIME type reported when nothing more specific can be determined
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Number of leading bytes inspected when sniffing content
const SNIFF_LEN: usize = 512;

/// Derive a file name for a downloaded resource.
///
/// Tries the `Content-Disposition` header first (`filename*=` takes precedence over
/// `filename=`), then the last non-empty segment of the URL path. The extension is
/// kept since the result becomes an archive entry name.
pub fn extract_filename(headers: &HeaderMap, url: &Url) -> String {
    if let Some(name) = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
    {
        return name;
    }

    if let Some(mut segments) = url.path_segments()
        && let Some(last_segment) = segments.next_back()
        && !last_segment.is_empty()
    {
        return urlencoding::decode(last_segment)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| last_segment.to_string());
    }

    DEFAULT_FILE_NAME.to_string()
}

/// Parse a filename out of a `Content-Disposition` value.
///
/// Format: `attachment; filename="file.jpg"` or `filename*=UTF-8''file%20name.jpg`
fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;

    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // charset'lang'encoded-filename
            let encoded = encoded.rsplit('\'').next().unwrap_or(encoded);
            if let Ok(decoded) = urlencoding::decode(encoded)
                && !decoded.is_empty()
            {
                return Some(decoded.into_owned());
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            let name = name.trim_matches('"');
            if !name.is_empty() {
                plain = Some(name.to_string());
            }
        }
    }

    plain
}

/// Resolve the MIME type of a response.
///
/// Priority: `Content-Type` header, then the URL's file extension, then content sniffing.
pub fn resolve_mime(headers: &HeaderMap, url: &Url, content: &[u8]) -> String {
    if let Some(mime) = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(mime_essence)
    {
        return mime;
    }

    if let Some(mime) = mime_from_extension(url.path()) {
        return mime.to_string();
    }

    sniff_content_type(content).to_string()
}

/// Strip parameters from a media type and normalize case.
///
/// Returns `None` when the value is not of the form `type/subtype`.
pub fn mime_essence(value: &str) -> Option<String> {
    let essence = value.split(';').next()?.trim().to_ascii_lowercase();
    let (kind, subtype) = essence.split_once('/')?;
    if kind.is_empty() || subtype.is_empty() || subtype.contains('/') {
        return None;
    }
    Some(essence)
}

/// Look up a MIME type by the extension of a path
pub fn mime_from_extension(path: &str) -> Option<&'static str> {
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;

    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "ico" => "image/vnd.microsoft.icon",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "json" => "application/json",
        "wasm" => "application/wasm",
        "xml" => "text/xml",
        "htm" | "html" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}

/// Guess a MIME type from the leading bytes of a body
pub fn sniff_content_type(content: &[u8]) -> &'static str {
    let head = &content[..content.len().min(SNIFF_LEN)];

    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF-", "application/pdf"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xFF\xD8\xFF", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1F\x8B\x08", "application/gzip"),
    ];
    for (magic, mime) in SIGNATURES {
        if head.starts_with(magic) {
            return mime;
        }
    }
    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return "image/webp";
    }

    let trimmed = head.trim_ascii_start();
    let lower: Vec<u8> = trimmed
        .iter()
        .take(16)
        .map(|b| b.to_ascii_lowercase())
        .collect();
    if lower.starts_with(b"<!doctype html") || lower.starts_with(b"<html") {
        return "text/html";
    }
    if lower.starts_with(b"<?xml") {
        return "text/xml";
    }

    if head.is_empty() || head.iter().any(|&b| is_binary_byte(b)) {
        return FALLBACK_MIME;
    }
    "text/plain"
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
