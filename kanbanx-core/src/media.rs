/// Attachment content-type helpers.
use std::path::Path;

/// Extensions of files users typically attach to a captured card.
const KNOWN_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
    ("json", "application/json"),
    ("csv", "text/csv"),
    ("txt", "text/plain"),
    ("md", "text/plain"),
];

const FALLBACK_TYPE: &str = "application/octet-stream";

/// MIME type for a file extension, case-insensitively.
pub fn content_type_for_ext(ext: Option<&str>) -> &'static str {
    let Some(ext) = ext else {
        return FALLBACK_TYPE;
    };
    KNOWN_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map_or(FALLBACK_TYPE, |&(_, content_type)| content_type)
}

/// Content type for an attachment: the one the caller reported, otherwise
/// a guess from the file name.
pub fn resolve_content_type(name: &str, reported: &str) -> String {
    if !reported.trim().is_empty() {
        return reported.to_string();
    }
    let ext = Path::new(name).extension().and_then(|s| s.to_str());
    content_type_for_ext(ext).to_string()
}

/// Human-readable size such as `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
