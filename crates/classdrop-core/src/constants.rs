//! Shared constants for file typing and limits.

use std::path::Path;

pub const MB: u64 = 1024 * 1024;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Extensions whose content is eligible for downstream extraction.
pub const PROCESSABLE_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".txt", ".ppt", ".pptx", ".mp3", ".wav", ".m4a", ".mp4", ".mov",
    ".webm",
];

/// Lowercased extension of `file_name` including the leading dot, or an empty
/// string when the name has none.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Expected MIME type for a lowercased, dotted extension.
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    let content_type = match extension {
        // Images
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        // Videos
        ".mp4" => "video/mp4",
        ".webm" => "video/webm",
        ".mov" => "video/quicktime",
        // Audio
        ".mp3" => "audio/mpeg",
        ".wav" => "audio/wav",
        ".m4a" => "audio/mp4",
        // Documents
        ".pdf" => "application/pdf",
        ".doc" => "application/msword",
        ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".xls" => "application/vnd.ms-excel",
        ".xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".ppt" => "application/vnd.ms-powerpoint",
        ".pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ".txt" => "text/plain",
        ".csv" => "text/csv",
        ".zip" => "application/zip",
        _ => return None,
    };
    Some(content_type)
}

/// Strip parameters from a MIME type ("text/plain; charset=utf-8" -> "text/plain").
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or(content_type)
        .to_lowercase()
}

/// Whether a file is routed through content processing after upload.
pub fn is_processable(file_name: &str, mime_type: &str) -> bool {
    let extension = extension_of(file_name);
    if PROCESSABLE_EXTENSIONS.contains(&extension.as_str()) {
        return true;
    }
    let mime = normalize_mime_type(mime_type);
    mime == "application/pdf" || mime.starts_with("audio/") || mime.starts_with("video/")
}
