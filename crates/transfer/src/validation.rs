use std::path::Path;

use crate::strategy::GIB;

/// Default size ceiling for a single file.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * GIB;

/// Maximum file name length in characters.
pub const MAX_NAME_LENGTH: usize = 255;

/// Declared content types accepted for upload.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    // Images
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/webp",
    // Documents
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    // Text and code
    "text/plain",
    "text/csv",
    "text/html",
    "text/css",
    "text/javascript",
    "application/json",
    "application/xml",
    // Archives
    "application/zip",
    "application/x-rar-compressed",
    "application/x-7z-compressed",
    // Audio and video
    "audio/mpeg",
    "audio/wav",
    "audio/ogg",
    "video/mp4",
    "video/avi",
    "video/mov",
    // Fallback
    "application/octet-stream",
];

/// Executable and script extensions that are never uploaded.
pub const DANGEROUS_EXTENSIONS: &[&str] = &[".exe", ".bat", ".cmd", ".scr", ".pif", ".vbs", ".js"];

/// Why a file was refused before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("file is {size} bytes, larger than the {max} byte limit")]
    SizeExceeded { size: u64, max: u64 },

    #[error("unsupported content type: {0}")]
    TypeRejected(String),

    #[error("file name is empty")]
    EmptyName,

    #[error("file name is {0} characters, longer than 255")]
    NameTooLong(usize),

    #[error("{0} files are not allowed")]
    DangerousExtension(String),
}

/// What the validator knows about a file.
#[derive(Debug, Clone, Copy)]
pub struct FileCandidate<'a> {
    pub name: &'a str,
    pub size: u64,
    pub content_type: Option<&'a str>,
}

/// Checks a file against every admissibility rule.
///
/// All violated rules are reported, not just the first.
pub fn validate_file(
    candidate: &FileCandidate<'_>,
    max_size: u64,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if candidate.size > max_size {
        errors.push(ValidationError::SizeExceeded {
            size: candidate.size,
            max: max_size,
        });
    }

    if let Some(ct) = candidate.content_type
        && !ct.is_empty()
        && !ALLOWED_CONTENT_TYPES.contains(&ct)
    {
        errors.push(ValidationError::TypeRejected(ct.to_string()));
    }

    if candidate.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }

    let len = candidate.name.chars().count();
    if len > MAX_NAME_LENGTH {
        errors.push(ValidationError::NameTooLong(len));
    }

    let lower = candidate.name.to_lowercase();
    if let Some(ext) = DANGEROUS_EXTENSIONS.iter().find(|ext| lower.ends_with(*ext)) {
        errors.push(ValidationError::DangerousExtension((*ext).to_string()));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Guesses a declared content type from the file name's extension.
pub fn detect_content_type(name: &str) -> Option<&'static str> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("png") => Some("image/png"),
        Some("gif") => Some("image/gif"),
        Some("bmp") => Some("image/bmp"),
        Some("webp") => Some("image/webp"),
        Some("pdf") => Some("application/pdf"),
        Some("doc") => Some("application/msword"),
        Some("docx") => {
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        }
        Some("xls") => Some("application/vnd.ms-excel"),
        Some("xlsx") => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        Some("ppt") => Some("application/vnd.ms-powerpoint"),
        Some("pptx") => {
            Some("application/vnd.openxmlformats-officedocument.presentationml.presentation")
        }
        Some("txt" | "log" | "md") => Some("text/plain"),
        Some("csv") => Some("text/csv"),
        Some("html" | "htm") => Some("text/html"),
        Some("css") => Some("text/css"),
        Some("json") => Some("application/json"),
        Some("xml") => Some("application/xml"),
        Some("zip") => Some("application/zip"),
        Some("rar") => Some("application/x-rar-compressed"),
        Some("7z") => Some("application/x-7z-compressed"),
        Some("mp3") => Some("audio/mpeg"),
        Some("wav") => Some("audio/wav"),
        Some("ogg") => Some("audio/ogg"),
        Some("mp4") => Some("video/mp4"),
        Some("avi") => Some("video/avi"),
        Some("mov") => Some("video/mov"),
        _ => None,
    }
}
