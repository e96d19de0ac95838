//! Extension → MIME type table used by upload checks.

use std::collections::BTreeMap;

const BUILTIN_MIME_TYPES: &[(&str, &str)] = &[
    ("7z", "application/x-7z-compressed"),
    ("avi", "video/x-msvideo"),
    ("bmp", "image/bmp"),
    ("csv", "text/csv"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("gif", "image/gif"),
    ("gz", "application/gzip"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ico", "image/vnd.microsoft.icon"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("json", "application/json"),
    ("md", "text/markdown"),
    ("mov", "video/quicktime"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("odp", "application/vnd.oasis.opendocument.presentation"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("ogg", "audio/ogg"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("rtf", "application/rtf"),
    ("svg", "image/svg+xml"),
    ("tar", "application/x-tar"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("txt", "text/plain"),
    ("wav", "audio/wav"),
    ("webp", "image/webp"),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("xml", "application/xml"),
    ("zip", "application/zip"),
];

/// Lookup table resolved once per engine from the builtin list plus
/// configured extras.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeTable {
    entries: BTreeMap<String, String>,
}

impl MimeTable {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_MIME_TYPES
                .iter()
                .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
                .collect(),
        }
    }

    /// Builtin table with `extra` entries layered on top.
    pub fn with_extra(extra: &BTreeMap<String, String>) -> Self {
        let mut table = Self::builtin();
        for (ext, mime) in extra {
            let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
            if !ext.is_empty() {
                table.entries.insert(ext, mime.trim().to_string());
            }
        }
        table
    }

    pub fn lookup(&self, extension: &str) -> Option<&str> {
        let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        self.entries.get(&ext).map(String::as_str)
    }
}

impl Default for MimeTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup_is_case_insensitive() {
        let table = MimeTable::builtin();
        assert_eq!(table.lookup("PDF"), Some("application/pdf"));
        assert_eq!(table.lookup(".jpg"), Some("image/jpeg"));
        assert_eq!(table.lookup("heic"), None);
    }

    #[test]
    fn extras_extend_and_override() {
        let extra = BTreeMap::from([
            ("heic".to_string(), "image/heic".to_string()),
            ("txt".to_string(), "text/x-plain".to_string()),
        ]);
        let table = MimeTable::with_extra(&extra);
        assert_eq!(table.lookup("heic"), Some("image/heic"));
        assert_eq!(table.lookup("txt"), Some("text/x-plain"));
    }
}
