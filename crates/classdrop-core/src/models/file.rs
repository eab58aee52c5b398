use bytes::Bytes;

use crate::constants::{content_type_for_extension, extension_of, DEFAULT_CONTENT_TYPE};

/// A file handed to the session by its caller.
///
/// The bytes are held as [`Bytes`] so the session can keep them for an explicit
/// retry without copying.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    /// Lowercased extension including the leading dot.
    pub fn extension(&self) -> String {
        extension_of(&self.name)
    }

    /// Declared MIME type, or one inferred from the extension when none was given.
    pub fn effective_mime_type(&self) -> String {
        if !self.mime_type.trim().is_empty() {
            return self.mime_type.trim().to_string();
        }
        content_type_for_extension(&self.extension())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string()
    }
}
