use thiserror::Error;

/// Result alias for binary XML operations.
pub type AxmlResult<T> = Result<T, AxmlError>;

/// Errors surfaced while decoding, patching or writing a binary XML document.
///
/// Every variant is terminal for the call that produced it: the in-memory document
/// may be discarded and the file on disk is left as it was.
#[derive(Debug, Error)]
pub enum AxmlError {
    /// No start tag with the requested name exists in the document.
    #[error("element <{element}> not found in document")]
    ElementNotFound { element: String },

    /// The attribute's resource id has no entry in the document's resource map and is
    /// not a platform attribute whose name is known, so the new record has no name.
    #[error("attribute resource id {resource_id:#010x} has no known name")]
    AttributeNameUnresolved { resource_id: u32 },

    /// The android schema URI is not in the string pool, so a namespaced attribute
    /// cannot be inserted.
    #[error("android schema URI is missing from the string pool")]
    SchemaUriMissing,

    /// A chunk header, size field or record violates the format.
    #[error("malformed chunk at offset {offset:#x}: {reason}")]
    MalformedChunk { offset: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AxmlError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        AxmlError::MalformedChunk {
            offset,
            reason: reason.into(),
        }
    }
}
