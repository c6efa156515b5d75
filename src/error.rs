//! Error types for the quill coordination core.

/// Top-level error type for the document coordination core.
///
/// Controller-internal failures (detached handles, disconnected channels)
/// are silent no-ops, and save backends report through `anyhow`; the
/// fallible surface of this crate is configuration handling.
#[derive(Debug, thiserror::Error)]
pub enum QuillError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, QuillError>;
