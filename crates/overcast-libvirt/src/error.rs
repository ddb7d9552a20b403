use thiserror::Error;

/// Errors from loading, editing or writing a domain descriptor
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Failed to parse domain XML: {0}")]
    Parse(String),

    #[error("Expected <domain> root element, found <{found}>")]
    UnexpectedRoot { found: String },

    /// Expected node absent; the document was left unchanged
    #[error("Domain XML has no {path} element")]
    MissingNode { path: String },

    #[error("Failed to write domain XML: {0}")]
    Write(String),
}
