//! Error types for cellpatch

use thiserror::Error;

/// Result type for patch operations
pub type PatchResult<T> = std::result::Result<T, PatchError>;

/// Errors that can occur while patching a workbook
#[derive(Debug, Error)]
pub enum PatchError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed XML attribute
    #[error("XML attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    /// No declared sheet carries the requested name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Invalid file format
    #[error("Invalid XLSX format: {0}")]
    InvalidFormat(String),

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// Record key that is not a column reference
    #[error("Invalid column letters: {0:?}")]
    InvalidColumn(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
}
