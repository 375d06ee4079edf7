//! Error types for the unxlsx library.

use std::io;
use thiserror::Error;

/// Result type alias for unxlsx operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting a workbook.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// The input file is not a Zip archive.
    #[error("Not a Zip archive: {0}")]
    NotAZip(String),

    /// An operation was attempted on a closed component.
    #[error("{0} is not open")]
    NotOpen(&'static str),

    /// Error parsing XML content of a package part.
    #[error("Invalid XML in {part}: {detail}")]
    InvalidXml { part: String, detail: String },

    /// A cell or range reference could not be parsed.
    #[error("Malformed reference: {0}")]
    MalformedRef(String),

    /// The package has no `[Content_Types].xml`.
    #[error("Missing [Content_Types].xml in package")]
    MissingContentTypes,

    /// The package has no root relationships part.
    #[error("Missing _rels/.rels in package")]
    MissingRootRels,

    /// No officeDocument relationship points at a workbook part.
    #[error("Workbook part not found in package relationships")]
    WorkbookNotFound,

    /// A sheet references a relationship id that does not exist.
    #[error("Sheet '{sheet}' references unknown relationship '{rel_id}'")]
    DanglingSheetRelationship { sheet: String, rel_id: String },

    /// The requested sheet does not exist in the workbook.
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// The archive contains more entries than the configured limit.
    #[error("Archive has {count} entries, limit is {limit}")]
    TooManyEntries { count: usize, limit: usize },

    /// A single entry's uncompressed size exceeds the configured limit.
    #[error("Entry '{path}' is {size} bytes uncompressed, limit is {limit}")]
    EntryTooLarge { path: String, size: u64, limit: u64 },

    /// The archive's total uncompressed size exceeds the configured limit.
    #[error("Archive is {total} bytes uncompressed, limit is {limit}")]
    TotalUncompressedTooLarge { total: u64, limit: u64 },

    /// An entry path exceeds the maximum allowed length.
    #[error("Entry path exceeds {limit} bytes")]
    PathTooLong { limit: usize },

    /// An entry path contains traversal components or other dangerous content.
    #[error("Suspicious path rejected: {0}")]
    SuspiciousPath(String),

    /// The archive contains an encrypted entry.
    #[error("Encrypted entry not supported: {0}")]
    EncryptionNotSupported(String),

    /// The named entry does not exist in the archive.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Entry data could not be decompressed.
    #[error("Decompression failed for '{path}': {detail}")]
    DecompressionError { path: String, detail: String },

    /// The shared-strings spill file could not be created or written.
    #[error("Shared-strings spill failure: {0}")]
    SpillFailure(String),

    /// A shared-string index is outside the pool.
    #[error("Shared string index {index} out of range (count {count})")]
    SharedStringOutOfRange { index: usize, count: usize },
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            other => Error::NotAZip(other.to_string()),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::InvalidXml {
            part: String::new(),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::WorkbookNotFound;
        assert_eq!(
            err.to_string(),
            "Workbook part not found in package relationships"
        );

        let err = Error::DanglingSheetRelationship {
            sheet: "Data".to_string(),
            rel_id: "rId9".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Sheet 'Data' references unknown relationship 'rId9'"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_limit_messages_name_the_limit() {
        let err = Error::TooManyEntries {
            count: 10_001,
            limit: 10_000,
        };
        assert!(err.to_string().contains("10001"));
        assert!(err.to_string().contains("10000"));
    }
}
