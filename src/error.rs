//! Error types for archive reading and writing
//!
//! Fatal conditions surface as [`Error`] values; recoverable ("soft")
//! conditions are accumulated as strings on the importer/exporter and
//! reported through [`log`] instead of aborting the current part.

use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when reading or writing an archive
#[derive(Error, Debug)]
pub enum Error {
    /// IO error while opening, reading or writing the archive
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP container error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML parse error reported by the XML layer
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed XML attribute
    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// Structurally invalid XML (disallowed element, malformed content)
    #[error("Invalid XML: {0}")]
    InvalidXml(String),

    /// Semantically invalid model data (duplicate IDs, bad references,
    /// inconsistent triangle ranges)
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// The archive was written by a newer version of the format than
    /// this codec supports
    #[error("archive format version {found} is newer than the supported version {supported}")]
    VersionMismatch {
        /// Version recorded in the archive's metadata
        found: u32,
        /// Newest version this codec can read
        supported: u32,
    },
}

impl Error {
    /// True for the distinguished version-gate error
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, Error::VersionMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_display() {
        let err = Error::VersionMismatch {
            found: 99,
            supported: 2,
        };
        assert!(err.is_version_mismatch());
        let msg = err.to_string();
        assert!(msg.contains("99"));
        assert!(msg.contains("2"));
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_version_mismatch());
    }
}
