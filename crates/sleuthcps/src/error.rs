//! Error types for sleuthcps.
//!
//! This module defines all error types used throughout the sleuthcps crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for sleuthcps operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Profile Errors ===
    /// Failed to read or parse a CSV profile.
    #[error("failed to read profile {path}: {source}")]
    ProfileRead {
        /// Path to the profile file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: csv::Error,
    },

    /// Failed to write a CSV profile.
    #[error("failed to write profile {path}: {source}")]
    ProfileWrite {
        /// Path to the profile file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: csv::Error,
    },

    /// No profile has been loaded into the session.
    #[error("no CSV profile loaded")]
    NoProfileLoaded,

    /// The named structure is not in the profile.
    #[error("structure '{name}' not found in profile")]
    UnknownStructure {
        /// Name that was looked up.
        name: String,
    },

    /// A required profile column is empty for a structure.
    #[error("structure '{name}' has no {field} in profile")]
    MissingField {
        /// Structure name.
        name: String,
        /// Column that was empty.
        field: &'static str,
    },

    /// A profile column holds text that is not a number.
    #[error("invalid {field} value for '{name}': {value}")]
    InvalidValue {
        /// Structure name.
        name: String,
        /// Column holding the bad value.
        field: &'static str,
        /// The raw cell text.
        value: String,
    },

    /// Text could not be parsed as an integer literal.
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// Parent references loop back on themselves.
    #[error("circular reference detected: {chain}")]
    CircularReference {
        /// The chain of names, joined with ` -> `.
        chain: String,
    },

    /// A structure has neither an absolute nor a relative location.
    #[error("structure '{name}' must have either 'offset' or both 'rOffset' and 'parent'")]
    Unlocatable {
        /// Structure name.
        name: String,
    },

    // === Image Errors ===
    /// Failed to read a memory image from disk.
    #[error("failed to load image {path}: {source}")]
    ImageOpen {
        /// Path to the image file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// No memory image has been loaded into the session.
    #[error("no binary loaded")]
    NoImageLoaded,

    /// A requested byte range falls outside the image.
    #[error("requested range out of bounds: 0x{offset:X} + {size} bytes")]
    OutOfRange {
        /// Start of the range.
        offset: i64,
        /// Length of the range.
        size: i64,
    },

    /// The size prefix in front of a resolved offset is not readable.
    #[error("cannot read size for '{name}': size pointer out of range (0x{pointer:X})")]
    SizeUnreadable {
        /// Structure name.
        name: String,
        /// Where the size prefix was expected.
        pointer: i64,
    },

    /// No valid (pointer, size) metadata at the given location.
    #[error("no valid metadata found at 0x{pointer:X}")]
    MetadataNotFound {
        /// Location that was probed.
        pointer: i64,
    },

    /// Hexdump width must be at least one byte.
    #[error("invalid hexdump width: {0}")]
    InvalidWidth(usize),

    // === Manifest Errors ===
    /// A manifest table row could not be understood.
    #[error("malformed manifest row at line {line}: {message}")]
    ManifestParse {
        /// 1-based line number in the manifest document.
        line: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// The manifest document contains no artifact rows.
    #[error("no manifest rows found in {source_name}")]
    ManifestEmpty {
        /// Where the manifest came from.
        source_name: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// Failed to read an input file.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// Path that couldn't be read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write an extracted file.
    #[error("failed to write {path}: {source}")]
    FileWrite {
        /// Path that couldn't be written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// A specialized Result type for sleuthcps operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an unknown structure error.
    #[must_use]
    pub fn unknown_structure(name: impl Into<String>) -> Self {
        Self::UnknownStructure { name: name.into() }
    }

    /// Create a missing field error.
    #[must_use]
    pub fn missing_field(name: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            name: name.into(),
            field,
        }
    }

    /// Create an invalid value error for a profile cell.
    #[must_use]
    pub fn invalid_value(
        name: impl Into<String>,
        field: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            name: name.into(),
            field,
            value: value.into(),
        }
    }

    /// Create a manifest parse error.
    #[must_use]
    pub fn manifest_parse(line: usize, message: impl Into<String>) -> Self {
        Self::ManifestParse {
            line,
            message: message.into(),
        }
    }

    /// Check if this error is a bounds problem.
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            Self::OutOfRange { .. } | Self::SizeUnreadable { .. } | Self::MetadataNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NoImageLoaded;
        assert_eq!(err.to_string(), "no binary loaded");

        let err = Error::unknown_structure("PLC_TAGS");
        assert_eq!(err.to_string(), "structure 'PLC_TAGS' not found in profile");
    }

    #[test]
    fn test_out_of_range_display() {
        let err = Error::OutOfRange {
            offset: 0x10,
            size: 0x20,
        };
        assert_eq!(err.to_string(), "requested range out of bounds: 0x10 + 32 bytes");
    }

    #[test]
    fn test_is_out_of_range() {
        assert!(Error::OutOfRange { offset: 0, size: 1 }.is_out_of_range());
        assert!(Error::MetadataNotFound { pointer: 4 }.is_out_of_range());
        assert!(!Error::NoProfileLoaded.is_out_of_range());
    }

    #[test]
    fn test_missing_field_display() {
        let err = Error::missing_field("header", "size");
        assert_eq!(err.to_string(), "structure 'header' has no size in profile");
    }

    #[test]
    fn test_invalid_value_display() {
        let err = Error::invalid_value("header", "offset", "0xZZ");
        let msg = err.to_string();
        assert!(msg.contains("offset"));
        assert!(msg.contains("0xZZ"));
    }

    #[test]
    fn test_circular_reference_display() {
        let err = Error::CircularReference {
            chain: "a -> b -> a".to_string(),
        };
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_unlocatable_display() {
        let err = Error::Unlocatable {
            name: "orphan".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("orphan"));
        assert!(msg.contains("rOffset"));
    }

    #[test]
    fn test_manifest_parse_display() {
        let err = Error::manifest_parse(12, "expected 4 columns");
        let msg = err.to_string();
        assert!(msg.contains("line 12"));
        assert!(msg.contains("expected 4 columns"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "hexdump_width must be between 1 and 64".to_string(),
        };
        assert!(err.to_string().contains("hexdump_width"));
    }

    #[test]
    fn test_file_read_error_display() {
        let err = Error::FileRead {
            path: PathBuf::from("/cases/README.md"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to read /cases/README.md: denied");
    }

    #[test]
    fn test_image_open_error_display() {
        let err = Error::ImageOpen {
            path: PathBuf::from("/dumps/ExtRAM_20240101000000.bin"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("ExtRAM_20240101000000.bin"));
    }
}
