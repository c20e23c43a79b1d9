use std::fmt;
use thiserror::Error;

use crate::validation::ValidationCode;

/// Comprehensive error type for LVZ and ELVL codec operations
///
/// Covers every failure that can occur while reading, validating, compiling or
/// writing a package or map metadata block. Each variant carries enough context
/// to be shown to a user, plus a machine-readable code via [`LvzError::code`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LvzError {
    // ========== I/O ERRORS (1000-1099) ==========
    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        io_kind: Option<std::io::ErrorKind>,
    },

    /// Error reading file contents
    #[error("Failed to read file {path}: {reason}")]
    FileReadError { path: String, reason: String },

    /// Permission denied when accessing file
    #[error("Permission denied accessing file: {path}")]
    PermissionDenied { path: String },

    /// Error writing file contents
    #[error("Failed to write file {path}: {reason}")]
    FileWriteError { path: String, reason: String },

    // ========== FORMAT ERRORS (2000-2099) ==========
    /// A magic value did not match
    #[error("Invalid magic bytes: expected '{expected}', found '{found}' at offset {offset}")]
    InvalidMagicBytes {
        expected: String,
        found: String,
        offset: usize,
    },

    /// Object section carries a format tag other than CLV1/CLV2
    #[error("Unsupported object section format '{found}'")]
    UnsupportedObjectFormat { found: String },

    /// ELVL header reserved field was not zero
    #[error("ELVL reserved field must be zero, found {value:#010x} at offset {offset}")]
    NonZeroReserved { value: u32, offset: usize },

    /// Data ends before a structure declared by the format
    #[error("Truncated data: expected {expected} bytes, data ends at {actual}")]
    TruncatedFile { expected: usize, actual: usize },

    // ========== DATA PARSING ERRORS (3000-3099) ==========
    /// Read past the end of a buffer
    #[error("Buffer underflow at offset {offset}: needed {needed} bytes, only {available} available")]
    BufferUnderflow {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Malformed region tile stream
    #[error("Invalid region tile data at offset {offset}: {reason}")]
    InvalidRegionTiles { offset: usize, reason: String },

    /// Repeat-row opcode with no preceding row
    #[error("Region tile data repeats a row at offset {offset} before any row was written")]
    RepeatWithoutPreviousRow { offset: usize },

    /// Invalid data length for a fixed-size structure
    #[error("Invalid data length for {field}: expected {expected}, got {actual}")]
    InvalidDataLength {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// Decoded object references an image that does not exist
    #[error("Object {object_id} references image {index}, but only {image_count} images are defined")]
    ImageIndexOutOfBounds {
        object_id: u16,
        index: usize,
        image_count: usize,
    },

    /// Chunk length runs past its container
    #[error("Chunk '{tag}' at offset {offset} declares {length} bytes, container has {available}")]
    ChunkOverrun {
        tag: String,
        offset: usize,
        length: usize,
        available: usize,
    },

    // ========== COMPRESSION ERRORS (4000-4099) ==========
    /// Inflating a section failed
    #[error("Failed to decompress section '{section}': {reason}")]
    DecompressionFailed { section: String, reason: String },

    /// Deflating a section failed
    #[error("Failed to compress section '{section}': {reason}")]
    CompressionFailed { section: String, reason: String },

    /// Inflated size differs from the section header
    #[error("Section '{section}' size mismatch: header claims {header_size} bytes, inflated to {actual_size}")]
    SectionSizeMismatch {
        section: String,
        header_size: u32,
        actual_size: usize,
    },

    // ========== ENCODING ERRORS (5000-5099) ==========
    /// Character outside the single-byte range in a string field
    #[error("Invalid character {character:?} in {field}: only single-byte characters can be stored")]
    InvalidStringEncoding { field: String, character: char },

    /// Value is valid but does not fit the binary field that stores it
    #[error("Value {value} of {field} cannot be encoded: maximum is {max}")]
    FieldNotEncodable { field: String, value: i64, max: i64 },

    // ========== RESOURCE LIMIT ERRORS (6000-6099) ==========
    /// Integer overflow in calculations
    #[error("Integer overflow in {operation}: {details}")]
    IntegerOverflow { operation: String, details: String },

    /// Data size exceeds configured limits
    #[error("Data size exceeds limit for {field}: {size} (limit: {limit})")]
    DataSizeExceedsLimit {
        field: String,
        size: usize,
        limit: usize,
    },

    // ========== VALIDATION ERRORS (7000-7099) ==========
    /// Entity failed a range or presence check
    #[error("Invalid {entity}: {message}")]
    Validation {
        entity: String,
        code: ValidationCode,
        message: String,
    },

    // ========== PACKAGE STRUCTURE ERRORS (8000-8099) ==========
    /// Section added twice to a package
    #[error("Package already contains a section named '{name}'")]
    DuplicateSection { name: String },

    /// Non-CONT section rejected under strict mode
    #[error("Section {index} has magic '{found}' instead of 'CONT'")]
    UnknownSectionMagic { index: usize, found: String },
}

impl LvzError {
    /// Get the error code for machine-readable processing
    pub fn code(&self) -> u16 {
        match self {
            // I/O Errors (1000-1099)
            Self::FileNotFound { .. } => 1001,
            Self::FileReadError { .. } => 1002,
            Self::PermissionDenied { .. } => 1003,
            Self::FileWriteError { .. } => 1004,

            // Format Errors (2000-2099)
            Self::InvalidMagicBytes { .. } => 2001,
            Self::UnsupportedObjectFormat { .. } => 2002,
            Self::NonZeroReserved { .. } => 2003,
            Self::TruncatedFile { .. } => 2004,

            // Data Parsing Errors (3000-3099)
            Self::BufferUnderflow { .. } => 3001,
            Self::InvalidRegionTiles { .. } => 3002,
            Self::RepeatWithoutPreviousRow { .. } => 3003,
            Self::InvalidDataLength { .. } => 3004,
            Self::ImageIndexOutOfBounds { .. } => 3005,
            Self::ChunkOverrun { .. } => 3006,

            // Compression Errors (4000-4099)
            Self::DecompressionFailed { .. } => 4001,
            Self::CompressionFailed { .. } => 4002,
            Self::SectionSizeMismatch { .. } => 4003,

            // Encoding Errors (5000-5099)
            Self::InvalidStringEncoding { .. } => 5001,
            Self::FieldNotEncodable { .. } => 5002,

            // Resource Limit Errors (6000-6099)
            Self::IntegerOverflow { .. } => 6001,
            Self::DataSizeExceedsLimit { .. } => 6002,

            // Validation Errors (7000-7099)
            Self::Validation { code, .. } => 7000 + code.as_u16(),

            // Package Structure Errors (8000-8099)
            Self::DuplicateSection { .. } => 8001,
            Self::UnknownSectionMagic { .. } => 8002,
        }
    }

    /// Get the error category for grouping related errors
    pub fn category(&self) -> ErrorCategory {
        match self.code() {
            1000..=1099 => ErrorCategory::IO,
            2000..=2099 => ErrorCategory::Format,
            3000..=3099 => ErrorCategory::DataParsing,
            4000..=4099 => ErrorCategory::Compression,
            5000..=5099 => ErrorCategory::Encoding,
            6000..=6099 => ErrorCategory::ResourceLimit,
            7000..=7099 => ErrorCategory::Validation,
            8000..=8099 => ErrorCategory::PackageStructure,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether the surrounding tool can keep working with the rest of the file.
    ///
    /// Section-local failures leave other sections of a package readable; everything
    /// structural aborts the decode.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::DecompressionFailed { .. }
            | Self::SectionSizeMismatch { .. }
            | Self::UnknownSectionMagic { .. }
            | Self::Validation { .. }
            | Self::DuplicateSection { .. }
            | Self::FieldNotEncodable { .. }
            | Self::InvalidStringEncoding { .. } => true,

            _ => false,
        }
    }

    /// Get suggested action for handling this error
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "Check file path and ensure file exists",
            Self::PermissionDenied { .. } => "Check file permissions and user access rights",
            Self::InvalidMagicBytes { .. } => "Verify this is a valid LVZ package or map file",
            Self::UnsupportedObjectFormat { .. } => {
                "Object section was written by an unsupported tool version"
            },
            Self::NonZeroReserved { .. } => "Map metadata header is corrupted",
            Self::BufferUnderflow { .. } | Self::TruncatedFile { .. } => {
                "File appears to be corrupted or truncated"
            },
            Self::InvalidRegionTiles { .. } | Self::RepeatWithoutPreviousRow { .. } => {
                "Region tile data is corrupted; re-save the region in an editor"
            },
            Self::DecompressionFailed { .. } => "Section data is corrupted; other sections may still load",
            Self::Validation { .. } => "Correct the highlighted value and try again",
            Self::FieldNotEncodable { .. } => "Reduce the value so it fits the package format",
            _ => "Check file integrity and format compliance",
        }
    }
}

/// Error categories for grouping related error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    IO,
    Format,
    DataParsing,
    Compression,
    Encoding,
    ResourceLimit,
    Validation,
    PackageStructure,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IO => write!(f, "I/O"),
            Self::Format => write!(f, "Format"),
            Self::DataParsing => write!(f, "Data Parsing"),
            Self::Compression => write!(f, "Compression"),
            Self::Encoding => write!(f, "Encoding"),
            Self::ResourceLimit => write!(f, "Resource Limit"),
            Self::Validation => write!(f, "Validation"),
            Self::PackageStructure => write!(f, "Package Structure"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result type alias for codec operations
pub type LvzResult<T> = Result<T, LvzError>;

impl LvzError {
    /// Map an I/O error for `path` onto the matching variant
    pub fn from_io(err: &std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => LvzError::FileNotFound {
                path: path.to_string(),
                io_kind: Some(err.kind()),
            },
            std::io::ErrorKind::PermissionDenied => LvzError::PermissionDenied {
                path: path.to_string(),
            },
            _ => LvzError::FileReadError {
                path: path.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for LvzError {
    fn from(err: std::io::Error) -> Self {
        LvzError::from_io(&err, "unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_errors() -> Vec<LvzError> {
        vec![
            LvzError::FileNotFound { path: "test".to_string(), io_kind: None },
            LvzError::FileReadError { path: "test".to_string(), reason: "test".to_string() },
            LvzError::PermissionDenied { path: "test".to_string() },
            LvzError::FileWriteError { path: "test".to_string(), reason: "test".to_string() },
            LvzError::InvalidMagicBytes { expected: "CONT".to_string(), found: "test".to_string(), offset: 0 },
            LvzError::UnsupportedObjectFormat { found: "CLV9".to_string() },
            LvzError::NonZeroReserved { value: 1, offset: 8 },
            LvzError::TruncatedFile { expected: 0, actual: 0 },
            LvzError::BufferUnderflow { offset: 0, needed: 0, available: 0 },
            LvzError::InvalidRegionTiles { offset: 0, reason: "test".to_string() },
            LvzError::RepeatWithoutPreviousRow { offset: 0 },
            LvzError::InvalidDataLength { field: "test".to_string(), expected: 0, actual: 0 },
            LvzError::ImageIndexOutOfBounds { object_id: 0, index: 0, image_count: 0 },
            LvzError::ChunkOverrun { tag: "REGN".to_string(), offset: 0, length: 0, available: 0 },
            LvzError::DecompressionFailed { section: "test".to_string(), reason: "test".to_string() },
            LvzError::CompressionFailed { section: "test".to_string(), reason: "test".to_string() },
            LvzError::SectionSizeMismatch { section: "test".to_string(), header_size: 0, actual_size: 0 },
            LvzError::InvalidStringEncoding { field: "test".to_string(), character: 'λ' },
            LvzError::FieldNotEncodable { field: "test".to_string(), value: 0, max: 0 },
            LvzError::IntegerOverflow { operation: "test".to_string(), details: "test".to_string() },
            LvzError::DataSizeExceedsLimit { field: "test".to_string(), size: 0, limit: 0 },
            LvzError::Validation {
                entity: "map object".to_string(),
                code: ValidationCode::IdOutOfRange,
                message: "test".to_string(),
            },
            LvzError::DuplicateSection { name: "test".to_string() },
            LvzError::UnknownSectionMagic { index: 0, found: "test".to_string() },
        ]
    }

    #[test]
    fn test_error_codes_are_unique() {
        let mut codes = std::collections::HashSet::new();
        for error in sample_errors() {
            let code = error.code();
            assert!(codes.insert(code), "Duplicate error code: {}", code);
        }
    }

    #[test]
    fn test_error_categories() {
        let file_not_found = LvzError::FileNotFound { path: "test".to_string(), io_kind: None };
        assert_eq!(file_not_found.category(), ErrorCategory::IO);
        assert_eq!(file_not_found.code(), 1001);

        let invalid_magic = LvzError::InvalidMagicBytes {
            expected: "CONT".to_string(),
            found: "test".to_string(),
            offset: 0,
        };
        assert_eq!(invalid_magic.category(), ErrorCategory::Format);
        assert_eq!(invalid_magic.code(), 2001);

        let repeat = LvzError::RepeatWithoutPreviousRow { offset: 0 };
        assert_eq!(repeat.category(), ErrorCategory::DataParsing);
    }

    #[test]
    fn test_validation_errors_carry_their_code() {
        let error = LvzError::Validation {
            entity: "map object".to_string(),
            code: ValidationCode::DisplayModeOutOfRange,
            message: "mode 6".to_string(),
        };
        assert_eq!(error.category(), ErrorCategory::Validation);
        assert_eq!(error.code(), 7000 + ValidationCode::DisplayModeOutOfRange.as_u16());
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_error_recoverability() {
        let inflate = LvzError::DecompressionFailed {
            section: "a.bm2".to_string(),
            reason: "corrupt deflate stream".to_string(),
        };
        assert!(inflate.is_recoverable());

        let reserved = LvzError::NonZeroReserved { value: 7, offset: 8 };
        assert!(!reserved.is_recoverable());

        let repeat = LvzError::RepeatWithoutPreviousRow { offset: 0 };
        assert!(!repeat.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let file_error = LvzError::FileNotFound {
            path: "/path/to/file.lvz".to_string(),
            io_kind: Some(std::io::ErrorKind::NotFound),
        };
        let display_text = format!("{}", file_error);
        assert!(display_text.contains("/path/to/file.lvz"));
        assert!(display_text.contains("File not found"));

        let reserved = LvzError::NonZeroReserved { value: 0xAB, offset: 20 };
        let display_text = format!("{}", reserved);
        assert!(display_text.contains("0x000000ab"));
        assert!(display_text.contains("20"));
    }

    #[test]
    fn test_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        match LvzError::from(io_error) {
            LvzError::FileNotFound { path, io_kind } => {
                assert_eq!(path, "unknown");
                assert_eq!(io_kind, Some(std::io::ErrorKind::NotFound));
            },
            _ => panic!("Expected FileNotFound error"),
        }

        let permission_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        match LvzError::from_io(&permission_error, "maps/a.lvz") {
            LvzError::PermissionDenied { path } => assert_eq!(path, "maps/a.lvz"),
            _ => panic!("Expected PermissionDenied error"),
        }
    }

    #[test]
    fn test_suggested_actions() {
        let file_error = LvzError::FileNotFound { path: "test".to_string(), io_kind: None };
        let suggestion = file_error.suggested_action().to_lowercase();
        assert!(suggestion.contains("file"));
        assert!(suggestion.contains("path") || suggestion.contains("exists"));

        let magic_error = LvzError::InvalidMagicBytes {
            expected: "CONT".to_string(),
            found: "test".to_string(),
            offset: 0,
        };
        assert!(magic_error.suggested_action().to_lowercase().contains("valid"));
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(format!("{}", ErrorCategory::IO), "I/O");
        assert_eq!(format!("{}", ErrorCategory::DataParsing), "Data Parsing");
        assert_eq!(format!("{}", ErrorCategory::PackageStructure), "Package Structure");
    }
}
