/// Error types for the sxgeo library
use std::fmt;

/// Result type alias for sxgeo operations
pub type Result<T> = std::result::Result<T, SxGeoError>;

/// Coarse classification of an [`SxGeoError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file could not be opened or read, or is shorter than a header
    Io,
    /// The bytes are not a usable Sypex Geo database
    Format,
}

/// Main error type for database operations
///
/// Lookup misses (reserved octets, malformed addresses, unmapped ranges)
/// are never errors; they come back as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SxGeoError {
    /// I/O errors
    Io(String),

    /// File is too small to contain the fixed header
    FileTooSmall {
        /// Actual file size in bytes
        size: usize,
        /// Minimum required size in bytes
        required: usize,
    },

    /// Format/parsing errors (bad magic, inconsistent layout, stride mismatch)
    InvalidFormat(String),

    /// A descriptor uses a field type token this reader does not know
    UnsupportedField(String),

    /// A row, record or linkage offset points outside its section
    OutOfBounds {
        /// Section the offset was resolved against
        section: &'static str,
        /// Offending offset, relative to the section start
        offset: u64,
        /// Section length in bytes (or rows for the row table)
        limit: u64,
    },
}

impl SxGeoError {
    /// Which side of the I/O vs. format split this error falls on
    pub fn kind(&self) -> ErrorKind {
        match self {
            SxGeoError::Io(_) | SxGeoError::FileTooSmall { .. } => ErrorKind::Io,
            SxGeoError::InvalidFormat(_)
            | SxGeoError::UnsupportedField(_)
            | SxGeoError::OutOfBounds { .. } => ErrorKind::Format,
        }
    }
}

impl fmt::Display for SxGeoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SxGeoError::Io(msg) => write!(f, "I/O error: {}", msg),
            SxGeoError::FileTooSmall { size, required } => write!(
                f,
                "File too small: {} bytes (need at least {})",
                size, required
            ),
            SxGeoError::InvalidFormat(msg) => write!(f, "Invalid SxGeo format: {}", msg),
            SxGeoError::UnsupportedField(token) => {
                write!(f, "Unsupported descriptor field type: {}", token)
            }
            SxGeoError::OutOfBounds {
                section,
                offset,
                limit,
            } => write!(
                f,
                "Offset {} out of bounds for {} (limit {})",
                offset, section, limit
            ),
        }
    }
}

impl std::error::Error for SxGeoError {}

impl From<std::io::Error> for SxGeoError {
    fn from(err: std::io::Error) -> Self {
        SxGeoError::Io(err.to_string())
    }
}
