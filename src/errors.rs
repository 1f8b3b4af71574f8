use std::error::Error;
use std::fmt;
use std::io;

/// Enumeration of all possible errors that can occur while reading, writing or recoding media
#[derive(Debug)]
pub enum MediaRecodeError {
    Framing(FramingError),
    Integrity(IntegrityError),
    Domain(DomainError),
    Resource(ResourceError),
    Other(io::Error),
}

/// Box framing errors
#[derive(Debug)]
pub enum FramingError {
    /// Declared box size differs from the bytes consumed or produced
    SizeMismatch {
        box_type: String,
        declared: u64,
        actual: u64,
    },
    /// A specific box type was mandatory at this position
    UnexpectedType { expected: String, found: String },
    /// Size field is smaller than the header or runs past the enclosing box
    InvalidSize { box_type: String, size: u64 },
    /// The stream ended inside a box
    Truncated { box_type: String, message: String },
    /// Scope bookkeeping violated (exit without enter, unclosed boxes)
    Unbalanced { message: String },
}

/// Sample table consistency errors
#[derive(Debug)]
pub struct IntegrityError {
    pub message: String,
}

impl IntegrityError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Rejected requests: unknown tracks, windows too short, unsupported options
#[derive(Debug)]
pub struct DomainError {
    pub message: String,
}

impl DomainError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Output or scratch storage not available when required
#[derive(Debug)]
pub struct ResourceError {
    pub message: String,
}

impl ResourceError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for MediaRecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaRecodeError::Other(err) => write!(f, "I/O error: {}", err),
            MediaRecodeError::Framing(err) => write!(f, "Framing error: {}", err),
            MediaRecodeError::Integrity(err) => write!(f, "Integrity error: {}", err),
            MediaRecodeError::Domain(err) => write!(f, "Invalid request: {}", err),
            MediaRecodeError::Resource(err) => write!(f, "Resource error: {}", err),
        }
    }
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::SizeMismatch {
                box_type,
                declared,
                actual,
            } => write!(
                f,
                "{} box declares {} bytes but {} were processed",
                box_type, declared, actual
            ),
            FramingError::UnexpectedType { expected, found } => {
                write!(f, "expected {} box, found {}", expected, found)
            }
            FramingError::InvalidSize { box_type, size } => {
                write!(f, "invalid size {} for {} box", size, box_type)
            }
            FramingError::Truncated { box_type, message } => {
                write!(f, "truncated {} box: {}", box_type, message)
            }
            FramingError::Unbalanced { message } => write!(f, "{}", message),
        }
    }
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for MediaRecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MediaRecodeError::Other(err) => Some(err),
            _ => None,
        }
    }
}
impl Error for FramingError {}
impl Error for IntegrityError {}
impl Error for DomainError {}
impl Error for ResourceError {}

// Conversion implementations
impl From<io::Error> for MediaRecodeError {
    fn from(err: io::Error) -> Self {
        MediaRecodeError::Other(err)
    }
}

impl From<FramingError> for MediaRecodeError {
    fn from(err: FramingError) -> Self {
        MediaRecodeError::Framing(err)
    }
}

impl From<IntegrityError> for MediaRecodeError {
    fn from(err: IntegrityError) -> Self {
        MediaRecodeError::Integrity(err)
    }
}

impl From<DomainError> for MediaRecodeError {
    fn from(err: DomainError) -> Self {
        MediaRecodeError::Domain(err)
    }
}

impl From<ResourceError> for MediaRecodeError {
    fn from(err: ResourceError) -> Self {
        MediaRecodeError::Resource(err)
    }
}

// Conversion to io::Error for callers working with std::io signatures
impl From<MediaRecodeError> for io::Error {
    fn from(err: MediaRecodeError) -> Self {
        match err {
            MediaRecodeError::Other(err) => err,
            other => io::Error::other(other),
        }
    }
}

impl From<FramingError> for io::Error {
    fn from(err: FramingError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

impl From<IntegrityError> for io::Error {
    fn from(err: IntegrityError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

impl From<DomainError> for io::Error {
    fn from(err: DomainError) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}

impl From<ResourceError> for io::Error {
    fn from(err: ResourceError) -> Self {
        io::Error::other(err)
    }
}

impl MediaRecodeError {
    /// Shorthand for an integrity error with a formatted message.
    pub fn integrity(message: impl Into<String>) -> Self {
        MediaRecodeError::Integrity(IntegrityError::new(message))
    }

    /// Shorthand for a domain error with a formatted message.
    pub fn domain(message: impl Into<String>) -> Self {
        MediaRecodeError::Domain(DomainError::new(message))
    }

    /// Shorthand for a resource error with a formatted message.
    pub fn resource(message: impl Into<String>) -> Self {
        MediaRecodeError::Resource(ResourceError::new(message))
    }
}

// Type alias for Result with MediaRecodeError
pub type MediaRecodeResult<T> = Result<T, MediaRecodeError>;
