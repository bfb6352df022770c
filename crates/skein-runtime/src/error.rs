use std::fmt;

/// Result type for skein-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the runtime layer.
///
/// Stream-path failures never surface here: individual write failures are
/// logged and skipped by design. Only query-side operations return errors.
#[derive(Debug)]
pub enum Error {
    /// Store layer error
    Store(skein_store::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "Store error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
        }
    }
}

impl From<skein_store::Error> for Error {
    fn from(err: skein_store::Error) -> Self {
        Error::Store(err)
    }
}
