use std::fmt;
use thiserror::Error;

/// Failure categories surfaced by the indexing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A node vanished from the content graph while it was being processed
    Consistency,
    /// A property value could not be converted for indexing
    Schema,
    /// Content transformation failed or could not run
    Extraction,
    /// Index I/O, corrupt files or serialization failures
    Storage,
    /// Two-phase-commit misuse or an unknown transaction
    Protocol,
    InvalidState,
    InvalidArgument,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Consistency => "consistency",
            ErrorKind::Schema => "schema",
            ErrorKind::Extraction => "extraction",
            ErrorKind::Storage => "storage",
            ErrorKind::Protocol => "protocol",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::InvalidArgument => "invalid_argument",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("[{kind}] {context}")]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error {
            kind,
            context: context.into(),
            source: None,
        }
    }

    pub fn with_source<E>(kind: ErrorKind, context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error {
            kind,
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn consistency(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Consistency, context)
    }

    pub fn schema(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, context)
    }

    pub fn extraction(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Extraction, context)
    }

    pub fn storage(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, context)
    }

    pub fn protocol(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, context)
    }

    pub fn invalid_state(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, context)
    }

    pub fn invalid_argument(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, context)
    }

    /// True when the error means "the node no longer exists".
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::Consistency
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Storage, "I/O failure", err)
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::with_source(ErrorKind::Storage, "serialization failure", err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::InvalidArgument, "invalid configuration", err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_context() {
        let err = Error::protocol("unknown transaction");
        assert_eq!(err.to_string(), "[protocol] unknown transaction");
    }

    #[test]
    fn io_errors_become_storage_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: Error = io.into();
        assert_eq!(err.kind, ErrorKind::Storage);
        assert!(std::error::Error::source(&err).is_some());
    }
}
