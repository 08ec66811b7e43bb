//! Error types.
//!
//! Internal code uses `anyhow` (`Res<T>`) so that context can be attached freely. Public functions
//! return `Result<T>`, whose `Error` additionally records which part of the system failed. The
//! `IntoResult` extension converts one into the other at the public boundary.

use std::fmt::{Debug, Display, Formatter};

/// The result type used inside the crate.
pub(crate) type Res<T> = std::result::Result<T, anyhow::Error>;

/// The result type returned from public functions.
pub type Result<T> = std::result::Result<T, Error>;

/// Identifies the part of the system in which an error originated.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The tabular store could not be read or written.
    Storage,
    /// A receipt image could not be decoded or archived.
    Upload,
    /// An inbound request could not be understood.
    Request,
    /// The configuration or the home directory is missing or invalid.
    Config,
    /// OAuth credentials are missing, invalid or could not be refreshed.
    Auth,
    /// The HTTP service failed to start or stopped unexpectedly.
    Service,
}

serde_plain::derive_display_from_serialize!(ErrorType);

/// A public error: an `ErrorType` plus the underlying cause chain.
pub struct Error {
    error_type: ErrorType,
    inner: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, inner: anyhow::Error) -> Self {
        Self { error_type, inner }
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// The innermost cause, useful for matching on well-known failures.
    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.root_cause()
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.error_type, self.inner)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // The alternate form prints the whole context chain on one line.
        write!(f, "{:#}", self.inner)
    }
}

impl std::error::Error for Error {}

/// Converts an internal `Res<T>` into a public `Result<T>`.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_pub_result_keeps_context_chain() {
        let res: Res<()> = Err(anyhow::anyhow!("sheet went away")).context("Unable to list rows");
        let err = res.pub_result(ErrorType::Storage).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Storage);
        assert_eq!(err.to_string(), "Unable to list rows: sheet went away");
    }

    #[test]
    fn test_error_type_display() {
        assert_eq!(ErrorType::Upload.to_string(), "upload");
        assert_eq!(ErrorType::Storage.to_string(), "storage");
    }
}
