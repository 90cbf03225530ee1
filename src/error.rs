use std::path::PathBuf;
use thiserror::Error;

/// The four error kinds the core ever returns: a malformed on-disk or
/// in-flight format, bad caller input, a resource the OS refused, or a
/// misuse of the API itself.
#[derive(Debug, Error)]
pub enum CobsError {
    #[error("format error in {path:?}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("input error: {0}")]
    Input(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("usage error: {0}")]
    Usage(String),

    #[error(transparent)]
    DocSource(#[from] docsrc::DocSrcError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CobsError {
    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn input(reason: impl Into<String>) -> Self {
        Self::Input(reason.into())
    }

    pub fn resource(reason: impl Into<String>) -> Self {
        Self::Resource(reason.into())
    }

    pub fn usage(reason: impl Into<String>) -> Self {
        Self::Usage(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, CobsError>;
