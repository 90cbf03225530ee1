use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while scanning for, or reading terms out of, document
/// input files.
#[derive(Debug, Error)]
pub enum DocSrcError {
    #[error("I/O error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {format} input in {path:?}: {reason}")]
    Malformed {
        path: PathBuf,
        format: &'static str,
        reason: String,
    },

    #[error("unrecognized input file extension for {0:?}")]
    UnknownExtension(PathBuf),
}

impl DocSrcError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, format: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            format,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DocSrcError>;
