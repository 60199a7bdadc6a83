use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, PartError>;

/// Error taxonomy for dumping and loading data parts.
///
/// Structural problems (`Corruption`, `Oversize`) and unresolved metadata
/// references are fatal for the current dump/load; `AlreadyExists` and
/// `DoesNotExist` are precondition violations the caller can remediate.
#[derive(Debug, Error)]
pub enum PartError {
    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Bad magic number at the start of a file.
    #[error("not a valid part file")]
    NotAValidFile,
    /// File format version below the supported threshold.
    #[error("outdated file format: found version {found}, need at least {required}")]
    Outdated {
        /// Version read from the file header.
        found: u64,
        /// Minimum version this build can read.
        required: u64,
    },
    /// Structural damage: truncated page, inconsistent counts, bad encoding.
    #[error("corruption detected: {0}")]
    Corruption(String),
    /// A structural unit that must fit a single page does not.
    #[error("{0} exceeds page capacity")]
    Oversize(&'static str),
    /// Target directory already holds a data part.
    #[error("data part already exists at {0}")]
    AlreadyExists(PathBuf),
    /// Expected data part directory is missing.
    #[error("data part does not exist at {0}")]
    DoesNotExist(PathBuf),
    /// An ID read from disk is absent from the graph metadata.
    #[error("unresolved {kind} id {id}")]
    Unresolved {
        /// Which table the lookup went through.
        kind: &'static str,
        /// The raw ID that failed to resolve.
        id: u64,
    },
    /// Caller handed the layer something it cannot encode.
    #[error("invalid argument: {0}")]
    Invalid(String),
    /// Error annotated with the part sub-file it came from.
    #[error("in file `{name}`: {source}")]
    File {
        /// File name inside the part directory.
        name: String,
        /// The codec error that surfaced there.
        source: Box<PartError>,
    },
}

impl PartError {
    /// Wraps the error with the name of the part file being processed.
    pub fn in_file(self, name: impl Into<String>) -> Self {
        PartError::File {
            name: name.into(),
            source: Box::new(self),
        }
    }

    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        PartError::Corruption(msg.into())
    }
}
