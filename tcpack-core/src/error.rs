//! Error taxonomy for the format engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// How a failure should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is not something the engine can work with at all.
    Structural,
    /// The input is well formed but the caller's parameters select nothing
    /// usable; adjusting extensions or the problem name may help.
    Content,
    /// Materialization aborted part way through.
    Extraction,
    /// Filesystem or archive container failure.
    Io,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid test directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("Not a zip archive: {}", .0.display())]
    SourceNotArchive(PathBuf),

    #[error("Unrecognized archive format")]
    UnrecognizedFormat,

    #[error("Archive holds no input or output entries")]
    EmptyArchive,

    #[error("No valid test folders found")]
    NoValidFolders,

    #[error("No input or output files matched the configured extensions")]
    NoClassifiedFiles,

    #[error("Name is not a single folder or file name: {0}")]
    UnsafeName(String),

    #[error("Problem name could not be determined")]
    EmptyProblemName,

    #[error("Failed to extract {entry}: {source}")]
    ExtractionFailed {
        entry: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidRoot(_)
            | EngineError::SourceNotArchive(_)
            | EngineError::UnrecognizedFormat
            | EngineError::EmptyArchive
            | EngineError::UnsafeName(_) => ErrorKind::Structural,
            EngineError::NoValidFolders
            | EngineError::NoClassifiedFiles
            | EngineError::EmptyProblemName => ErrorKind::Content,
            EngineError::ExtractionFailed { .. } => ErrorKind::Extraction,
            EngineError::Io(_) | EngineError::Archive(_) => ErrorKind::Io,
        }
    }

    /// Suggested correction for content errors.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            EngineError::NoValidFolders => {
                Some("Check the folder layout: one subfolder per test, each holding the input/output pair")
            }
            EngineError::NoClassifiedFiles => {
                Some("Check the input/output extensions or the folder layout")
            }
            EngineError::EmptyProblemName => {
                Some("Supply an explicit problem name or check the file names")
            }
            _ => None,
        }
    }

    pub(crate) fn extraction(
        entry: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        EngineError::ExtractionFailed { entry: entry.into(), source: source.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_follow_taxonomy() {
        assert_eq!(EngineError::UnrecognizedFormat.kind(), ErrorKind::Structural);
        assert_eq!(EngineError::EmptyArchive.kind(), ErrorKind::Structural);
        assert_eq!(EngineError::UnsafeName("../p".to_string()).kind(), ErrorKind::Structural);
        assert_eq!(EngineError::NoClassifiedFiles.kind(), ErrorKind::Content);
        assert_eq!(
            EngineError::extraction("p.01.inp", io::Error::other("boom")).kind(),
            ErrorKind::Extraction
        );
    }

    #[test]
    fn test_only_content_errors_have_hints() {
        assert!(EngineError::EmptyProblemName.hint().is_some());
        assert!(EngineError::NoValidFolders.hint().is_some());
        assert!(EngineError::UnrecognizedFormat.hint().is_none());
    }
}
