use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filesystem operation that was being attempted when an [`IoError`] happened.
#[derive(Debug, Error, Diagnostic)]
pub enum FileOperation {
    #[error("reading a file")]
    Read,
    #[error("writing a file")]
    Write,
    #[error("creating a directory")]
    Mkdir,
    #[error("removing a file")]
    Remove,
}

#[derive(Debug, Error, Diagnostic)]
#[error("I/O error: {operation} on path '{path}'")]
#[diagnostic(
    code(kopye_markdown::io),
    help("Check file permissions, disk space, or that the path is correct.")
)]
pub struct IoError {
    pub operation: FileOperation,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
impl IoError {
    pub fn new(operation: FileOperation, path: PathBuf, error: std::io::Error) -> Self {
        Self {
            operation,
            path,
            source: error,
        }
    }
}

/// Attaches the operation and path to a bare [`std::io::Error`].
pub trait IoResultExt<T> {
    fn on_path(self, operation: FileOperation, path: &Path) -> Result<T, IoError>;
}
impl<T> IoResultExt<T> for std::io::Result<T> {
    fn on_path(self, operation: FileOperation, path: &Path) -> Result<T, IoError> {
        self.map_err(|error| IoError::new(operation, path.to_path_buf(), error))
    }
}
