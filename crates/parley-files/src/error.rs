use std::path::PathBuf;

use parley_shared::TagError;
use thiserror::Error;

/// Failure to rebuild a package or tree from its tag document. Any of these
/// discards the whole document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Tag error: {0}")]
    Tag(#[from] TagError),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Unbalanced document: {open} element(s) still open at end of input")]
    Unbalanced { open: usize },

    #[error("Missing attribute '{0}'")]
    MissingAttribute(&'static str),

    #[error("Invalid attribute '{key}': {value:?}")]
    InvalidAttribute { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}
