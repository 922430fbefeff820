use std::path::PathBuf;

use thiserror::Error;

/// Canonical result for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] caps_core::error::Error),

    #[error("object not found in store: {0}")]
    NotFound(String),

    #[error("expected a {expected} id, got {got}")]
    WrongKind { expected: &'static str, got: String },

    #[error("invalid alias name {0:?}")]
    AliasName(String),

    #[error("invalid alias target {0:?}")]
    AliasTarget(String),

    #[error("symlink cycle detected under {0}")]
    SymlinkCycle(PathBuf),

    #[error("non-UTF-8 path under {0}")]
    NonUtf8Path(PathBuf),

    #[error("malformed {what} at {path}: {reason}")]
    Malformed {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },
}
