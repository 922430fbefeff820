use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed digest: {0}")]
    Digest(String),

    #[error("malformed typed id: {0}")]
    TypedId(String),

    #[error("canonical JSON error: {0}")]
    Canon(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    // The core crate does not do I/O beyond streaming file digests, but
    // higher layers may map their I/O errors into this variant.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal invariant failed: {0}")]
    Invariant(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Canon(e.to_string())
    }
}
