use thiserror::Error;

/// Canonical result for the engine (and for step phase functions).
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unsupported input spec {0:?}")]
    UnsupportedSpec(String),

    #[error("input path does not exist: {0}")]
    MissingInput(String),

    #[error("alias not found: {0}")]
    AliasNotFound(String),

    #[error("alias chain exceeded {limit} links resolving {spec:?}")]
    AliasDepth { spec: String, limit: usize },

    #[error("step failed: {0}")]
    Step(String),

    #[error(transparent)]
    Store(#[from] caps_store::StoreError),

    #[error(transparent)]
    Core(#[from] caps_core::error::Error),

    #[error("engine I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Convenience for step authors reporting a phase failure.
    pub fn step(msg: impl Into<String>) -> Self {
        EngineError::Step(msg.into())
    }
}
