//! Convenient re-exports for downstream crates.

pub use crate::config::EngineConfig;
pub use crate::error::{Error, Result};
pub use crate::hash::{combine, digest_bytes, digest_file, Digest};
pub use crate::id::{EntryKind, ObjectKind, TypedId};
pub use crate::manifest::{
    EnvSummary, InputRecord, Manifest, Origin, OutputRecord, ParamSource, ToolRecord,
};
pub use crate::param::{ParamMap, ParamValue};
