//! The run manifest: the durable provenance record of one step execution.
//!
//! Schema is stable (version 1). Manifests are written pretty-printed for
//! humans; canonical JSON is used only for the digest inputs that feed the
//! run id. Timestamps are informational and never hashed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hash::Digest;
use crate::id::EntryKind;
use crate::param::ParamMap;

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub manifest_version: u32,
    pub run_id: Digest,
    pub timestamp_utc: String,
    pub step: StepRecord,
    pub parameters: ParamsRecord,
    pub environment: EnvRecord,
    /// Sorted by `logical_name`.
    pub inputs: Vec<InputRecord>,
    /// Sorted by `logical_name`.
    pub outputs: Vec<OutputRecord>,
    pub tool: ToolRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub path: String,
    pub code_hash: Digest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsRecord {
    pub effective: ParamMap,
    pub provenance: BTreeMap<String, ParamSource>,
    pub hash: Digest,
}

/// Where an effective parameter value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParamSource {
    Cli,
    Env,
    Config,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvRecord {
    pub summary: EnvSummary,
    pub hash: Digest,
}

/// Environment fingerprint captured at run time.
///
/// `runtime` is the crate's declared minimum toolchain, deterministic
/// per release. Env hashes are only comparable between stores written
/// by the same tool generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvSummary {
    pub runtime: String,
    pub platform: String,
    pub env_vars: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<PackageRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRecord {
    pub logical_name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub id: Digest,
    pub origin: Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Adopted,
    Derived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    pub logical_name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub id: Digest,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRecord {
    pub name: String,
    pub version: String,
}

impl ToolRecord {
    pub fn current() -> Self {
        Self {
            name: crate::TOOL_NAME.to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}
