//! The step contract: three phases behind one trait.
//!
//! All three operations are required by the trait, so a step missing a
//! phase cannot exist at compile time. Phase data flows as a
//! string-keyed map of JSON values; steps that move bulk data write it
//! to disk through the context instead.

use std::collections::BTreeMap;

use caps_core::hash::Digest;
use caps_core::param::ParamMap;

use crate::code_hash;
use crate::context::RunContext;
use crate::error::Result;

/// Values handed from load to transform to save.
pub type StepData = BTreeMap<String, serde_json::Value>;

/// A user step.
///
/// Invariants:
/// - `transform` must be a pure function of the context and its input;
///   all I/O belongs in `load` and `save`.
/// - `save` writes under `ctx.output_dir`; its top-level entries become
///   the run's outputs.
pub trait Step: Send + Sync {
    /// Parameter defaults, overridden by config, env, and CLI in turn.
    fn defaults(&self) -> ParamMap {
        ParamMap::new()
    }

    /// Read inputs from `ctx.input_dir` into memory, keyed by logical name.
    fn load(&self, ctx: &RunContext) -> Result<StepData>;

    /// Pure transformation of the loaded data.
    fn transform(&self, ctx: &RunContext, loaded: StepData) -> Result<StepData>;

    /// Write results under `ctx.output_dir`.
    fn save(&self, ctx: &RunContext, results: StepData) -> Result<()>;
}

/// A loadable step plus the metadata the manifest records about it.
///
/// `source` is the step's own source text (builtin steps embed it with
/// `include_str!`); the code hash is derived from it, so formatting and
/// comments never change a run id.
pub struct StepModule {
    pub name: String,
    pub path: String,
    pub source: String,
    pub step: Box<dyn Step>,
}

impl StepModule {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        source: impl Into<String>,
        step: Box<dyn Step>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            source: source.into(),
            step,
        }
    }

    /// Structural hash of the step source (comments/whitespace ignored).
    pub fn code_hash(&self) -> Digest {
        code_hash::hash_source(&self.source)
    }

    pub fn defaults(&self) -> ParamMap {
        self.step.defaults()
    }
}

impl std::fmt::Debug for StepModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepModule")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
