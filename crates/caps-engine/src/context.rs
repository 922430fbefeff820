//! The context handed to every step phase.

use std::fs;
use std::path::PathBuf;

use caps_core::manifest::EnvSummary;
use caps_core::param::{ParamMap, ParamValue};

use crate::error::Result;

/// Container passed to the load/transform/save phases of a step.
///
/// `input_dir` holds the materialized inputs keyed by logical name;
/// whatever the save phase writes under `output_dir` at the top level
/// becomes the run's outputs. Both live inside `run_dir`, a writable
/// working directory disjoint from the immutable store.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_dir: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub params: ParamMap,
    pub env: EnvSummary,
}

impl RunContext {
    /// Path of an input by logical name (file or directory).
    pub fn input_path(&self, logical_name: &str) -> PathBuf {
        self.input_dir.join(logical_name)
    }

    /// Read a file input fully into memory.
    pub fn read_input(&self, logical_name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.input_path(logical_name))?)
    }

    /// Read a file input as UTF-8 text.
    pub fn read_input_string(&self, logical_name: &str) -> Result<String> {
        Ok(fs::read_to_string(self.input_path(logical_name))?)
    }

    /// Path for an output by logical name, creating parent directories.
    pub fn output_path(&self, logical_name: &str) -> Result<PathBuf> {
        let p = self.output_dir.join(logical_name);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(p)
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }
}
