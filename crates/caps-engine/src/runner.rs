//! The run engine: one step in, one manifest out.
//!
//! Ordering guarantees: inputs are materialized before the step runs,
//! outputs are committed before the manifest is written, and the
//! manifest is written before any alias is set. An observer that finds
//! an alias pointing at `run:X` can rely on manifest X and everything it
//! references existing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Value};

use caps_core::canon;
use caps_core::manifest::{EnvRecord, ParamsRecord, StepRecord, MANIFEST_VERSION};
use caps_core::prelude::{
    combine, digest_bytes, Digest, EngineConfig, EntryKind, InputRecord, Manifest, OutputRecord,
    ParamMap, ParamSource, ToolRecord, TypedId,
};
use caps_store::{copy_dir_recursive, Store};

use crate::context::RunContext;
use crate::envinfo::env_summary;
use crate::error::Result;
use crate::inputs::{resolve_spec, ResolvedInput};
use crate::step::StepModule;

/// One run's worth of caller-supplied state.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Logical input name → input spec (`@path`, typed id, `alias:`).
    pub inputs: BTreeMap<String, String>,
    /// Effective parameters after precedence resolution.
    pub params: ParamMap,
    /// Per-key source of each effective parameter.
    pub provenance: BTreeMap<String, ParamSource>,
    /// Alias to point at `run:<id>` on success.
    pub alias: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Digest,
    pub manifest: Manifest,
}

/// Engine owns the store handle and configuration; runs are sequential.
pub struct Engine {
    store: Store,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let store = Store::open(&config.store_root)?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Execute a step and write its manifest. Returns the run id.
    ///
    /// Any failure before or during the phases aborts without writing a
    /// manifest; the working directory is left behind for debugging.
    pub fn run(&self, module: &StepModule, request: &RunRequest) -> Result<RunOutcome> {
        let code_hash = module.code_hash();

        // Resolve and materialize inputs into a private staging area.
        let staging = tempfile::Builder::new().prefix("caps-in-").tempdir()?;
        let mut resolved: BTreeMap<String, ResolvedInput> = BTreeMap::new();
        let mut staged: BTreeMap<String, PathBuf> = BTreeMap::new();
        for (name, spec) in &request.inputs {
            let (typed_id, entry) = resolve_spec(&self.store, spec)?;
            let dst = staging.path().join(name);
            self.store.materialize(&typed_id, &dst, None)?;
            resolved.insert(name.clone(), entry);
            staged.insert(name.clone(), dst);
        }

        let input_hash = hash_inputs(&resolved);
        let params_hash = digest_bytes(&canon::to_bytes_of(&request.params)?);
        let env = env_summary(self.config.capture_packages);
        let env_hash = digest_bytes(&canon::to_bytes_of(&env)?);
        let run_id = combine(&[code_hash, input_hash, params_hash, env_hash]);
        tracing::debug!(step = %module.name, %run_id, "run id derived");

        // Fresh working directory, writable and disjoint from the CAS.
        let run_dir = self.store.tmp_dir().join(format!("run-{}", run_id.to_hex()));
        if run_dir.exists() {
            fs::remove_dir_all(&run_dir)?;
        }
        let input_dir = run_dir.join("in");
        let output_dir = run_dir.join("out");
        fs::create_dir_all(&input_dir)?;
        fs::create_dir_all(&output_dir)?;

        // Copy, not link: the step may mutate its inputs.
        for (name, src) in &staged {
            let dst = input_dir.join(name);
            if src.is_dir() {
                copy_dir_recursive(src, &dst)?;
            } else {
                fs::copy(src, &dst)?;
            }
        }

        let ctx = RunContext {
            run_dir: run_dir.clone(),
            input_dir,
            output_dir,
            params: request.params.clone(),
            env: env.clone(),
        };

        let loaded = module.step.load(&ctx)?;
        let results = module.step.transform(&ctx, loaded)?;
        module.step.save(&ctx, results)?;

        let outputs = self.scan_outputs(&ctx.output_dir)?;

        let inputs: Vec<InputRecord> = resolved
            .into_iter()
            .map(|(name, entry)| entry.into_record(name))
            .collect();

        let manifest = Manifest {
            manifest_version: MANIFEST_VERSION,
            run_id,
            timestamp_utc: utc_now_iso(),
            step: StepRecord {
                name: module.name.clone(),
                path: module.path.clone(),
                code_hash,
            },
            parameters: ParamsRecord {
                effective: request.params.clone(),
                provenance: request.provenance.clone(),
                hash: params_hash,
            },
            environment: EnvRecord {
                summary: env,
                hash: env_hash,
            },
            inputs,
            outputs,
            tool: ToolRecord::current(),
        };
        self.store.write_manifest(&run_id, &manifest)?;

        if let Some(alias) = &request.alias {
            self.store
                .alias_set(alias, &TypedId::run(run_id).to_string())?;
        }

        // Best-effort cleanup; the run already succeeded.
        if let Err(e) = fs::remove_dir_all(&run_dir) {
            tracing::warn!(dir = %run_dir.display(), error = %e, "could not remove run dir");
        }
        drop(staging);

        Ok(RunOutcome { run_id, manifest })
    }

    /// Commit the top-level entries of the output directory.
    ///
    /// Files become blob outputs, directories become tree outputs (their
    /// size is the sum of entry sizes). Nested entries are part of their
    /// tree snapshot, never flattened.
    fn scan_outputs(&self, out_dir: &Path) -> Result<Vec<OutputRecord>> {
        let mut names: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(out_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            names.push((name, entry.path()));
        }
        names.sort();

        let mut outputs = Vec::with_capacity(names.len());
        for (name, path) in names {
            let meta = match fs::metadata(&path) {
                Ok(m) => m,
                Err(_) => continue,
            };
            if meta.is_dir() {
                let (typed_id, entries) = self.store.commit_tree(&path)?;
                let size = entries.iter().map(|e| e.size).sum();
                outputs.push(OutputRecord {
                    logical_name: name,
                    kind: EntryKind::Dir,
                    id: typed_id.digest,
                    size,
                });
            } else if meta.is_file() {
                let digest = self.store.commit_blob(&path)?;
                outputs.push(OutputRecord {
                    logical_name: name,
                    kind: EntryKind::File,
                    id: digest,
                    size: meta.len(),
                });
            }
        }
        Ok(outputs)
    }
}

/// Inputs digest: canonical `[[name, type, id], ...]`, sorted by name.
fn hash_inputs(resolved: &BTreeMap<String, ResolvedInput>) -> Digest {
    let triples: Vec<Value> = resolved
        .iter()
        .map(|(name, entry)| json!([name, entry.kind.as_str(), entry.id.to_string()]))
        .collect();
    digest_bytes(&canon::to_bytes(&Value::Array(triples)))
}

/// ISO-8601 at second precision with a trailing `Z`. Informational only.
fn utc_now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_hash_is_order_insensitive_by_construction() {
        use caps_core::hash::digest_bytes;
        use caps_core::id::EntryKind;
        use caps_core::manifest::Origin;

        let a = ResolvedInput {
            kind: EntryKind::File,
            id: digest_bytes(b"a"),
            origin: Origin::Adopted,
        };
        let b = ResolvedInput {
            kind: EntryKind::Dir,
            id: digest_bytes(b"b"),
            origin: Origin::Derived,
        };
        let mut one = BTreeMap::new();
        one.insert("x".to_string(), a);
        one.insert("y".to_string(), b);
        let mut two = BTreeMap::new();
        two.insert("y".to_string(), b);
        two.insert("x".to_string(), a);
        assert_eq!(hash_inputs(&one), hash_inputs(&two));
    }

    #[test]
    fn timestamp_has_second_precision_and_z() {
        let ts = utc_now_iso();
        assert_eq!(ts.len(), "2026-01-01T00:00:00Z".len());
        assert!(ts.ends_with('Z'));
        assert!(!ts.contains('.'));
    }
}
