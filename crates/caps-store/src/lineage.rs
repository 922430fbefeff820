//! Lineage: walk the DAG that manifests implicitly form.
//!
//! Manifests are scanned linearly; at this scale that beats maintaining
//! a forward index. Unreadable manifests are skipped, not fatal.

use std::collections::HashSet;

use caps_core::hash::Digest;
use caps_core::id::{EntryKind, ObjectKind, TypedId};

use crate::error::{Result, StoreError};
use crate::store::{read_manifest_file, Store};

impl Store {
    /// Find the run that produced an artifact, if any.
    ///
    /// Returns the first manifest whose outputs contain the matching
    /// `(type, id)` pair. `None` means the artifact was adopted.
    pub fn who_built(&self, target: &TypedId) -> Result<Option<Digest>> {
        let kind = entry_kind(target)?;
        for path in self.iter_manifests()? {
            let manifest = match read_manifest_file(&path) {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "skipping unreadable manifest");
                    continue;
                }
            };
            let produced = manifest
                .outputs
                .iter()
                .any(|o| o.kind == kind && o.id == target.digest);
            if produced {
                return Ok(Some(manifest.run_id));
            }
        }
        Ok(None)
    }

    /// Depth-first trace from an artifact back to its adopted sources.
    ///
    /// Emits the artifact, the run that built it, then that run's inputs,
    /// recursively. Artifacts with no producing run are labeled as
    /// adopted sources. Visited ids terminate the walk; cycles cannot
    /// occur under content addressing but are defended against anyway.
    pub fn trace(&self, target: &TypedId) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        let mut seen: HashSet<TypedId> = HashSet::new();
        let mut stack = vec![(*target, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let indent = "  ".repeat(depth);
            lines.push(format!("{indent}{id}"));
            if !seen.insert(id) {
                continue;
            }
            let Some(run_id) = self.who_built(&id)? else {
                lines.push(format!("{indent}  (no producing run; likely adopted source)"));
                continue;
            };
            lines.push(format!("{indent}  built by run:{run_id}"));
            let manifest = self.load_manifest(&run_id)?;
            for input in &manifest.inputs {
                stack.push((input.kind.typed_id(input.id), depth + 1));
            }
        }
        Ok(lines)
    }
}

fn entry_kind(target: &TypedId) -> Result<EntryKind> {
    match target.kind {
        ObjectKind::Blob => Ok(EntryKind::File),
        ObjectKind::Tree => Ok(EntryKind::Dir),
        ObjectKind::Run => Err(StoreError::WrongKind {
            expected: "blob or tree",
            got: target.to_string(),
        }),
    }
}
