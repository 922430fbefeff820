//! Input spec resolution.
//!
//! Specs are user strings: `@<path>` adopts a file or directory into the
//! store on the spot, `blob:`/`tree:` ids reference existing objects,
//! and `alias:<name>` dereferences (transitively, with a depth limit so
//! a hand-made alias loop terminates with an error).

use std::path::Path;

use caps_core::hash::Digest;
use caps_core::id::{EntryKind, ObjectKind, TypedId};
use caps_core::manifest::{InputRecord, Origin};
use caps_store::Store;

use crate::error::{EngineError, Result};

/// Upper bound on `alias:` indirections for one spec.
pub const MAX_ALIAS_DEPTH: usize = 32;

/// An input after resolution, ready to become a manifest record.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedInput {
    pub kind: EntryKind,
    pub id: Digest,
    pub origin: Origin,
}

impl ResolvedInput {
    pub fn into_record(self, logical_name: impl Into<String>) -> InputRecord {
        InputRecord {
            logical_name: logical_name.into(),
            kind: self.kind,
            id: self.id,
            origin: self.origin,
        }
    }
}

/// Resolve one input spec into a typed id plus its manifest entry.
pub fn resolve_spec(store: &Store, spec: &str) -> Result<(TypedId, ResolvedInput)> {
    resolve_at_depth(store, spec, spec, 0)
}

fn resolve_at_depth(
    store: &Store,
    spec: &str,
    original: &str,
    depth: usize,
) -> Result<(TypedId, ResolvedInput)> {
    if depth > MAX_ALIAS_DEPTH {
        return Err(EngineError::AliasDepth {
            spec: original.to_string(),
            limit: MAX_ALIAS_DEPTH,
        });
    }

    if let Some(path) = spec.strip_prefix('@') {
        return adopt_path(store, Path::new(path));
    }

    if let Some(name) = spec.strip_prefix("alias:") {
        let target = store
            .alias_get(name)?
            .ok_or_else(|| EngineError::AliasNotFound(name.to_string()))?;
        return resolve_at_depth(store, &target, original, depth + 1);
    }

    match TypedId::parse(spec) {
        Ok(id) => match id.kind {
            ObjectKind::Blob => Ok((
                id,
                ResolvedInput {
                    kind: EntryKind::File,
                    id: id.digest,
                    origin: Origin::Derived,
                },
            )),
            ObjectKind::Tree => Ok((
                id,
                ResolvedInput {
                    kind: EntryKind::Dir,
                    id: id.digest,
                    origin: Origin::Derived,
                },
            )),
            // Runs are not materializable inputs.
            ObjectKind::Run => Err(EngineError::UnsupportedSpec(spec.to_string())),
        },
        Err(_) => Err(EngineError::UnsupportedSpec(spec.to_string())),
    }
}

fn adopt_path(store: &Store, path: &Path) -> Result<(TypedId, ResolvedInput)> {
    if path.is_dir() {
        let (id, _entries) = store.commit_tree(path)?;
        Ok((
            id,
            ResolvedInput {
                kind: EntryKind::Dir,
                id: id.digest,
                origin: Origin::Adopted,
            },
        ))
    } else if path.is_file() {
        let digest = store.commit_blob(path)?;
        Ok((
            TypedId::blob(digest),
            ResolvedInput {
                kind: EntryKind::File,
                id: digest,
                origin: Origin::Adopted,
            },
        ))
    } else {
        Err(EngineError::MissingInput(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("store")).unwrap();
        (dir, store)
    }

    #[test]
    fn adopts_files_and_directories() {
        let (dir, store) = scratch_store();
        let file = dir.path().join("a.txt");
        fs::write(&file, "A").unwrap();
        let (id, entry) = resolve_spec(&store, &format!("@{}", file.display())).unwrap();
        assert_eq!(id.kind, ObjectKind::Blob);
        assert_eq!(entry.origin, Origin::Adopted);
        assert_eq!(entry.kind, EntryKind::File);

        let sub = dir.path().join("d");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("b.txt"), "B").unwrap();
        let (id, entry) = resolve_spec(&store, &format!("@{}", sub.display())).unwrap();
        assert_eq!(id.kind, ObjectKind::Tree);
        assert_eq!(entry.kind, EntryKind::Dir);
    }

    #[test]
    fn derived_references_keep_their_origin() {
        let (_dir, store) = scratch_store();
        let d = caps_core::hash::digest_bytes(b"x");
        let spec = TypedId::blob(d).to_string();
        let (_, entry) = resolve_spec(&store, &spec).unwrap();
        assert_eq!(entry.origin, Origin::Derived);
    }

    #[test]
    fn missing_alias_is_a_named_error() {
        let (_dir, store) = scratch_store();
        let err = resolve_spec(&store, "alias:no/such").unwrap_err();
        assert!(matches!(err, EngineError::AliasNotFound(name) if name == "no/such"));
    }

    #[test]
    fn alias_chains_resolve_and_loops_terminate() {
        let (dir, store) = scratch_store();
        let file = dir.path().join("a.txt");
        fs::write(&file, "A").unwrap();
        let digest = store.commit_blob(&file).unwrap();
        store
            .alias_set("inner", &TypedId::blob(digest).to_string())
            .unwrap();
        store.alias_set("outer", "alias:inner").unwrap();
        let (id, _) = resolve_spec(&store, "alias:outer").unwrap();
        assert_eq!(id.digest, digest);

        store.alias_set("ouro", "alias:boros").unwrap();
        store.alias_set("boros", "alias:ouro").unwrap();
        let err = resolve_spec(&store, "alias:ouro").unwrap_err();
        assert!(matches!(err, EngineError::AliasDepth { .. }));
    }

    #[test]
    fn runs_and_garbage_are_unsupported() {
        let (_dir, store) = scratch_store();
        let d = caps_core::hash::digest_bytes(b"x");
        assert!(matches!(
            resolve_spec(&store, &TypedId::run(d).to_string()),
            Err(EngineError::UnsupportedSpec(_))
        ));
        assert!(matches!(
            resolve_spec(&store, "not-a-spec"),
            Err(EngineError::UnsupportedSpec(_))
        ));
    }
}
