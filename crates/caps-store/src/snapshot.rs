//! Merkle directory snapshots.
//!
//! A tree is the canonical list of `(relative path, blob digest, size)`
//! for every regular file under a directory, byte-sorted by path. The
//! tree digest covers only the `[path, blob]` pairs — sizes are carried
//! as metadata and never hashed, so the digest is a pure function of
//! path→content.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use caps_core::canon;
use caps_core::hash::{digest_bytes, digest_file, Digest};
use caps_core::id::{ObjectKind, TypedId};

use crate::error::{Result, StoreError};
use crate::store::{atomic_write_bytes, Store};

pub const TREE_VERSION: u32 = 1;

/// One file inside a tree snapshot. Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub blob: Digest,
    pub path: String,
    pub size: u64,
}

/// The tree file as stored under `trees/sha256/...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeFile {
    pub entries: Vec<TreeEntry>,
    pub version: u32,
}

/// Compute the snapshot of a directory without committing anything.
///
/// Returns the tree digest and the sorted entries. Symlinks are
/// followed; non-regular files are skipped; a directory reached twice
/// through links is a cycle and an error.
pub fn snapshot(root: &Path) -> Result<(Digest, Vec<TreeEntry>)> {
    let mut rel_paths = Vec::new();
    let mut visited = HashSet::new();
    walk(root, root, &mut rel_paths, &mut visited)?;
    rel_paths.sort();

    let mut entries = Vec::with_capacity(rel_paths.len());
    for rel in rel_paths {
        let file = root.join(&rel);
        let blob = digest_file(&file)?;
        let size = fs::metadata(&file)?.len();
        entries.push(TreeEntry { blob, path: rel, size });
    }
    Ok((tree_digest(&entries), entries))
}

/// The digest of a snapshot: canonical JSON of its `[path, blob]` pairs.
pub fn tree_digest(entries: &[TreeEntry]) -> Digest {
    let pairs: Vec<Value> = entries
        .iter()
        .map(|e| json!([e.path, e.blob.to_string()]))
        .collect();
    digest_bytes(&canon::to_bytes(&Value::Array(pairs)))
}

fn walk(
    dir: &Path,
    root: &Path,
    out: &mut Vec<String>,
    visited: &mut HashSet<(u64, u64)>,
) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let meta = fs::metadata(dir)?;
        if !visited.insert((meta.dev(), meta.ino())) {
            return Err(StoreError::SymlinkCycle(dir.to_path_buf()));
        }
    }
    #[cfg(not(unix))]
    let _ = &visited;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        // Follows symlinks; unreadable entries (e.g. dangling links) are
        // skipped like other non-regular files.
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if meta.is_dir() {
            walk(&path, root, out, visited)?;
        } else if meta.is_file() {
            out.push(relative_posix(&path, root)?);
        }
    }
    Ok(())
}

fn relative_posix(path: &Path, root: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        StoreError::Core(caps_core::error::Error::Invariant(format!(
            "walked path {} escapes its root",
            path.display()
        )))
    })?;
    let mut parts = Vec::new();
    for comp in rel.components() {
        let s = comp
            .as_os_str()
            .to_str()
            .ok_or_else(|| StoreError::NonUtf8Path(path.to_path_buf()))?;
        parts.push(s);
    }
    Ok(parts.join("/"))
}

impl Store {
    /// Commit a directory snapshot: every file becomes a blob, the tree
    /// file is published only after all blobs exist.
    pub fn commit_tree(&self, src_dir: &Path) -> Result<(TypedId, Vec<TreeEntry>)> {
        let (digest, entries) = snapshot(src_dir)?;
        let tree_file = self.tree_path(&digest);
        if !tree_file.exists() {
            for entry in &entries {
                self.commit_blob(&src_dir.join(&entry.path))?;
            }
            let data = TreeFile {
                entries: entries.clone(),
                version: TREE_VERSION,
            };
            let bytes = serde_json::to_vec(&data).map_err(|e| StoreError::Malformed {
                what: "tree",
                path: tree_file.clone(),
                reason: e.to_string(),
            })?;
            atomic_write_bytes(&tree_file, &bytes)?;
        }
        Ok((TypedId::tree(digest), entries))
    }

    pub fn read_tree(&self, id: &TypedId) -> Result<TreeFile> {
        if id.kind != ObjectKind::Tree {
            return Err(StoreError::WrongKind {
                expected: "tree",
                got: id.to_string(),
            });
        }
        let path = self.tree_path(&id.digest);
        if !path.exists() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let bytes = fs::read(&path)?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Malformed {
            what: "tree",
            path,
            reason: e.to_string(),
        })
    }
}
