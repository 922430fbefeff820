//! The store handle: layout, atomic publish, blobs, manifests, aliases.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use caps_core::hash::{digest_file, Digest};
use caps_core::id::TypedId;
use caps_core::manifest::Manifest;

use crate::error::{Result, StoreError};

/// Streaming copy buffer for blob commits (8 MiB).
const COPY_CHUNK: usize = 8 * 1024 * 1024;

/// Handle to a store root. Cheap to clone; owns no open files.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open a store, creating the layout if needed. Idempotent.
    ///
    /// The root is made absolute so that symlinks materialized elsewhere
    /// on the filesystem still point into the store.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()?.join(root)
        };
        for sub in [
            "blobs/sha256",
            "trees/sha256",
            "manifests/sha256",
            "aliases",
            "tmp",
        ] {
            fs::create_dir_all(root.join(sub))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch area for run working directories.
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    fn fanout(&self, kind: &str, digest: &Digest) -> PathBuf {
        let hex = digest.to_hex();
        self.root
            .join(kind)
            .join("sha256")
            .join(&hex[..2])
            .join(&hex[2..])
    }

    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.fanout("blobs", digest)
    }

    pub fn tree_path(&self, digest: &Digest) -> PathBuf {
        self.fanout("trees", digest)
    }

    pub fn manifest_path(&self, run_id: &Digest) -> PathBuf {
        let mut p = self.fanout("manifests", run_id);
        p.set_extension("json");
        p
    }

    pub fn alias_path(&self, name: &str) -> Result<PathBuf> {
        validate_alias_name(name)?;
        Ok(self.root.join("aliases").join(name))
    }

    /// Commit a file into the blob tree by its digest.
    ///
    /// Streams the file twice: once to hash, once to publish. Committing
    /// bytes that are already present is a no-op.
    pub fn commit_blob(&self, src: &Path) -> Result<Digest> {
        let digest = digest_file(src)?;
        let dst = self.blob_path(&digest);
        if dst.exists() {
            return Ok(digest);
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_sibling(&dst);
        let result = (|| -> Result<()> {
            let mut reader = File::open(src)?;
            let mut writer = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
            let mut buf = vec![0u8; COPY_CHUNK];
            loop {
                let n = io::Read::read(&mut reader, &mut buf)?;
                if n == 0 {
                    break;
                }
                writer.write_all(&buf[..n])?;
            }
            writer.flush()?;
            writer.sync_all()?;
            fs::rename(&tmp, &dst)?;
            Ok(())
        })();
        if result.is_err() {
            // Losing a publish race is fine; a stale temp is not.
            let _ = fs::remove_file(&tmp);
            result?;
        }
        Ok(digest)
    }

    pub fn write_manifest(&self, run_id: &Digest, manifest: &Manifest) -> Result<()> {
        let path = self.manifest_path(run_id);
        let bytes = serde_json::to_vec_pretty(manifest).map_err(|e| StoreError::Malformed {
            what: "manifest",
            path: path.clone(),
            reason: e.to_string(),
        })?;
        atomic_write_bytes(&path, &bytes)?;
        Ok(())
    }

    pub fn load_manifest(&self, run_id: &Digest) -> Result<Manifest> {
        let path = self.manifest_path(run_id);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("run:{run_id}")));
        }
        read_manifest_file(&path)
    }

    /// Paths of every manifest in the store, sorted for stable scans.
    pub fn iter_manifests(&self) -> Result<Vec<PathBuf>> {
        let base = self.root.join("manifests").join("sha256");
        let mut out = Vec::new();
        if !base.exists() {
            return Ok(out);
        }
        for shard in fs::read_dir(&base)? {
            let shard = shard?.path();
            if !shard.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&shard)? {
                let path = entry?.path();
                if path.extension().is_some_and(|e| e == "json") {
                    out.push(path);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Point an alias at a target. Atomic overwrite; last writer wins.
    ///
    /// The target must be a typed id or an `alias:<name>` chain link.
    /// Names may contain `/` to form nested groups (`runs/latest`).
    pub fn alias_set(&self, name: &str, target: &str) -> Result<()> {
        if let Some(chained) = target.strip_prefix("alias:") {
            validate_alias_name(chained)?;
        } else {
            TypedId::parse(target).map_err(|_| StoreError::AliasTarget(target.to_string()))?;
        }
        let path = self.alias_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write_bytes(&path, format!("{target}\n").as_bytes())
    }

    /// Read an alias. Returns the raw target string (a typed id, or an
    /// `alias:` link for chained aliases); `None` if the alias is missing.
    pub fn alias_get(&self, name: &str) -> Result<Option<String>> {
        let path = self.alias_path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        Ok(Some(text.trim().to_string()))
    }
}

pub(crate) fn read_manifest_file(path: &Path) -> Result<Manifest> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Malformed {
        what: "manifest",
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Atomic publish: write a temp sibling, fsync, rename into place.
///
/// A reader observing the final path sees fully written bytes. A crash
/// can leave a `*.tmp-*` sibling behind; it never shadows the target.
pub(crate) fn atomic_write_bytes(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(path);
    let result = (|| -> Result<()> {
        let mut f = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        f.write_all(data)?;
        f.flush()?;
        f.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".tmp-{nanos}"));
    path.with_file_name(name)
}

fn validate_alias_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::AliasName(name.to_string()));
    }
    let path = Path::new(name);
    let plain = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !plain {
        return Err(StoreError::AliasName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_names_stay_inside_the_store() {
        assert!(validate_alias_name("runs/latest").is_ok());
        assert!(validate_alias_name("clean").is_ok());
        assert!(validate_alias_name("").is_err());
        assert!(validate_alias_name("../escape").is_err());
        assert!(validate_alias_name("a/../escape").is_err());
        assert!(validate_alias_name("/absolute").is_err());
    }

    #[test]
    fn fanout_uses_two_hex_chars() {
        let store = Store {
            root: PathBuf::from("/store"),
        };
        let d = caps_core::hash::digest_bytes(b"");
        let hex = d.to_hex();
        let p = store.blob_path(&d);
        assert!(p.ends_with(format!("blobs/sha256/{}/{}", &hex[..2], &hex[2..])));
        let m = store.manifest_path(&d);
        assert!(m.to_str().unwrap().ends_with(".json"));
    }
}
