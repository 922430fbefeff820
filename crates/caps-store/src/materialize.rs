//! Materialization: reconstruct files and directories from typed ids.
//!
//! Linking preference is symlink, then hardlink, then copy; each failure
//! falls through silently to the next. Only copy is required to succeed
//! on a working filesystem. A forced mode disables the chain.

use std::fmt;
use std::fs;
use std::path::Path;

use caps_core::id::{ObjectKind, TypedId};

use crate::error::{Result, StoreError};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMethod {
    Symlink,
    Hardlink,
    Copy,
}

impl LinkMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkMethod::Symlink => "symlink",
            LinkMethod::Hardlink => "hardlink",
            LinkMethod::Copy => "copy",
        }
    }
}

impl fmt::Display for LinkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Store {
    /// Materialize a blob or tree at `dest`, removing whatever is there.
    ///
    /// Returns the method used; for a tree, the first entry's method
    /// (`Copy` for an empty tree). `mode` forces a single method and
    /// disables the fallback chain.
    pub fn materialize(
        &self,
        id: &TypedId,
        dest: &Path,
        mode: Option<LinkMethod>,
    ) -> Result<LinkMethod> {
        match id.kind {
            ObjectKind::Blob => {
                let src = self.blob_path(&id.digest);
                if !src.exists() {
                    return Err(StoreError::NotFound(id.to_string()));
                }
                link(&src, dest, mode)
            }
            ObjectKind::Tree => {
                let tree = self.read_tree(id)?;
                remove_existing(dest)?;
                fs::create_dir_all(dest)?;
                let mut first = None;
                for entry in &tree.entries {
                    let src = self.blob_path(&entry.blob);
                    if !src.exists() {
                        return Err(StoreError::NotFound(format!("blob:{}", entry.blob)));
                    }
                    let out = dest.join(&entry.path);
                    let used = link(&src, &out, mode)?;
                    first.get_or_insert(used);
                }
                Ok(first.unwrap_or(LinkMethod::Copy))
            }
            ObjectKind::Run => Err(StoreError::WrongKind {
                expected: "blob or tree",
                got: id.to_string(),
            }),
        }
    }
}

fn link(src: &Path, dst: &Path, mode: Option<LinkMethod>) -> Result<LinkMethod> {
    match mode {
        None => prefer_link(src, dst),
        Some(m) => force_link(src, dst, m),
    }
}

/// Try symlink, then hardlink, then copy. Fallbacks are silent except
/// for a debug trace; only the final copy propagates its error.
pub fn prefer_link(src: &Path, dst: &Path) -> Result<LinkMethod> {
    prepare_destination(dst)?;

    #[cfg(unix)]
    match std::os::unix::fs::symlink(src, dst) {
        Ok(()) => return Ok(LinkMethod::Symlink),
        Err(e) => tracing::debug!(src = %src.display(), error = %e, "symlink failed, falling back"),
    }

    if !src.is_dir() {
        match fs::hard_link(src, dst) {
            Ok(()) => return Ok(LinkMethod::Hardlink),
            Err(e) => {
                tracing::debug!(src = %src.display(), error = %e, "hardlink failed, falling back")
            }
        }
    }

    copy_any(src, dst)?;
    Ok(LinkMethod::Copy)
}

/// Apply exactly one method; no fallback.
pub fn force_link(src: &Path, dst: &Path, mode: LinkMethod) -> Result<LinkMethod> {
    prepare_destination(dst)?;
    match mode {
        LinkMethod::Symlink => {
            #[cfg(unix)]
            std::os::unix::fs::symlink(src, dst)?;
            #[cfg(not(unix))]
            return Err(StoreError::Io(std::io::Error::other(
                "symlinks unsupported on this platform",
            )));
        }
        LinkMethod::Hardlink => {
            if src.is_dir() {
                return Err(StoreError::Io(std::io::Error::other(
                    "cannot hardlink a directory",
                )));
            }
            fs::hard_link(src, dst)?;
        }
        LinkMethod::Copy => copy_any(src, dst)?,
    }
    Ok(mode)
}

fn prepare_destination(dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    remove_existing(dst)
}

fn remove_existing(dst: &Path) -> Result<()> {
    // symlink_metadata so a link to a directory is unlinked, not recursed.
    match fs::symlink_metadata(dst) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dst)?,
        Ok(_) => fs::remove_file(dst)?,
        Err(_) => {}
    }
    Ok(())
}

fn copy_any(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        copy_dir_recursive(src, dst)?;
    } else {
        fs::copy(src, dst)?;
    }
    Ok(())
}

/// Recursive copy that dereferences symlinks, so a copy of a
/// materialized input never points back into the store.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let meta = fs::metadata(&from)?;
        if meta.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}
