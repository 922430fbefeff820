//! Strongly-typed identifiers used across the store and engine.
//!
//! A typed id is a kind prefix plus a digest: `blob:sha256:<hex>`,
//! `tree:sha256:<hex>`, or `run:sha256:<hex>`. The untyped `sha256:<hex>`
//! form is a raw [`Digest`](crate::hash::Digest).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::Digest;

/// Kind of content-addressed object a typed id points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Run,
}

impl ObjectKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Run => "run",
        }
    }
}

/// A kind-prefixed digest string, parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypedId {
    pub kind: ObjectKind,
    pub digest: Digest,
}

impl TypedId {
    pub fn new(kind: ObjectKind, digest: Digest) -> Self {
        Self { kind, digest }
    }

    pub fn blob(digest: Digest) -> Self {
        Self::new(ObjectKind::Blob, digest)
    }

    pub fn tree(digest: Digest) -> Self {
        Self::new(ObjectKind::Tree, digest)
    }

    pub fn run(digest: Digest) -> Self {
        Self::new(ObjectKind::Run, digest)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (prefix, rest) = s
            .split_once(':')
            .ok_or_else(|| Error::TypedId(format!("missing kind prefix in {s:?}")))?;
        let kind = match prefix {
            "blob" => ObjectKind::Blob,
            "tree" => ObjectKind::Tree,
            "run" => ObjectKind::Run,
            other => return Err(Error::TypedId(format!("unknown kind prefix {other:?} in {s:?}"))),
        };
        let digest = Digest::parse(rest)?;
        Ok(Self { kind, digest })
    }
}

impl fmt::Display for TypedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), self.digest)
    }
}

impl FromStr for TypedId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TypedId::parse(s)
    }
}

/// Manifest entry kind: `file` entries are blobs, `dir` entries are trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    /// The object kind a manifest entry of this kind refers to.
    pub fn object_kind(self) -> ObjectKind {
        match self {
            EntryKind::File => ObjectKind::Blob,
            EntryKind::Dir => ObjectKind::Tree,
        }
    }

    /// Wire token, as it appears in manifests and hash inputs.
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Dir => "dir",
        }
    }

    pub fn typed_id(self, digest: Digest) -> TypedId {
        TypedId::new(self.object_kind(), digest)
    }
}
