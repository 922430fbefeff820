//! SHA-256 digests and deterministic digest combination.
//!
//! Every content-addressed object in the store is keyed by the
//! `sha256:<hex>` form produced here. The combiner is order-sensitive on
//! purpose: `combine([a, b]) != combine([b, a])`.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};

use crate::error::{Error, Result};

/// Streaming chunk size for file digests (8 MiB).
const CHUNK: usize = 8 * 1024 * 1024;

/// A SHA-256 digest. Wire form is `sha256:<64 lowercase hex chars>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Bare hex form, without the `sha256:` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from the `sha256:<hex>` wire form.
    pub fn parse(s: &str) -> Result<Self> {
        let hex_part = s
            .strip_prefix("sha256:")
            .ok_or_else(|| Error::Digest(format!("missing sha256: prefix in {s:?}")))?;
        if hex_part.len() != 64 || !hex_part.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(Error::Digest(format!("expected 64 lowercase hex chars in {s:?}")));
        }
        let raw = hex::decode(hex_part).map_err(|e| Error::Digest(e.to_string()))?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&raw);
        Ok(Digest(out))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Digest::parse(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// SHA-256 of a byte slice.
pub fn digest_bytes(bytes: &[u8]) -> Digest {
    let out = Sha256::digest(bytes);
    Digest(out.into())
}

/// Streaming SHA-256 of a file's contents.
pub fn digest_file(path: &Path) -> Result<Digest> {
    let mut f = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Digest(hasher.finalize().into()))
}

/// Combine digests into one by hashing their wire forms joined with `|`.
///
/// Order-sensitive and non-commutative; used to derive run ids from
/// (code, inputs, params, env).
pub fn combine(ids: &[Digest]) -> Digest {
    let joined = ids
        .iter()
        .map(Digest::to_string)
        .collect::<Vec<_>>()
        .join("|");
    digest_bytes(joined.as_bytes())
}
