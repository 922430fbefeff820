#![forbid(unsafe_code)]
//! caps-store: the on-disk content-addressed store.
//!
//! Layout under the store root:
//!
//! ```text
//! blobs/sha256/<first-2-hex>/<full-hex>
//! trees/sha256/<first-2-hex>/<full-hex>
//! manifests/sha256/<first-2-hex>/<full-hex>.json
//! aliases/<name>
//! tmp/
//! ```
//!
//! Blobs, trees, and manifests are immutable and published atomically
//! (temp sibling, fsync, rename). Aliases are mutable pointers; last
//! writer wins. The store is append-only: nothing here deletes objects.

pub mod error;
pub mod lineage;
pub mod materialize;
pub mod snapshot;
pub mod store;

pub use error::{Result, StoreError};
pub use materialize::{copy_dir_recursive, LinkMethod};
pub use snapshot::{TreeEntry, TreeFile, TREE_VERSION};
pub use store::Store;
