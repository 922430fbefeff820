#![forbid(unsafe_code)]
//! Facade crate for the caps workspace.
//!
//! Embedders can depend on this single crate; the integration tests in
//! `tests/` exercise the full stack through it.

pub use caps_core;
pub use caps_engine;
pub use caps_store;

pub use caps_core::{TOOL_NAME, VERSION};
