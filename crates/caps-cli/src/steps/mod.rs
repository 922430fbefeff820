//! Builtin steps and the registry the CLI dispatches through.

pub mod append_suffix;
pub mod uppercase;

use caps_engine::StepModule;

/// Instantiate a builtin step module by registry name.
pub fn make(name: &str) -> Option<StepModule> {
    match name {
        "append-suffix" => Some(append_suffix::module()),
        "uppercase" => Some(uppercase::module()),
        _ => None,
    }
}

/// Registered step names, for help and error messages.
pub fn names() -> &'static [&'static str] {
    &["append-suffix", "uppercase"]
}
