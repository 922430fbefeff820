//! Environment fingerprinting.
//!
//! The summary feeds `env_hash`, so it must be deterministic for a given
//! machine state: a fixed env-var whitelist, the crate's declared
//! toolchain, and an OS/arch string. Package capture is opt-in and
//! downgrades to a marker on failure instead of aborting the run.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use caps_core::manifest::{EnvSummary, PackageRecord};

/// Environment variables recorded in every summary (empty when unset).
const ENV_WHITELIST: [&str; 3] = ["TZ", "LANG", "LC_ALL"];

/// Build the environment summary for a run.
pub fn env_summary(capture_packages: bool) -> EnvSummary {
    let env_vars: BTreeMap<String, String> = ENV_WHITELIST
        .iter()
        .map(|k| ((*k).to_string(), env::var(k).unwrap_or_default()))
        .collect();

    let mut summary = EnvSummary {
        runtime: format!("rustc-{}", env!("CARGO_PKG_RUST_VERSION")),
        platform: format!("{}-{}", env::consts::OS, env::consts::ARCH),
        env_vars,
        packages: None,
        packages_error: None,
    };

    if capture_packages {
        match capture_lockfile_packages() {
            Ok(packages) => summary.packages = Some(packages),
            Err(reason) => {
                tracing::warn!(%reason, "package capture failed, recording marker");
                summary.packages_error = Some("failed_to_capture".to_string());
            }
        }
    }

    summary
}

/// The package inventory visible to a compiled binary is its lockfile:
/// walk up from the current directory to the nearest `Cargo.lock` and
/// list its `[[package]]` entries, sorted by lowercased name.
fn capture_lockfile_packages() -> Result<Vec<PackageRecord>, String> {
    let lock_path = find_lockfile().ok_or_else(|| "no Cargo.lock found".to_string())?;
    let text = fs::read_to_string(&lock_path).map_err(|e| e.to_string())?;
    let value: toml::Value = toml::from_str(&text).map_err(|e| e.to_string())?;
    let packages = value
        .get("package")
        .and_then(|p| p.as_array())
        .ok_or_else(|| "lockfile has no [[package]] entries".to_string())?;

    let mut out = Vec::with_capacity(packages.len());
    for pkg in packages {
        let name = pkg.get("name").and_then(|v| v.as_str());
        let version = pkg.get("version").and_then(|v| v.as_str());
        if let (Some(name), Some(version)) = (name, version) {
            out.push(PackageRecord {
                name: name.to_string(),
                version: version.to_string(),
            });
        }
    }
    out.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.version.cmp(&b.version))
    });
    Ok(out)
}

fn find_lockfile() -> Option<PathBuf> {
    let mut dir = env::current_dir().ok()?;
    loop {
        let candidate = dir.join("Cargo.lock");
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_keys_are_always_present() {
        let s = env_summary(false);
        for key in ENV_WHITELIST {
            assert!(s.env_vars.contains_key(key));
        }
        assert!(s.packages.is_none());
        assert!(s.packages_error.is_none());
    }

    #[test]
    fn summary_is_stable_within_a_process() {
        let a = caps_core::canon::to_bytes_of(&env_summary(false)).unwrap();
        let b = caps_core::canon::to_bytes_of(&env_summary(false)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn capture_never_panics() {
        // Either a package list or the marker; both are acceptable here.
        let s = env_summary(true);
        assert!(s.packages.is_some() || s.packages_error.is_some());
    }
}
