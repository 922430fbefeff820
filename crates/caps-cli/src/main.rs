//! caps CLI: run steps, adopt artifacts, inspect manifests and lineage.

mod config;
mod steps;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use caps_core::config::EngineConfig;
use caps_core::hash::Digest;
use caps_core::id::TypedId;
use caps_engine::{Engine, RunRequest};
use caps_store::{LinkMethod, Store};

use config::{load_config, merge_params, parse_keyval_list};

#[derive(Parser)]
#[command(name = "caps")]
#[command(about = "Content-addressed pipeline store for reproducible computation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a registered step
    Run {
        /// Name of a registered step (see `--help` for the list)
        step: String,

        /// TOML/JSON config file with parameters
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// KEY=VALUE parameter override (repeatable)
        #[arg(long = "param")]
        params: Vec<String>,

        /// NAME=SPEC input binding (repeatable); SPEC is '@/path',
        /// 'blob:sha256:..', 'tree:sha256:..' or 'alias:name'
        #[arg(long = "input")]
        inputs: Vec<String>,

        /// Store root (default: $CAPS_STORE or .caps_store)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Set this alias to the run on success (e.g. runs/latest)
        #[arg(long)]
        alias: Option<String>,

        /// Env prefix for parameters
        #[arg(long, default_value = "CAPS_PARAM_")]
        env_prefix: String,

        /// Capture the lockfile package inventory into the env summary
        #[arg(long)]
        capture_packages: bool,
    },

    /// Adopt a file or directory into the store
    Adopt {
        path: PathBuf,

        /// Create an alias pointing at the adopted object
        #[arg(long)]
        alias: Option<String>,

        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Show or materialize a run manifest
    Manifest {
        #[command(subcommand)]
        command: ManifestCommands,
    },

    /// Set or get aliases
    Alias {
        #[command(subcommand)]
        command: AliasCommands,
    },

    /// Find which run produced a blob or tree
    WhoBuilt {
        /// blob:sha256:.. or tree:sha256:..
        typed_id: String,

        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Trace lineage of a blob or tree back to adopted sources
    Trace {
        /// blob:sha256:.. or tree:sha256:..
        typed_id: String,

        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ManifestCommands {
    /// Print the manifest JSON
    Show {
        run_id: String,

        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Materialize the outputs of a run into a directory
    View {
        run_id: String,

        /// Destination directory (created or overwritten)
        #[arg(long)]
        into: PathBuf,

        /// Force a method; default prefers symlink > hardlink > copy
        #[arg(long)]
        mode: Option<ModeArg>,

        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AliasCommands {
    Set {
        name: String,
        /// Target like 'run:sha256:..', 'blob:sha256:..' or 'tree:sha256:..'
        target: String,

        #[arg(long)]
        store: Option<PathBuf>,
    },
    Get {
        name: String,

        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Symlink,
    Hardlink,
    Copy,
}

impl From<ModeArg> for LinkMethod {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Symlink => LinkMethod::Symlink,
            ModeArg::Hardlink => LinkMethod::Hardlink,
            ModeArg::Copy => LinkMethod::Copy,
        }
    }
}

/// String error for CLI-layer failures.
#[derive(Debug)]
pub struct CliError(String);

impl CliError {
    pub fn new(msg: String) -> Self {
        Self(msg)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CliError {}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            step,
            config,
            params,
            inputs,
            store,
            alias,
            env_prefix,
            capture_packages,
        } => run_step(
            &step,
            config.as_deref(),
            &params,
            &inputs,
            store,
            alias,
            &env_prefix,
            capture_packages,
        ),
        Commands::Adopt { path, alias, store } => adopt(&path, alias.as_deref(), store),
        Commands::Manifest { command } => match command {
            ManifestCommands::Show { run_id, store } => show_manifest(&run_id, store),
            ManifestCommands::View {
                run_id,
                into,
                mode,
                store,
            } => view_manifest(&run_id, &into, mode, store),
        },
        Commands::Alias { command } => match command {
            AliasCommands::Set {
                name,
                target,
                store,
            } => alias_set(&name, &target, store),
            AliasCommands::Get { name, store } => alias_get(&name, store),
        },
        Commands::WhoBuilt { typed_id, store } => who_built(&typed_id, store),
        Commands::Trace { typed_id, store } => trace(&typed_id, store),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn engine_config(store: Option<PathBuf>, capture_packages: bool) -> EngineConfig {
    let mut cfg = EngineConfig::from_env();
    if let Some(root) = store {
        cfg.store_root = root;
    }
    cfg.capture_packages = capture_packages;
    cfg
}

fn open_store(store: Option<PathBuf>) -> Result<Store, Box<dyn std::error::Error>> {
    let cfg = engine_config(store, false);
    Ok(Store::open(cfg.store_root)?)
}

#[allow(clippy::too_many_arguments)]
fn run_step(
    step_name: &str,
    config_path: Option<&Path>,
    params: &[String],
    inputs: &[String],
    store: Option<PathBuf>,
    alias: Option<String>,
    env_prefix: &str,
    capture_packages: bool,
) -> CmdResult {
    let module = steps::make(step_name).ok_or_else(|| {
        CliError::new(format!(
            "unknown step {step_name:?}; registered steps: {}",
            steps::names().join(", ")
        ))
    })?;

    let defaults = module.defaults();
    let file_params = load_config(config_path)?;
    let cli_params = parse_keyval_list(params)?;
    let (effective, provenance) = merge_params(&defaults, &file_params, env_prefix, &cli_params);

    let request = RunRequest {
        inputs: parse_keyval_list(inputs)?,
        params: effective,
        provenance,
        alias,
    };

    let engine = Engine::new(engine_config(store, capture_packages))?;
    let outcome = engine.run(&module, &request)?;
    println!("{}", outcome.run_id);
    Ok(())
}

fn adopt(path: &Path, alias: Option<&str>, store: Option<PathBuf>) -> CmdResult {
    let store = open_store(store)?;
    let typed_id = if path.is_dir() {
        let (id, _entries) = store.commit_tree(path)?;
        id
    } else if path.is_file() {
        TypedId::blob(store.commit_blob(path)?)
    } else {
        return Err(CliError::new(format!("no such file or directory: {}", path.display())).into());
    };
    if let Some(alias) = alias {
        store.alias_set(alias, &typed_id.to_string())?;
    }
    println!("{typed_id}");
    Ok(())
}

fn show_manifest(run_id: &str, store: Option<PathBuf>) -> CmdResult {
    let store = open_store(store)?;
    let manifest = store.load_manifest(&parse_run_id(run_id)?)?;
    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}

fn view_manifest(
    run_id: &str,
    into: &Path,
    mode: Option<ModeArg>,
    store: Option<PathBuf>,
) -> CmdResult {
    let store = open_store(store)?;
    let manifest = store.load_manifest(&parse_run_id(run_id)?)?;
    if into.exists() {
        fs::remove_dir_all(into)?;
    }
    fs::create_dir_all(into)?;
    for output in &manifest.outputs {
        let id = output.kind.typed_id(output.id);
        store.materialize(&id, &into.join(&output.logical_name), mode.map(Into::into))?;
    }
    println!("{}", into.display());
    Ok(())
}

fn alias_set(name: &str, target: &str, store: Option<PathBuf>) -> CmdResult {
    let store = open_store(store)?;
    store.alias_set(name, target)?;
    Ok(())
}

fn alias_get(name: &str, store: Option<PathBuf>) -> CmdResult {
    let store = open_store(store)?;
    let value = store.alias_get(name)?;
    println!("{}", value.unwrap_or_default());
    Ok(())
}

fn who_built(typed_id: &str, store: Option<PathBuf>) -> CmdResult {
    let store = open_store(store)?;
    let id = TypedId::parse(typed_id)?;
    match store.who_built(&id)? {
        Some(run_id) => println!("{run_id}"),
        None => println!(),
    }
    Ok(())
}

fn trace(typed_id: &str, store: Option<PathBuf>) -> CmdResult {
    let store = open_store(store)?;
    let id = TypedId::parse(typed_id)?;
    for line in store.trace(&id)? {
        println!("{line}");
    }
    Ok(())
}

/// Accept either `sha256:<hex>` or the typed `run:sha256:<hex>` form.
fn parse_run_id(s: &str) -> Result<Digest, Box<dyn std::error::Error>> {
    let raw = s.strip_prefix("run:").unwrap_or(s);
    Ok(Digest::parse(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caps_core::hash::digest_bytes;

    #[test]
    fn run_ids_parse_with_or_without_prefix() {
        let d = digest_bytes(b"x");
        assert_eq!(parse_run_id(&d.to_string()).unwrap(), d);
        assert_eq!(parse_run_id(&format!("run:{d}")).unwrap(), d);
        assert!(parse_run_id("blob:whatever").is_err());
    }

    #[test]
    fn mode_arg_maps_onto_link_methods() {
        assert_eq!(LinkMethod::from(ModeArg::Symlink), LinkMethod::Symlink);
        assert_eq!(LinkMethod::from(ModeArg::Hardlink), LinkMethod::Hardlink);
        assert_eq!(LinkMethod::from(ModeArg::Copy), LinkMethod::Copy);
    }

    #[test]
    fn cli_declaration_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
