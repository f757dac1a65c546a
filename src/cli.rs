//! Command implementations behind the `nullprop` binary.
//!
//! Each function loads its input, does its work, and returns the response to
//! print. Printing and exit codes belong to `main.rs`.
//!
//! ## Configuration
//!
//! Settings come from `--config` when given, otherwise from `nullprop.toml`
//! next to the input. Flags win over file settings; disabled passes from both
//! sources are combined.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use nullprop_core::builder::GraphBuilder;
use nullprop_core::config::{NullpropConfig, OutputFormat};
use nullprop_core::driver::FixpointDriver;
use nullprop_core::error::NullpropResult;
use nullprop_core::oracle::ModelOracle;
use nullprop_core::output::{AnnotateResponse, GraphResponse};
use nullprop_core::passes::passes_without;
use nullprop_core::persist::{persist_modified, DirectoryPersister, DryRunPersister, Persister};
use nullprop_core::program::Program;

/// Directory rewritten files go to when `--out` is not given, relative to the
/// input's project directory. Directory loads skip it.
pub use nullprop_core::program::DEFAULT_OUT_DIR;

/// Options for [`run_annotate`].
#[derive(Debug, Clone, Default)]
pub struct AnnotateOptions {
    /// Model document or directory of model documents.
    pub input: PathBuf,
    pub config: Option<PathBuf>,
    pub out: Option<PathBuf>,
    /// Overrides the configured output format.
    pub format: Option<OutputFormat>,
    pub dry_run: bool,
    /// Passes to leave out, on top of the configured ones.
    pub disabled: Vec<String>,
}

/// Directory that holds `input`'s project configuration.
fn project_dir(input: &Path) -> &Path {
    if input.is_dir() {
        return input;
    }
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Load the explicit config file, or the project one next to `input`.
pub fn load_config(input: &Path, explicit: Option<&Path>) -> NullpropResult<NullpropConfig> {
    match explicit {
        Some(path) => NullpropConfig::load(path),
        None => NullpropConfig::load_from_project(project_dir(input)),
    }
}

/// Load `input` and register the configured value types.
pub fn load_program(input: &Path, config: &NullpropConfig) -> NullpropResult<Program> {
    let mut program = Program::load(input)?;
    for name in &config.propagation.value_types {
        program.add_value_type(name.clone());
    }
    debug!(
        files = program.files().count(),
        externals = program.externals().len(),
        "loaded program"
    );
    Ok(program)
}

/// Configured and requested disabled passes, without duplicates.
fn disabled_passes(config: &NullpropConfig, requested: &[String]) -> Vec<String> {
    let mut disabled = config.propagation.disabled_passes.clone();
    for name in requested {
        if !disabled.contains(name) {
            disabled.push(name.clone());
        }
    }
    disabled
}

/// Propagate annotations through the input and persist modified files.
pub fn run_annotate(options: &AnnotateOptions) -> NullpropResult<AnnotateResponse> {
    let config = load_config(&options.input, options.config.as_deref())?;
    let format = options.format.unwrap_or(config.output.format);
    let disabled = disabled_passes(&config, &options.disabled);
    let passes = passes_without(&disabled)?;

    let program = load_program(&options.input, &config)?;
    let oracle = ModelOracle::new();
    let mut graph = GraphBuilder::new(&oracle).build(program)?;
    let driver = FixpointDriver::new(passes, Box::new(oracle));
    let report = driver.run(&mut graph)?;
    let program = graph.into_store().into_program();

    let out = options
        .out
        .clone()
        .unwrap_or_else(|| project_dir(&options.input).join(DEFAULT_OUT_DIR));
    let persister: Box<dyn Persister> = if options.dry_run {
        Box::new(DryRunPersister::new(&out, format))
    } else {
        Box::new(DirectoryPersister::new(&out, format))
    };
    let files = persist_modified(persister.as_ref(), &program)?;

    info!(
        mutations = report.mutation_count(),
        conflicts = report.conflicts.len(),
        files = files.len(),
        dry_run = options.dry_run,
        "annotate complete"
    );
    Ok(AnnotateResponse::new(report, files, options.dry_run))
}

/// Build the dependency graph of the input without running any pass.
pub fn run_graph(input: &Path, config: Option<&Path>) -> NullpropResult<GraphResponse> {
    let config = load_config(input, config)?;
    let program = load_program(input, &config)?;
    let graph = GraphBuilder::new(&ModelOracle::new()).build(program)?;
    Ok(GraphResponse::from_graph(&graph))
}
