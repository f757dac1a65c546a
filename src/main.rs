//! nullprop CLI binary entry point.
//!
//! Every command prints one JSON response on stdout. Logs go to stderr.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use nullprop::cli::{run_annotate, run_graph, AnnotateOptions};
use nullprop::config::OutputFormat;
use nullprop::error::{NullpropError, OutputErrorCode};
use nullprop::output::{emit_response, ErrorResponse};

/// Whole-program nullability annotation propagation.
#[derive(Parser, Debug)]
#[command(name = "nullprop", version, about = "Propagate nullability annotations")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output (RUST_LOG takes precedence).
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Configuration file (default: nullprop.toml next to the input).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Output format flag.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Source,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Source => OutputFormat::Source,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Propagate annotations and write every modified file.
    Annotate {
        /// Model document, or a directory of model documents.
        input: PathBuf,

        /// Output directory (default: nullprop-out next to the input).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Output format for rewritten files.
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Render modified files without writing them.
        #[arg(long)]
        dry_run: bool,

        /// Leave a pass out of the battery (repeatable).
        #[arg(long = "disable", value_name = "PASS")]
        disable: Vec<String>,
    },

    /// Print the entities and dependency edges of the input.
    Graph {
        /// Model document, or a directory of model documents.
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON too, so callers parse one stream.
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), NullpropError> {
    let mut stdout = io::stdout();
    match cli.command {
        Command::Annotate {
            input,
            out,
            format,
            dry_run,
            disable,
        } => {
            let options = AnnotateOptions {
                input,
                config: cli.global.config,
                out,
                format: format.map(OutputFormat::from),
                dry_run,
                disabled: disable,
            };
            let response = run_annotate(&options)?;
            emit_response(&response, &mut stdout).map_err(NullpropError::Output)?;
        }
        Command::Graph { input } => {
            let response = run_graph(&input, cli.global.config.as_deref())?;
            emit_response(&response, &mut stdout).map_err(NullpropError::Output)?;
        }
    }
    let _ = stdout.flush();
    Ok(())
}
