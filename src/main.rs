//! compute-creator CLI entrypoint.
//!
//! Loads the configuration document, builds one instance and exits with a
//! code that identifies the error class on failure.

use std::process::ExitCode;

use compute_creator::cli::{Cli, OutputFormat, OutputFormatter};
use compute_creator::error::{ComputeError, Result};
use compute_creator::ComputeCreator;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    init_logging(cli.verbose, cli.output);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(&cli, &formatter)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprint!("{}", formatter.format_error(&e));
            ExitCode::from(e.exit_code())
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, output: OutputFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match output {
        OutputFormat::Json => builder.json().init(),
        OutputFormat::Text => builder.init(),
    }
}

/// Main async entry point.
async fn run(cli: &Cli, formatter: &OutputFormatter) -> Result<()> {
    info!("compute-creator v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration document: {}", cli.config.display());

    let creator = ComputeCreator::from_path(&cli.config)?;
    let outcome = creator.build_compute_instance().await?;

    let rendered = formatter.format_outcome(creator.request(), &outcome);
    print_stdout(&rendered).map_err(|e| ComputeError::internal(format!("failed to write output: {e}")))
}

fn print_stdout(text: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()
}
