use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use annoscope::engine::analyze;
use annoscope::manifest::load_manifest;
use annoscope::report::{build_invocation, build_sarif, modeled_call_result};

/// CLI arguments for annoscope execution.
#[derive(Parser, Debug)]
#[command(
    name = "annoscope",
    about = "Call graph modeling of reflective getAnnotation lookups, reported as SARIF.",
    version
)]
struct Cli {
    /// JSON program manifest to analyze.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    timing: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);
    run(cli)
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "error" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

fn run(cli: Cli) -> Result<()> {
    if !cli.input.exists() {
        anyhow::bail!("input not found: {}", cli.input.display());
    }

    let started_at = Instant::now();
    let manifest = load_manifest(&cli.input)?;
    let output = analyze(manifest.classes)?;
    let results = output.modeled_calls.iter().map(modeled_call_result).collect();
    let invocation = build_invocation(std::env::args().collect());
    let sarif = build_sarif(results, invocation);

    let mut writer = output_writer(cli.output.as_deref())?;
    serde_json::to_writer_pretty(&mut writer, &sarif)
        .context("failed to serialize SARIF output")?;
    writer
        .write_all(b"\n")
        .context("failed to write SARIF output")?;

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} classes={} nodes={} edges={} modeled={} synthetic={}",
            started_at.elapsed().as_millis(),
            output.class_count,
            output.node_count,
            output.edge_count,
            output.modeled_calls.len(),
            output.synthetic_class_count
        );
    }

    Ok(())
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}
