//! # scriptrpc CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Evaluate an expression against the bound services
//! scriptrpc run --eval 'clock.now({})'
//!
//! # Run a script file
//! scriptrpc run --file main.js
//!
//! # Start 1000 runs at once and report timings
//! scriptrpc bench --requests 1000
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to change verbosity.

use anyhow::{Context as _, Result};
use argh::FromArgs;
use scriptrpc_cli::{bench, clock};
use scriptrpc_worker::{Worker, WorkerConfig};
use std::time::Duration;

/// Main CLI structure parsed from command-line arguments.
#[derive(FromArgs)]
/// scriptrpc - run JavaScript against RPC services
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Run(RunArgs),
    Bench(BenchArgs),
}

/// Arguments for a single run.
///
/// Exactly one of `--file` and `--eval` must be given.
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
/// run a script once and print its result as JSON
struct RunArgs {
    /// path to the JavaScript file to run
    #[argh(option, short = 'f')]
    file: Option<String>,

    /// script source to run
    #[argh(option, short = 'e')]
    eval: Option<String>,

    /// origin label used in stack traces (defaults to the file path, or main.js)
    #[argh(option)]
    origin: Option<String>,

    /// give up if the script has not settled after this many milliseconds
    #[argh(option, long = "timeout-ms")]
    timeout_ms: Option<u64>,
}

/// Arguments for the benchmark.
#[derive(FromArgs)]
#[argh(subcommand, name = "bench")]
/// start many runs at once against one worker and report timings
struct BenchArgs {
    /// number of runs to start
    #[argh(option, short = 'n', default = "1000")]
    requests: usize,

    /// script source each run evaluates
    #[argh(option, short = 'e', default = "\"clock.now({})\".into()")]
    eval: String,

    /// do not print individual results
    #[argh(switch, short = 'q')]
    quiet: bool,
}

impl RunArgs {
    /// Resolves the script source and its origin label.
    fn source(&self) -> Result<(String, String)> {
        match (&self.file, &self.eval) {
            (Some(path), None) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read script {path}"))?;
                let origin = self.origin.clone().unwrap_or_else(|| path.clone());
                Ok((source, origin))
            }
            (None, Some(source)) => {
                let origin = self.origin.clone().unwrap_or_else(|| "main.js".to_string());
                Ok((source.clone(), origin))
            }
            (Some(_), Some(_)) => anyhow::bail!("--file and --eval are mutually exclusive"),
            (None, None) => anyhow::bail!("one of --file or --eval is required"),
        }
    }
}

fn worker_config(timeout_ms: Option<u64>) -> WorkerConfig {
    let mut config = WorkerConfig::new();
    if let Some(ms) = timeout_ms {
        config = config.with_wait_timeout(Duration::from_millis(ms));
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Set default log level to INFO, but allow RUST_LOG env var to override.
    // Stdout is reserved for results.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run_once(args).await,
        Commands::Bench(args) => run_bench(args).await,
    }
}

/// Executes the `run` subcommand.
async fn run_once(args: RunArgs) -> Result<()> {
    let (source, origin) = args.source()?;
    let mut worker = Worker::with_config(vec![clock::service()], worker_config(args.timeout_ms))?;

    tracing::debug!("Running {origin}");
    let value = worker.run_to_completion(&source, &origin).await?;
    println!("{}", worker.stringify(&value)?);

    Ok(())
}

/// Executes the `bench` subcommand.
async fn run_bench(args: BenchArgs) -> Result<()> {
    let mut worker = Worker::new(vec![clock::service()])?;
    tracing::info!("Starting {} runs of {:?}", args.requests, args.eval);

    let quiet = args.quiet;
    let report = bench::run_bench(&mut worker, &args.eval, args.requests, |text| {
        if !quiet {
            println!("{text}");
        }
    })
    .await?;

    println!("{report}");
    println!("{}", serde_json::to_string_pretty(&report.stats)?);

    Ok(())
}
