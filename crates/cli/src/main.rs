use anyhow::{Context, Result};
use buildwatch_client::{
    discover_endpoint, establish_default, SessionOptions, SystemClock, SystemProcessRunner,
    TimeBudget,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Establishment is a pre-build step; waiting longer than this for a daemon
// that is not answering defeats its purpose.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "buildwatch")]
#[command(about = "Establish watch sessions with a watchman daemon", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for output)
    #[arg(long, global = true)]
    quiet: bool,

    /// Daemon executable (falls back to $WATCHMAN_EXE, then `watchman`)
    #[arg(long, global = true)]
    daemon_exe: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Establish a session for the given roots and print its descriptor as
    /// JSON. Exits 1 when no session could be established.
    Probe {
        /// Project roots to watch
        #[arg(required = true)]
        roots: Vec<PathBuf>,

        /// Overall time budget in milliseconds; 0 disables the deadline
        /// (defaults to $BUILDWATCH_TIMEOUT_MS, then 10000)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print the daemon's socket endpoint
    Sockname {
        /// Overall time budget in milliseconds; 0 disables the deadline
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn timeout_from_env() -> Option<Duration> {
    std::env::var("BUILDWATCH_TIMEOUT_MS")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// `--timeout-ms 0` disables the deadline entirely; an absent flag falls
/// back to the environment, then the built-in default.
fn resolve_timeout(flag: Option<u64>) -> Option<Duration> {
    match flag {
        Some(0) => None,
        Some(ms) => Some(Duration::from_millis(ms)),
        None => timeout_from_env().or(Some(DEFAULT_TIMEOUT)),
    }
}

fn resolve_daemon_exe(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os("WATCHMAN_EXE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("watchman"))
}

fn base_options(daemon_exe: PathBuf) -> SessionOptions {
    let mut options = SessionOptions::new(daemon_exe);
    options.env = std::env::vars().collect();
    options
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let daemon_exe = resolve_daemon_exe(cli.daemon_exe);

    match cli.command {
        Commands::Probe { roots, timeout_ms } => run_probe(daemon_exe, roots, timeout_ms).await,
        Commands::Sockname { timeout_ms } => run_sockname(daemon_exe, timeout_ms).await,
    }
}

async fn run_probe(daemon_exe: PathBuf, roots: Vec<PathBuf>, timeout_ms: Option<u64>) -> Result<()> {
    let mut options = base_options(daemon_exe);
    for root in roots {
        let root = root
            .canonicalize()
            .with_context(|| format!("invalid root {}", root.display()))?;
        options = options.watch_root(root);
    }
    if let Some(budget) = resolve_timeout(timeout_ms) {
        options = options.budget(budget);
    }

    let session = establish_default(&options).await;
    println!("{}", serde_json::to_string_pretty(&session)?);

    if !session.is_available() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_sockname(daemon_exe: PathBuf, timeout_ms: Option<u64>) -> Result<()> {
    let options = base_options(daemon_exe);
    let budget = TimeBudget::start(Arc::new(SystemClock), resolve_timeout(timeout_ms));

    let endpoint = discover_endpoint(&options, &SystemProcessRunner, &budget)
        .await
        .context("endpoint discovery failed")?;
    println!("{}", endpoint.sockname.display());
    Ok(())
}
