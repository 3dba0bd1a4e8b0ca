//! ndt-probe: a command-line driver for the NDT throughput-test protocol
//! runner, exercising the measurement engine end to end.
//!
//! Short-option surface: `-v` verbose, `-p port`, `-S` use SSL, `-A address`,
//! `-a` mlab-ns auto-selection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use measurement_engine::config::EngineOptions;
use measurement_engine::logger::Logger;
use measurement_engine::ndt;
use measurement_engine::report::{Entry, FileReporter};

/// `--version` output: crate version plus the build's git commit and date,
/// stamped in by `build.rs` via `cargo:rustc-env`.
const VERSION_INFO: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (git ",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "ndt-probe")]
#[command(version = VERSION_INFO)]
#[command(about = "Run an NDT v3.7.0 throughput test against a server", long_about = None)]
struct Cli {
    /// NDT server address; empty uses mlab-ns to pick one.
    #[arg(short = 'A', long)]
    address: Option<String>,

    /// NDT control-connection port.
    #[arg(short = 'p', long, default_value_t = 3001)]
    port: u16,

    /// Engine configuration file (TOML); CLI flags override its values.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory to write the `report-*.json` measurement record into.
    #[arg(short, long, default_value = ".")]
    report_dir: PathBuf,

    /// Verbosity: repeat for more (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use TLS for the control connection (not yet implemented for NDT; the
    /// flag is accepted for CLI-surface compatibility with the source).
    #[arg(short = 'S', long)]
    ssl: bool,

    /// Auto-select a server via mlab-ns instead of --address.
    #[arg(short = 'a', long)]
    auto: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let mut options = match &cli.config {
        Some(path) => EngineOptions::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineOptions::default(),
    };
    options.ndt.port = cli.port;
    if let Some(address) = &cli.address {
        options.ndt.address = Some(address.clone());
    }

    if options.ndt.address.is_none() && !cli.auto {
        anyhow::bail!("no NDT server address given; pass --address or -a for mlab-ns auto-selection");
    }

    let logger = Logger::for_component("ndt-probe");
    let start = std::time::Instant::now();

    let result = ndt::run(options.clone(), logger.clone()).await;
    let address = options.ndt.address.clone().unwrap_or_else(|| "mlab-ns".to_string());

    let mut reporter = FileReporter::new("ndt", &cli.report_dir);
    reporter.open().context("opening report file")?;
    let mut entry = Entry::new("ndt", "3.7.0", serde_json::json!({
        "server": address,
        "port": options.ndt.port,
        "succeeded": result.is_ok(),
        "error": result.as_ref().err().map(|e| e.to_string()),
    }));
    entry.test_runtime = start.elapsed().as_secs_f64();
    reporter.write_entry(&entry).context("writing report entry")?;
    reporter.close();

    result.map_err(|e| anyhow::anyhow!("ndt run failed: {e}"))
}
