/*!
# crystalball CLI

Command-line front end for crystalball.

- `peek` previews how many jobs of a given size the pool can run at once
  and, given a per-job duration, how long the batch would take on an idle
  pool
- `collect` saves a snapshot of the pool's slot catalog for later offline
  previews

Slots come from a live `condor_status` query, a saved `condor_status -long`
listing (`--dump`), or a snapshot written by `collect` (`--snapshot`).
*/

mod config;
mod render;
mod submit;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crystalball_core::source::{CondorStatusSource, SlotSource, StatusDumpSource};
use crystalball_core::units::storage_to_gib;
use crystalball_core::{preview, Catalog, JobRequest};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use crate::config::Settings;
use crate::submit::{read_submit, SubmitRequest};

/// crystalball - preview job capacity on an HTCondor pool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview how many jobs of a given size fit the pool
    Peek(PeekArgs),

    /// Save a snapshot of the pool's slot catalog
    Collect {
        /// Read a saved `condor_status -long` listing instead of querying the pool
        #[arg(long)]
        dump: Option<PathBuf>,

        /// Snapshot file to write (defaults to the configured snapshot path)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct PeekArgs {
    /// CPU cores per job
    #[arg(long, short, required_unless_present = "submit")]
    cpu: Option<u32>,

    /// Memory per job, e.g. 2GiB or 512MB (bare numbers are GiB)
    #[arg(long, short, required_unless_present = "submit")]
    ram: Option<String>,

    /// GPUs per job
    #[arg(long, short)]
    gpu: Option<u32>,

    /// Disk per job, e.g. 20GB (bare numbers are GiB)
    #[arg(long, short)]
    disk: Option<String>,

    /// Number of identical jobs [default: 1]
    #[arg(long, short)]
    jobs: Option<u32>,

    /// Duration of one job, e.g. 15m, 2h or 1d (bare numbers are minutes)
    #[arg(long, short)]
    time: Option<String>,

    /// Maximum number of node configurations to use, 0 for no limit
    #[arg(long, short, default_value_t = 0)]
    maxnodes: usize,

    /// Show the input, node and per-configuration tables
    #[arg(long, short)]
    verbose: bool,

    /// Print the preview as JSON
    #[arg(long)]
    json: bool,

    /// Take the job shape from an HTCondor submit file
    #[arg(long)]
    submit: Option<PathBuf>,

    /// Use the snapshot written by `collect` instead of querying the pool
    #[arg(long, conflicts_with = "dump")]
    snapshot: bool,

    /// Read a saved `condor_status -long` listing instead of querying the pool
    #[arg(long)]
    dump: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let verbose = matches!(&cli.command, Commands::Peek(args) if args.verbose);
    let level = if verbose { Level::DEBUG } else { settings.level()? };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Peek(args) => peek(&settings, args).await?,
        Commands::Collect { dump, output } => collect(&settings, dump, output).await?,
    }

    Ok(())
}

async fn peek(settings: &Settings, args: PeekArgs) -> Result<()> {
    let request = build_request(&args)?;
    let catalog = if args.snapshot {
        Catalog::load(&settings.snapshot_path).with_context(|| {
            format!(
                "failed to load slot snapshot {}; run `crystalball collect` first",
                settings.snapshot_path.display()
            )
        })?
    } else {
        fetch_catalog(settings, args.dump.as_deref()).await?
    };

    let result = preview(&catalog, &request)?;

    if args.json {
        return render::print_json(&result);
    }

    if args.verbose {
        render::print_inputs(&request);
        render::print_nodes(&catalog);
        render::print_preview(&result);
    }
    render::print_summary(&result, args.verbose);

    Ok(())
}

async fn collect(settings: &Settings, dump: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let catalog = fetch_catalog(settings, dump.as_deref()).await?;
    let path = output.unwrap_or_else(|| settings.snapshot_path.clone());
    catalog.save(&path)?;

    println!(
        "Saved {} slot configurations on {} nodes to {}",
        catalog.configuration_count(),
        catalog.nodes.len(),
        path.display()
    );
    Ok(())
}

async fn fetch_catalog(settings: &Settings, dump: Option<&Path>) -> Result<Catalog> {
    let source: Box<dyn SlotSource> = match dump {
        Some(path) => Box::new(StatusDumpSource::new(path)),
        None => Box::new(CondorStatusSource::new(&settings.condor_status)),
    };

    info!("Fetching slots from {}", source.describe());
    let records = source
        .fetch()
        .await
        .with_context(|| format!("failed to fetch slots from {}", source.describe()))?;
    Ok(Catalog::from_records(&records))
}

/// Combine command-line flags with an optional submit file; flags win
fn build_request(args: &PeekArgs) -> Result<JobRequest> {
    let submit = match &args.submit {
        Some(path) => read_submit(path)?,
        None => SubmitRequest::default(),
    };

    let cores = args
        .cpu
        .or(submit.cpus)
        .context("no number of CPU cores given (use --cpu or request_cpus)")?;
    let memory_gib = match &args.ram {
        Some(ram) => storage_to_gib(ram)?,
        None => submit.memory_gib.unwrap_or(0.0),
    };
    let disk_gib = match &args.disk {
        Some(disk) => storage_to_gib(disk)?,
        None => submit.disk_gib.unwrap_or(0.0),
    };

    let mut request = JobRequest::new(cores, memory_gib)
        .with_disk_gib(disk_gib)
        .with_gpus(args.gpu.or(submit.gpus).unwrap_or(0))
        .with_jobs(args.jobs.or(submit.jobs).unwrap_or(1))
        .with_max_nodes(args.maxnodes);
    if let Some(time) = &args.time {
        request = request.with_duration(time)?;
    }

    request.validate()?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peek_args(argv: &[&str]) -> PeekArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Peek(args) => args,
            Commands::Collect { .. } => panic!("expected peek"),
        }
    }

    #[test]
    fn flags_build_a_request() {
        let args = peek_args(&["crystalball", "peek", "-c", "2", "-r", "4GiB", "-j", "10", "-t", "2h"]);
        let request = build_request(&args).unwrap();
        assert_eq!(request.cores, 2);
        assert_eq!(request.memory_gib, 4.0);
        assert_eq!(request.jobs, 10);
        assert_eq!(request.duration_minutes, 120.0);
    }

    #[test]
    fn cores_and_memory_are_required_without_submit_file() {
        assert!(Cli::try_parse_from(["crystalball", "peek", "-r", "4"]).is_err());
        assert!(Cli::try_parse_from(["crystalball", "peek", "-c", "4"]).is_err());
    }

    #[test]
    fn snapshot_and_dump_conflict() {
        assert!(Cli::try_parse_from([
            "crystalball", "peek", "-c", "1", "-r", "1", "--snapshot", "--dump", "slots.txt",
        ])
        .is_err());
    }

    #[test]
    fn flags_override_submit_file() {
        let path = std::env::temp_dir().join(format!("crystalball-{}.sub", std::process::id()));
        std::fs::write(&path, "request_cpus = 4\nrequest_memory = 2048\nqueue 25\n").unwrap();

        let submit = path.to_string_lossy().to_string();
        let args = peek_args(&["crystalball", "peek", "--submit", &submit, "-c", "1"]);
        let request = build_request(&args).unwrap();
        assert_eq!(request.cores, 1);
        assert_eq!(request.memory_gib, 2.0);
        assert_eq!(request.jobs, 25);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn malformed_values_are_rejected() {
        let args = peek_args(&["crystalball", "peek", "-c", "1", "-r", "10XB"]);
        assert!(build_request(&args).is_err());

        let args = peek_args(&["crystalball", "peek", "-c", "1", "-r", "1", "-t", "10min"]);
        assert!(build_request(&args).is_err());
    }
}
