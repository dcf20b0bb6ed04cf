//! # dumpfs CLI - Incremental hardlink snapshots
//!
//! Command-line front end for the dumpfs library.
//!
//! ## Usage
//! ```bash
//! # Snapshot two directories into /backup
//! dumpfs backup /backup /home/me /etc
//!
//! # List snapshots, newest last
//! dumpfs list /backup
//!
//! # Print the most recent snapshot
//! dumpfs latest /backup
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use dumpfs::utils::format_bytes;
use dumpfs::{DumpfsBuilder, DumpfsConfig, DumpfsError, NamingScheme, TimestampPrecision};
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// dumpfs - daily snapshots that only store what changed
#[derive(Parser)]
#[command(name = "dumpfs")]
#[command(version)]
#[command(about = "Incremental hardlink snapshots of directory trees")]
#[command(long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot naming scheme
    #[arg(long, value_enum, global = true)]
    scheme: Option<Scheme>,

    /// Timestamp precision for copied and compared times
    #[arg(long, value_enum, global = true)]
    precision: Option<Precision>,

    /// Only hardlink files whose modification time is unchanged too
    #[arg(long, global = true)]
    compare_mtime: bool,

    /// Log every filesystem operation
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a new snapshot of one or more directories
    #[command(alias = "b")]
    Backup {
        /// Destination root holding the snapshots (must exist)
        dest: PathBuf,

        /// Directories to back up
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Show a spinner while the snapshot is taken
        #[arg(long)]
        progress: bool,
    },

    /// List snapshots, oldest first
    #[command(alias = "ls")]
    List {
        /// Destination root
        dest: PathBuf,

        /// Only show the most recent N snapshots
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print the most recent snapshot
    Latest {
        /// Destination root
        dest: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Scheme {
    /// YYYY-MM-DD_HH:MM:SS.mmm
    Flat,
    /// YYYY/MM/DD/HHMMSS.uuuuuu
    Hierarchical,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Precision {
    Seconds,
    Nanoseconds,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        // Context added on top of a library error takes precedence
        let message = match e.downcast_ref::<DumpfsError>() {
            Some(err) if err.to_string() == e.to_string() => err.user_message(),
            _ => format!("{:#}", e),
        };
        eprintln!("{}: {}", "Error".red().bold(), message);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Backup { dest, sources, progress } => cmd_backup(config, &dest, &sources, progress),
        Commands::List { dest, limit } => cmd_list(config, &dest, limit),
        Commands::Latest { dest } => cmd_latest(config, &dest),
    }
}

/// Configuration file first, then command-line overrides
fn load_config(cli: &Cli) -> anyhow::Result<DumpfsConfig> {
    let mut config = match &cli.config {
        Some(path) => DumpfsConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => DumpfsConfig::default(),
    };

    if let Some(scheme) = cli.scheme {
        config.naming = match scheme {
            Scheme::Flat => NamingScheme::Flat,
            Scheme::Hierarchical => NamingScheme::Hierarchical,
        };
    }
    if let Some(precision) = cli.precision {
        config.timestamp_precision = match precision {
            Precision::Seconds => TimestampPrecision::Seconds,
            Precision::Nanoseconds => TimestampPrecision::Nanoseconds,
        };
    }
    if cli.compare_mtime {
        config.compare_mtime = true;
    }
    if cli.verbose {
        config.verbose = true;
    }

    Ok(config)
}

/// Take a snapshot
///
/// Per-entry failures are logged as they happen and summarized at the end;
/// they do not change the exit status.
fn cmd_backup(config: DumpfsConfig, dest: &Path, sources: &[PathBuf], show_progress: bool) -> anyhow::Result<()> {
    let mut dumpfs = DumpfsBuilder::new().config(config).build();

    let start = Instant::now();
    let progress = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Backing up into {}", dest.display()));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let outcome = dumpfs.backup_with_outcome(dest, sources);

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let outcome = outcome?;
    let stats = &outcome.stats;

    println!("{} Snapshot {}", "✓".green().bold(), outcome.snapshot.display().to_string().cyan());
    match &outcome.previous {
        Some(previous) => println!("  Previous: {}", previous.display()),
        None => println!("  Previous: {}", "none (full copy)".yellow()),
    }
    println!(
        "  Files: {} copied ({}), {} linked ({})",
        stats.files_copied.to_string().cyan(),
        format_bytes(stats.bytes_copied),
        stats.files_linked.to_string().cyan(),
        format_bytes(stats.bytes_linked)
    );
    println!(
        "  Directories: {}, symlinks: {}",
        stats.directories_created.to_string().cyan(),
        stats.symlinks_created.to_string().cyan()
    );
    if stats.special_skipped > 0 {
        println!("  Skipped special files: {}", stats.special_skipped.to_string().yellow());
    }
    println!("  Time: {}", format_duration(round_to_millis(start.elapsed())).to_string().cyan());

    if !outcome.failures.is_empty() {
        println!(
            "{} {} entries could not be backed up (see log above)",
            "!".yellow().bold(),
            outcome.failures.len().to_string().yellow()
        );
    }

    Ok(())
}

fn cmd_list(config: DumpfsConfig, dest: &Path, limit: Option<usize>) -> anyhow::Result<()> {
    let dumpfs = DumpfsBuilder::new().config(config).build();
    let snapshots = dumpfs.list_snapshots(dest)?;

    if snapshots.is_empty() {
        println!("{}", "No snapshots found".yellow());
        return Ok(());
    }

    let skip = limit.map_or(0, |limit| snapshots.len().saturating_sub(limit));
    for snapshot in &snapshots[skip..] {
        println!("{}", snapshot.display());
    }

    Ok(())
}

fn cmd_latest(config: DumpfsConfig, dest: &Path) -> anyhow::Result<()> {
    let dumpfs = DumpfsBuilder::new().config(config).build();
    match dumpfs.previous_snapshot(dest)? {
        Some(snapshot) => {
            println!("{}", snapshot.display());
            Ok(())
        }
        None => anyhow::bail!("No snapshots found in {}", dest.display()),
    }
}

fn round_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}
