//! CLI for pcaptrim
//!
//! `pcaptrim <INPUT_PCAP> <OUTPUT_PCAP> <FILTER_IMPLEMENTATION> <FILTER_FULL_NAME>`
//!
//! Resolves the filter unit, then copies the records of the input capture
//! that pass it into the output capture.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use pcaptrim::output::{write_report, TrimReport};
use pcaptrim::{trim, Error, TrimConfig};
use pcaptrim_wasm::{FilterUnit, ResolutionError};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pcaptrim")]
#[command(about = "Filter a pcap capture through a predicate loaded at runtime", long_about = None)]
#[command(version)]
struct Cli {
    /// Capture to read
    input_pcap: Option<PathBuf>,

    /// Capture to write (created or truncated)
    output_pcap: Option<PathBuf>,

    /// Filter source (.rs, .wat) or compiled module (.wasm)
    filter_implementation: Option<PathBuf>,

    /// Fully-qualified filter name, e.g. com.example.UdpOnly
    filter_full_name: Option<String>,

    /// TOML config file (link type, snaplen, toolchain, sandbox limits)
    #[arg(short, long, env = "PCAPTRIM_CONFIG")]
    config: Option<PathBuf>,

    /// Write run statistics as JSON to this path
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// The four positionals, once all are present
struct Invocation {
    input: PathBuf,
    output: PathBuf,
    implementation: PathBuf,
    full_name: String,
}

impl Cli {
    fn invocation(&self) -> Option<Invocation> {
        Some(Invocation {
            input: self.input_pcap.clone()?,
            output: self.output_pcap.clone()?,
            implementation: self.filter_implementation.clone()?,
            full_name: self.filter_full_name.clone()?,
        })
    }
}

/// How an unresolvable filter is reported. None of them fail the process.
#[derive(Debug, PartialEq, Eq)]
enum ResolutionReport {
    /// Message, then usage, on stdout
    Usage(String),
    /// Message on stdout
    Stdout(String),
    /// Full cause chain on stderr
    Stderr(String),
}

impl ResolutionReport {
    fn from_error(e: ResolutionError) -> Self {
        match e {
            e @ ResolutionError::UnsupportedArtifactKind { .. } => Self::Usage(e.to_string()),
            e @ (ResolutionError::CompilationFailed { .. } | ResolutionError::CompilerLaunch { .. }) => {
                Self::Stdout(e.to_string())
            }
            e @ ResolutionError::InstantiationFailed { .. } => {
                Self::Stderr(format!("{:?}", anyhow::Error::from(e)))
            }
        }
    }

    fn emit(&self) {
        match self {
            Self::Usage(msg) => {
                println!("{}", msg);
                print_usage();
            }
            Self::Stdout(msg) => println!("{}", msg),
            Self::Stderr(msg) => eprintln!("{}", msg),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(invocation) = cli.invocation() else {
        print_usage();
        return Ok(());
    };

    let config = match &cli.config {
        Some(path) => TrimConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TrimConfig::default(),
    };

    let unit = FilterUnit::new(&invocation.implementation, &invocation.full_name);
    let stats = match trim(&config, &invocation.input, &invocation.output, &unit) {
        Ok(stats) => stats,
        Err(Error::Resolution(e)) => {
            ResolutionReport::from_error(e).emit();
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!(
                    "Failed to trim {} into {}",
                    invocation.input.display(),
                    invocation.output.display()
                )
            })
        }
    };

    info!(
        "Kept {} of {} records ({} dropped)",
        stats.written,
        stats.read,
        stats.dropped()
    );

    if let Some(stats_path) = &cli.stats {
        let metadata = config.metadata().context("Invalid capture metadata")?;
        let report = TrimReport {
            input: invocation.input,
            output: invocation.output,
            filter: invocation.full_name,
            link_type: metadata.link_type.into(),
            snaplen: metadata.snaplen,
            stats,
        };
        write_report(&report, stats_path)?;
    }

    Ok(())
}

fn print_usage() {
    println!("{}", Cli::command().render_help());
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
