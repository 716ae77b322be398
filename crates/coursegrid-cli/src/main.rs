//! coursegrid CLI - Training completion reports
//!
//! Generates the training report workbook, bundles certificate archives and
//! serves both over HTTP.

mod config;
mod server;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::Config;
use coursegrid_builder::ReportRequest;
use coursegrid_core::ColumnMode;
use coursegrid_render::{publish_report, ArchiveBundler, ArchiveRequest, PublishedArtifact};
use coursegrid_store::MemoryDocumentStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "coursegrid")]
#[command(author, version, about = "Training completion reports", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: ./coursegrid.toml if present)
    #[arg(long, global = true, env = "COURSEGRID_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of `<collection>.json` snapshots
    #[arg(long, global = true, env = "COURSEGRID_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Object store root
    #[arg(long, global = true, env = "COURSEGRID_OBJECTS_DIR")]
    objects_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and publish the training report
    Report {
        /// Restrict the report to one quarter
        #[arg(short, long)]
        quarter: Option<String>,

        /// Column mode (single, with-date)
        #[arg(short, long)]
        mode: Option<ColumnMode>,
    },

    /// Bundle a quarter's certificates into a zip archive
    Archive {
        /// Quarter to bundle
        #[arg(short, long)]
        quarter: String,

        /// Year (default: current year)
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Serve reports and archives over HTTP
    Serve {
        /// Address to bind (default from config)
        #[arg(short, long, env = "COURSEGRID_BIND")]
        bind: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over -v
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.objects_dir {
        config.objects_dir = dir;
    }

    match cli.command {
        Commands::Report { quarter, mode } => cmd_report(&config, quarter.as_deref(), mode),
        Commands::Archive { quarter, year } => cmd_archive(&config, &quarter, year),
        Commands::Serve { bind } => cmd_serve(&config, bind),
    }
}

fn load_documents(config: &Config) -> Result<MemoryDocumentStore> {
    MemoryDocumentStore::load_dir(&config.data_dir)
        .with_context(|| format!("Failed to load data: {}", config.data_dir.display()))
}

fn print_artifact(artifact: &PublishedArtifact) {
    println!("{}", artifact.remote_path);
    println!("{}", artifact.url);
    println!("expires: {}", artifact.expires_at.to_rfc3339());
}

fn cmd_report(config: &Config, quarter: Option<&str>, mode: Option<ColumnMode>) -> Result<()> {
    let request = match quarter {
        Some(q) => ReportRequest::for_quarter(Some(q))?,
        None => ReportRequest::full(),
    };
    let request = match mode {
        Some(mode) => request.with_mode(mode),
        None => request,
    };

    let documents = load_documents(config)?;
    let report = config
        .report_builder()
        .build(&documents, &request)
        .context("Failed to build report")?;
    let artifact = publish_report(
        &report,
        &config.renderer(),
        &config.object_store(),
        Utc::now(),
        config.url_ttl(),
    )
    .context("Failed to publish report")?;

    print_artifact(&artifact);
    Ok(())
}

fn cmd_archive(config: &Config, quarter: &str, year: Option<i32>) -> Result<()> {
    let now = Utc::now();
    let request = ArchiveRequest::new(Some(quarter), year, now)?;
    let objects = config.object_store();
    let artifact = ArchiveBundler::new(&objects)
        .ttl(config.url_ttl())
        .bundle(&request, now)
        .with_context(|| format!("Failed to archive {}", request.source_prefix()))?;

    print_artifact(&artifact);
    Ok(())
}

fn cmd_serve(config: &Config, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {bind}"))?;

    let documents = load_documents(config)?;
    let state = server::AppState::new(config, Arc::new(documents));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?
        .block_on(server::serve(addr, state))
}
