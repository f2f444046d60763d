mod config;
mod models;
mod parser;
mod upload;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{Overrides, Settings};
use crate::models::Clipping;
use crate::upload::{GraphQlClient, UploadOutcome};

#[derive(Parser)]
#[command(name = "ck_cli", about = "Kindle clippings parser and ClippingKK uploader")]
struct Cli {
    /// Config file (default: ~/.ck-cli.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API token, sent as `Authorization: X-CLI <token>`
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse "My Clippings.txt" into JSON, or upload it
    Parse {
        /// Clippings file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// stdout if omitted, `http` for the configured endpoint, an http(s) URL, or a file path
        #[arg(short, long)]
        output: Option<String>,
        /// Clippings per request
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Max requests in flight
        #[arg(long)]
        concurrency: Option<usize>,
        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

enum Target {
    Stdout,
    File(PathBuf),
    Remote(Option<String>),
}

impl Target {
    fn from_arg(output: Option<String>) -> Self {
        match output {
            None => Target::Stdout,
            Some(o) if o.is_empty() => Target::Stdout,
            Some(o) if o == "http" => Target::Remote(None),
            Some(o) if o.starts_with("http") => Target::Remote(Some(o)),
            Some(o) => Target::File(PathBuf::from(o)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse {
            input,
            output,
            chunk_size,
            concurrency,
            timeout,
        } => {
            let raw = read_input(input.as_deref())?;
            let report = parser::parse_report(&raw);
            if !report.skipped.is_empty() {
                info!("Skipped {} malformed blocks", report.skipped.len());
            }
            if report.epoch_dated() > 0 {
                warn!(
                    "{} clippings have unreadable dates and were stamped 1970-01-01",
                    report.epoch_dated()
                );
            }
            let clippings = report.clippings;
            if clippings.is_empty() {
                warn!("No clippings found in input; is this a Kindle \"My Clippings.txt\"?");
                return Ok(());
            }
            info!(
                "Parsed {} clippings from {} blocks ({:?})",
                clippings.len(),
                report.blocks,
                report.locale
            );

            match Target::from_arg(output) {
                Target::Stdout => write_json(std::io::stdout().lock(), &clippings),
                Target::File(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    write_json(file, &clippings)?;
                    info!("Saved {} clippings to {}", clippings.len(), path.display());
                    Ok(())
                }
                Target::Remote(endpoint) => {
                    let overrides = Overrides {
                        endpoint,
                        token: cli.token,
                        chunk_size,
                        concurrency,
                        timeout_secs: timeout,
                    };
                    sync(cli.config.as_deref(), overrides, &clippings).await
                }
            }
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {}", format_duration(elapsed));
    }

    result
}

fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read input file {}", p.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn write_json<W: Write>(mut out: W, clippings: &[Clipping]) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut out, clippings).context("failed to encode JSON")?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Validate settings, plan batches, upload, and turn the report into an exit status.
async fn sync(
    config_path: Option<&Path>,
    overrides: Overrides,
    clippings: &[Clipping],
) -> anyhow::Result<()> {
    let mut settings = Settings::load(config_path)?;
    settings.apply(overrides);
    settings.validate()?;

    let batches = upload::plan(clippings, settings.upload.chunk_size)?;
    let options = settings.upload_options();
    let client = GraphQlClient::new(&settings.http.endpoint, &settings.http.headers, options.timeout)?;
    info!("Syncing to {}", client.endpoint());

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding uploads");
            let _ = cancel_tx.send(true);
        }
    });

    let report = upload::upload(&batches, Arc::new(client), options, cancel_rx).await;

    match report.outcome() {
        UploadOutcome::Empty => {
            warn!("Nothing to upload");
            Ok(())
        }
        UploadOutcome::Success => {
            info!(
                "Uploaded {} clippings in {} batches ({} acknowledged)",
                report.attempted, report.batches, report.acknowledged
            );
            Ok(())
        }
        UploadOutcome::Partial => bail!(
            "partial upload: batches {:?} of {} failed, {:?} succeeded; {}",
            report.failed,
            report.batches,
            report.succeeded(),
            report.first_error.as_deref().unwrap_or("unknown error")
        ),
        UploadOutcome::Failed => bail!(
            "parsed {} clippings but none were uploaded: {}",
            report.attempted,
            report.first_error.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
