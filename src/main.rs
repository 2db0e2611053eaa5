//! CLI entry point for wayback-dl.

use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::Parser;
use tracing::{debug, warn};
use wayback_core::{download_interruptible, list_files};

mod cli;
mod config;
mod progress;

use cli::Args;
use progress::{CliObserver, empty_result_reasons, format_empty_result, format_summary};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let colors = !args.no_color && std::env::var_os("NO_COLOR").is_none();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(colors)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = config::load_default_file_config()?;
    let options = args.to_options(file_config.as_ref());

    if args.list {
        let files = list_files(&options).await?;
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    let show_progress = !args.quiet && std::io::stderr().is_terminal();
    if !args.quiet {
        println!(
            "Downloading {} to {} from Wayback Machine.",
            options.base_url,
            options.backup_path().display()
        );
        println!();
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight downloads");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let observer = Arc::new(CliObserver::new(show_progress, colors));
    let report = download_interruptible(&options, observer.clone(), interrupt).await?;
    observer.finish();

    if report.index_truncated {
        warn!("snapshot listing was incomplete; some files may be missing");
    }
    if report.files.is_empty() {
        let reasons = empty_result_reasons(&options, report.index_truncated);
        print!("{}", format_empty_result(&reasons));
        return Ok(());
    }
    if !args.quiet {
        print!("{}", format_summary(&report.stats, report.rewrite));
    }
    Ok(())
}
