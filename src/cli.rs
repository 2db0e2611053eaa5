//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use wayback_core::{
    ArchiveEndpoints, DEFAULT_CONCURRENCY, DEFAULT_MAX_PAGES, DEFAULT_MAX_RETRIES, DownloadOptions,
};

use crate::config::FileConfig;

/// Download archived websites from the Internet Archive Wayback Machine.
///
/// Finds every capture of a site in the snapshot index, keeps the most
/// recent copy of each file, and rebuilds the site's directory tree locally.
#[derive(Parser, Debug)]
#[command(name = "wayback-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Website URL to download (e.g. https://example.com)
    pub url: String,

    /// Output directory (default: ./websites/{domain}/)
    #[arg(short, long, value_name = "PATH")]
    pub directory: Option<PathBuf>,

    /// Number of parallel downloads (1-100, default 5)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Only snapshots from this timestamp (e.g. 20060716231334)
    #[arg(short, long, value_name = "TIMESTAMP")]
    pub from: Option<u64>,

    /// Only snapshots up to this timestamp
    #[arg(short, long, value_name = "TIMESTAMP")]
    pub to: Option<u64>,

    /// Only download URLs matching filter (use /pattern/ for regex)
    #[arg(short, long, value_name = "FILTER")]
    pub only: Option<String>,

    /// Exclude URLs matching filter
    #[arg(short = 'x', long, value_name = "FILTER")]
    pub exclude: Option<String>,

    /// Include non-200 responses (errors, redirects)
    #[arg(short, long)]
    pub all: bool,

    /// Download all snapshot versions
    #[arg(short = 's', long)]
    pub all_timestamps: bool,

    /// Download only the exact URL, not the full site
    #[arg(short, long)]
    pub exact_url: bool,

    /// List files as JSON without downloading
    #[arg(short, long)]
    pub list: bool,

    /// Max snapshot index pages to fetch (default 100)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub max_pages: Option<u32>,

    /// Re-download existing files
    #[arg(long)]
    pub overwrite: bool,

    /// Max retries per file (0-20, default 5)
    #[arg(long = "retry", value_name = "N", value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: Option<u32>,

    /// Rewrite absolute URLs to relative paths in downloaded HTML/CSS
    #[arg(long)]
    pub rewrite_links: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Snapshot index endpoint
    #[arg(long, hide = true, value_name = "URL")]
    pub cdx_endpoint: Option<String>,

    /// Raw capture endpoint
    #[arg(long, hide = true, value_name = "URL")]
    pub archive_endpoint: Option<String>,
}

impl Args {
    /// Builds run options; flags win over the config file, which wins over
    /// built-in defaults.
    pub fn to_options(&self, file: Option<&FileConfig>) -> DownloadOptions {
        let file = file.cloned().unwrap_or_default();
        let defaults = DownloadOptions::new(self.url.clone());
        let endpoints = ArchiveEndpoints::default();

        DownloadOptions {
            directory: self.directory.clone().or(file.directory),
            exact_url: self.exact_url,
            all_timestamps: self.all_timestamps,
            from_timestamp: self.from,
            to_timestamp: self.to,
            only_filter: self.only.clone(),
            exclude_filter: self.exclude.clone(),
            all: self.all,
            max_pages: self.max_pages.or(file.max_pages).unwrap_or(DEFAULT_MAX_PAGES),
            concurrency: self
                .concurrency
                .or(file.concurrency)
                .map_or(DEFAULT_CONCURRENCY, usize::from),
            overwrite: self.overwrite,
            max_retries: self
                .max_retries
                .or(file.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            rewrite_links: self.rewrite_links || file.rewrite_links.unwrap_or(false),
            connect_timeout: file
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            read_timeout: file
                .read_timeout_secs
                .map_or(defaults.read_timeout, Duration::from_secs),
            endpoints: ArchiveEndpoints {
                cdx: self.cdx_endpoint.clone().unwrap_or(endpoints.cdx),
                archive: self.archive_endpoint.clone().unwrap_or(endpoints.archive),
            },
            ..defaults
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}
