//! Command-line interface definitions for the archive crawler.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! The session cookie can also be provided via the `NIKKEI_COOKIE`
//! environment variable.

use clap::Parser;

/// Command-line arguments for the archive crawler.
///
/// # Examples
///
/// ```sh
/// # Crawl starting from the morning edition's listing page
/// nikkei_text_archive -o ./articles --cookie "JSESSIONID=..."
///
/// # Scrape whatever single page the start URL shows, without walking on
/// nikkei_text_archive -o ./articles --no-autopilot \
///     --start-url "https://t21.nikkei.co.jp/g3/p03/LATCB012.do?mediaCode=NSS"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for downloaded article JSON files
    #[arg(short, long, default_value = "./articles")]
    pub output_dir: String,

    /// Path of the JSON file holding traversal state between runs
    #[arg(short, long, default_value = "./nikkei_state.json")]
    pub state_file: String,

    /// URL to start crawling from (default: the morning edition's listing page)
    #[arg(long)]
    pub start_url: Option<String>,

    /// Session cookie copied from an authenticated browser session
    #[arg(long, env = "NIKKEI_COOKIE")]
    pub cookie: Option<String>,

    /// Minutes before stored traversal state counts as stale and is rebuilt
    #[arg(long, default_value_t = 1)]
    pub staleness_minutes: i64,

    /// Turn autopilot off: scrape the current page but do not walk onwards
    #[arg(long)]
    pub no_autopilot: bool,
}
