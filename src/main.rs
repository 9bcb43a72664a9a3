//! # Nikkei Text Archive
//!
//! A crawler that walks the Nikkei Telecom newspaper archive edition by
//! edition and date by date, scrapes article text from the rendered pages,
//! cleans it up, and saves each scraped batch as a JSON archive file.
//!
//! ## Features
//!
//! - Classifies each fetched page (license, breaking news, headline listing,
//!   article body) and runs the matching handler
//! - Tracks which editions and dates have already been visited in a small
//!   JSON state file, so an interrupted walk resumes where it left off
//! - Normalizes the site's typesetting (full-width Latin, ideographic
//!   padding, `<br>` tokens) into portable, markdown-flavoured text
//! - Honors each edition's publication schedule, skipping editions that are
//!   inside their nightly refresh window or not published on the current
//!   (logical) day
//!
//! ## Usage
//!
//! ```sh
//! nikkei_text_archive -o ./articles --cookie "JSESSIONID=..."
//! ```
//!
//! ## Architecture
//!
//! One page is processed at a time:
//! 1. **Fetch**: GET or POST the pending request
//! 2. **Classify**: decide the page kind from its URL
//! 3. **Handle**: scrape, normalize, write the artifact, update state
//! 4. **Plan**: ask the traversal planner for the next page, or stop

use clap::Parser;
use std::error::Error;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod classify;
mod cli;
mod models;
mod normalize;
mod outputs;
mod planner;
mod scrape;
mod session;
mod store;
mod utils;

use cli::Cli;
use models::Edition;
use session::Session;
use store::StateStore;
use utils::{ensure_writable_dir, listing_url};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("archive crawler starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.output_dir, ?args.state_file, "Parsed CLI arguments");

    // Early check: ensure the output dir is writable
    ensure_writable_dir(&args.output_dir).await?;

    // --- HTTP client ---
    let mut headers = reqwest::header::HeaderMap::new();
    if let Some(cookie) = &args.cookie {
        headers.insert(
            reqwest::header::COOKIE,
            reqwest::header::HeaderValue::from_str(cookie)?,
        );
        info!("Using the provided session cookie");
    } else {
        info!("No session cookie provided; expect the license page or a login wall");
    }
    let client = reqwest::Client::builder()
        .user_agent(concat!("nikkei_text_archive/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .build()?;

    // --- State store ---
    let store = StateStore::new(&args.state_file);
    if args.no_autopilot {
        store.set_autopilot(false).await?;
        info!("Autopilot disabled for this and subsequent runs");
    }

    // --- Crawl ---
    let start_url = args
        .start_url
        .clone()
        .unwrap_or_else(|| listing_url(Edition::DEFAULT, None));
    info!(%start_url, "Starting traversal");

    let session = Session::new(client, store, args.output_dir.clone(), args.staleness_minutes);
    session.run(&start_url).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
