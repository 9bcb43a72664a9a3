//! Utility functions for date handling, URL construction, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Date parsing for the three formats the site serves (`YYYY-MM-DD`,
//!   `YYYY/MM/DD`, and the bare `M/d` used by the date menu)
//! - Listing-page URL construction in the site's query-parameter convention
//! - String truncation for logging
//! - File system validation for the output directory

use crate::models::Edition;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// Endpoint of the headline listing page; navigation targets are built on
/// top of it with `mediaCode` and `date` query parameters.
pub const LISTING_ENDPOINT: &str = "https://t21.nikkei.co.jp/g3/p03/LATCB012.do";

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})").unwrap());

/// Parse a date string in any of the formats the site serves.
///
/// Accepts ISO-8601 (`2024-01-05`), slash-separated (`2024/01/05`), and the
/// date menu's bare `M/d` form. `M/d` has no year of its own, so the year is
/// taken from `today` — the same convention the site's date menu uses.
///
/// # Returns
///
/// The parsed date, or `None` when the string fits none of the formats or
/// names an impossible date.
pub fn parse_date_string(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
        return Some(date);
    }
    if let Some(caps) = MONTH_DAY.captures(s) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(today.year(), month, day);
    }
    None
}

/// Format a date the way the site's `date` query parameter expects
/// (`YYYYMMDD`, zero-padded).
pub fn format_compact_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Build a headline listing URL for an edition, optionally filtered to a date.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     listing_url(Edition::Nkm, NaiveDate::from_ymd_opt(2024, 1, 5)),
///     "https://t21.nikkei.co.jp/g3/p03/LATCB012.do?mediaCode=NKM&date=20240105"
/// );
/// ```
pub fn listing_url(edition: Edition, date: Option<NaiveDate>) -> String {
    let mut url = Url::parse(LISTING_ENDPOINT).unwrap();
    url.query_pairs_mut().append_pair("mediaCode", edition.code());
    if let Some(date) = date {
        url.query_pairs_mut()
            .append_pair("date", &format_compact_date(date));
    }
    url.to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` bytes (backed off to a character boundary)
/// with an ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
