//! JSON artifact writing.
//!
//! The artifact mirrors what the archive's save button has always produced:
//! a pretty-printed UTF-8 JSON array of articles, one file per scraped body
//! page, named `Nikkei_<YYYY-MM-DD>_<edition-name>.json` after the first
//! article's date and edition.

use crate::models::Article;
use chrono::NaiveDate;
use std::error::Error;
use tokio::fs;
use tracing::{info, instrument};

/// Artifact filename for a batch: `Nikkei_<YYYY-MM-DD>_<edition-name>.json`.
///
/// Date and edition come from the first article; `fallback_date` covers a
/// first article whose metadata line carried no parseable date.
pub fn artifact_filename(articles: &[Article], fallback_date: NaiveDate) -> String {
    let first = articles.first();
    let date = first
        .and_then(|article| article.date)
        .unwrap_or(fallback_date);
    let edition = first.map(|article| article.newspaper.as_str()).unwrap_or("");
    format!("Nikkei_{}_{}.json", date.format("%Y-%m-%d"), edition)
}

/// Write a batch of articles to the output directory.
///
/// # Returns
///
/// The path of the written file.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_articles(
    articles: &[Article],
    output_dir: &str,
    fallback_date: NaiveDate,
) -> Result<String, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(articles)?;
    let filename = artifact_filename(articles, fallback_date);
    let path = format!("{}/{}", output_dir.trim_end_matches('/'), filename);

    fs::write(&path, json).await?;
    info!(path = %path, count = articles.len(), "Wrote article archive");

    Ok(path)
}
