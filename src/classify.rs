//! Page classification from document URLs.
//!
//! The archive routes everything through a handful of `.do` endpoints, so the
//! URL alone is enough to tell which kind of page a response body holds. The
//! rest of the application consumes only the resulting [`PageKind`], never
//! raw URLs.

use crate::models::Edition;
use once_cell::sync::Lazy;
use regex::Regex;

/// The kinds of page the archive serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Terms-of-use interstitial that must be acknowledged before anything else.
    License,
    /// Headline listing for one edition and date.
    HeadlineList,
    /// Article body page showing the selected headlines' full text.
    ArticleBody,
    /// Breaking-news landing page, not part of the archive proper.
    BreakingNews,
    /// Anything else; no handler runs for these.
    Unrecognized,
}

/// Classify a document URL into a [`PageKind`].
pub fn classify(url: &str) -> PageKind {
    if url.contains("info_jp_nikkei_telecom.do") {
        PageKind::License
    } else if url.contains("LATCB012.do") {
        PageKind::HeadlineList
    } else if url.contains("LATCB014.do") {
        PageKind::ArticleBody
    } else if url.contains("LATCA011.do") {
        PageKind::BreakingNews
    } else {
        PageKind::Unrecognized
    }
}

static MEDIA_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"mediaCode=([A-Z]+)").unwrap());

/// Extract the edition from a URL's `mediaCode` query parameter.
///
/// Returns `None` when the parameter is absent or names an unsupported code.
pub fn edition_from_url(url: &str) -> Option<Edition> {
    MEDIA_CODE
        .captures(url)
        .and_then(|caps| Edition::from_code(&caps[1]))
}
