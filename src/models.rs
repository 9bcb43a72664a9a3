//! Data models for editions, scraped articles, and traversal bookkeeping.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Edition`]: The closed set of newspaper variants carried by the archive
//! - [`Article`]: One scraped piece of content, serialized into the JSON artifact
//! - [`TraversalState`]: Which editions and dates are still waiting to be visited
//!
//! Serialized field names follow the JSON the archive's save button has always
//! produced, so downstream consumers of older archive files keep working.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A newspaper edition ("media") carried by the archive, identified by its
/// short media code.
///
/// The set is closed and known at build time. [`Edition::ALL`] lists the
/// codes in canonical order, which is also the order traversal proceeds in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Edition {
    /// Nikkei morning edition (日本経済新聞 朝刊).
    Nkm,
    /// Nikkei evening edition (日本経済新聞 夕刊).
    Nke,
    /// Nikkei industrial daily (日経産業新聞).
    Nss,
    /// Saturday supplement (日経プラスワン).
    Nkp,
    /// Nikkei MJ retail paper (日経MJ).
    Nrs,
    /// Regional economy pages (日経地方経済面).
    Nkl,
}

impl Edition {
    /// All supported editions in canonical traversal order.
    pub const ALL: [Edition; 6] = [
        Edition::Nkm,
        Edition::Nke,
        Edition::Nss,
        Edition::Nkp,
        Edition::Nrs,
        Edition::Nkl,
    ];

    /// The edition every traversal falls back to when the current page's
    /// edition cannot be recognized.
    pub const DEFAULT: Edition = Edition::Nkm;

    /// The media code as it appears in the site's `mediaCode` query parameter.
    pub fn code(self) -> &'static str {
        match self {
            Edition::Nkm => "NKM",
            Edition::Nke => "NKE",
            Edition::Nss => "NSS",
            Edition::Nkp => "NKP",
            Edition::Nrs => "NRS",
            Edition::Nkl => "NKL",
        }
    }

    /// Parse a media code string into an [`Edition`].
    ///
    /// Returns `None` for codes outside the supported set, which callers
    /// treat as "unknown edition" rather than as an error.
    pub fn from_code(code: &str) -> Option<Edition> {
        match code {
            "NKM" => Some(Edition::Nkm),
            "NKE" => Some(Edition::Nke),
            "NSS" => Some(Edition::Nss),
            "NKP" => Some(Edition::Nkp),
            "NRS" => Some(Edition::Nrs),
            "NKL" => Some(Edition::Nkl),
            _ => None,
        }
    }

    /// Human-readable name of the edition, for logs.
    pub fn label(self) -> &'static str {
        match self {
            Edition::Nkm => "日経朝刊",
            Edition::Nke => "日経夕刊",
            Edition::Nss => "日経産業新聞",
            Edition::Nkp => "日経プラスワン",
            Edition::Nrs => "日経MJ",
            Edition::Nkl => "日経地方経済面",
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One scraped article, as written into the downloadable JSON artifact.
///
/// Built once per scraped body page and immutable afterwards; the normalizer
/// consumes and returns whole `Article` values rather than mutating in place.
///
/// # Serialized shape
///
/// `title`, `text`, `date`, `newspaper`, `page` and `chars` match the field
/// names of previously saved archives. `genre` is omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// The headline, after normalization.
    pub title: String,
    /// The body text. Carries the site's `<br>` line-break token until the
    /// normalizer rewrites it into paragraph breaks.
    pub text: String,
    /// Publication date, when the metadata line carried a parseable one.
    pub date: Option<NaiveDate>,
    /// Edition display name as printed on the page (e.g. "日本経済新聞 朝刊").
    pub newspaper: String,
    /// Page number within the printed edition.
    pub page: u32,
    /// Character count as declared by the metadata line.
    pub chars: u32,
    /// Category label, when the title carries a trailing （…） marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// Whether the metadata line advertises an attached image.
    #[serde(default)]
    pub has_image: bool,
    /// Whether the metadata line advertises an attached PDF.
    #[serde(default)]
    pub has_pdf: bool,
}

/// Persisted traversal bookkeeping for one autopilot session.
///
/// Created (or rebuilt, when stale) on the headline listing page, updated
/// after every planned visit, and cleared once every edition is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraversalState {
    /// Milliseconds since the Unix epoch at the moment the state was built.
    /// `0` means "never built" and always counts as stale.
    pub timestamp: i64,
    /// Supported editions present on the listing page, canonical order.
    pub available_editions: Vec<Edition>,
    /// Dates not yet visited, per edition. The front entry is consumed first;
    /// an empty or absent entry means the edition is exhausted.
    pub remaining_dates: BTreeMap<Edition, Vec<NaiveDate>>,
}
