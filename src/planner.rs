//! The traversal planner: which archive page to visit next.
//!
//! Given the edition the current page belongs to and the persisted
//! [`TraversalState`], [`plan_next`] decides the next navigation target or
//! reports that the walk is over. The decision honors each edition's
//! publication schedule — the site takes editions offline during their
//! nightly refresh windows, and some editions only exist on certain days —
//! evaluated against the publishing house's *logical day*, which runs a few
//! hours past midnight.
//!
//! The planner is pure: it reads and mutates an in-memory state value and
//! never touches storage itself. The session driver persists the updated
//! state after a successful plan.

use crate::models::{Edition, TraversalState};
use crate::utils::listing_url;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Timelike, Weekday};
use tracing::debug;

/// Where the planner decided to go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavTarget {
    /// The edition the target page belongs to.
    pub edition: Edition,
    /// The date filter, when the target is a dated listing page. `None`
    /// targets the edition's landing page (its current issue).
    pub date: Option<NaiveDate>,
    /// Fully-qualified URL in the site's query-parameter convention.
    pub url: String,
}

/// Outcome of one planning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Navigate to this page next.
    Visit(NavTarget),
    /// Every edition is exhausted; the caller clears persisted state and stops.
    Done,
}

/// The calendar date the publishing house considers "today".
///
/// Issues uploaded in the small hours belong to the previous day's paper, so
/// clock hours 00–05 inclusive still count as the previous calendar date.
pub fn logical_date(now: DateTime<Local>) -> NaiveDate {
    let date = now.date_naive();
    if now.hour() <= 5 {
        date - Duration::days(1)
    } else {
        date
    }
}

/// Whether an edition's pages are reachable right now.
///
/// Refresh windows observed on the site (JST):
/// - morning edition: daily, around 05:20
/// - industrial daily: Mon–Fri, around 03:00
/// - Saturday supplement: Sat, around 05:20
///
/// The weekday gate uses the logical day; the refresh-hour gate uses the
/// literal clock hour.
pub fn is_edition_available(edition: Edition, now: DateTime<Local>) -> bool {
    let weekday = logical_date(now).weekday();
    let hour = now.hour();
    match edition {
        Edition::Nkm => hour != 5,
        Edition::Nke => hour != 5,
        Edition::Nss => {
            let is_weekday = !matches!(weekday, Weekday::Sat | Weekday::Sun);
            is_weekday && hour != 3
        }
        Edition::Nkp => weekday == Weekday::Sat && hour != 5,
        Edition::Nrs | Edition::Nkl => true,
    }
}

/// Whether persisted traversal state is too old to trust.
///
/// Stale state is rebuilt from the currently rendered listing page instead of
/// being reused. A zero timestamp (never built) is always stale.
pub fn is_state_stale(timestamp_ms: i64, now: DateTime<Local>, threshold_minutes: i64) -> bool {
    now.timestamp_millis() - timestamp_ms > threshold_minutes * 60_000
}

/// Decide the next page to visit.
///
/// - Unknown current edition: reset to the default edition's landing page
///   (no date filter).
/// - Current edition has remaining dates: pop the front date and target that
///   dated listing page. The caller persists the mutated `state`.
/// - Current edition exhausted: scan forward through `available_editions`
///   strictly after the current edition, skipping editions that are not
///   reachable right now or have no remaining dates; target the first hit's
///   landing page. The scan visits each edition at most once, so it
///   terminates even when nothing is reachable.
/// - Nothing left (or the current edition is not in the available list, or
///   the list is empty): [`Plan::Done`].
pub fn plan_next(
    current: Option<Edition>,
    state: &mut TraversalState,
    now: DateTime<Local>,
) -> Plan {
    let Some(current) = current else {
        debug!(fallback = %Edition::DEFAULT, "Current edition unknown; resetting to default landing page");
        return Plan::Visit(NavTarget {
            edition: Edition::DEFAULT,
            date: None,
            url: listing_url(Edition::DEFAULT, None),
        });
    };

    if let Some(dates) = state.remaining_dates.get_mut(&current) {
        if !dates.is_empty() {
            let date = dates.remove(0);
            debug!(edition = %current, %date, left = dates.len(), "Consuming next date for current edition");
            return Plan::Visit(NavTarget {
                edition: current,
                date: Some(date),
                url: listing_url(current, Some(date)),
            });
        }
    }

    // Current edition exhausted; bounded forward scan for a successor.
    let Some(position) = state.available_editions.iter().position(|&e| e == current) else {
        debug!(edition = %current, "Current edition not in the available list; traversal over");
        return Plan::Done;
    };
    for &edition in state.available_editions.iter().skip(position + 1) {
        if !is_edition_available(edition, now) {
            debug!(edition = %edition, "Skipping edition outside its publication window");
            continue;
        }
        let has_dates = state
            .remaining_dates
            .get(&edition)
            .is_some_and(|dates| !dates.is_empty());
        if !has_dates {
            debug!(edition = %edition, "Skipping exhausted edition");
            continue;
        }
        debug!(edition = %edition, "Advancing to next edition");
        return Plan::Visit(NavTarget {
            edition,
            date: None,
            url: listing_url(edition, None),
        });
    }

    Plan::Done
}
