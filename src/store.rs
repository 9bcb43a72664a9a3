//! Persisted session state, typed at the boundary.
//!
//! Traversal survives page-to-page navigation only because it is written to
//! disk before each jump. The store keeps a single JSON file holding exactly
//! four entries — the autopilot flag, the freshness timestamp, the available
//! editions, and the remaining dates — and exposes them through named,
//! typed accessors instead of ad-hoc string keys.
//!
//! Absent or malformed data never propagates: an unreadable file, an
//! unparseable document, or a single bad field each degrade to that value's
//! default (empty collections, timestamp zero, autopilot on) with a logged
//! warning.

use crate::models::{Edition, TraversalState};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

const AUTOPILOT: &str = "autopilot";
const TIMESTAMP: &str = "timestamp";
const AVAILABLE_EDITIONS: &str = "available_editions";
const REMAINING_DATES: &str = "remaining_dates";

/// Key-value store over one JSON file.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw document, tolerating a missing or unreadable file.
    async fn load(&self) -> serde_json::Map<String, Value> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "State file not readable; starting empty");
                return serde_json::Map::new();
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(path = %self.path.display(), "State file is not a JSON object; ignoring it");
                serde_json::Map::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "State file is corrupt; ignoring it");
                serde_json::Map::new()
            }
        }
    }

    async fn save(&self, map: serde_json::Map<String, Value>) -> Result<(), Box<dyn Error>> {
        let json = serde_json::to_string_pretty(&Value::Object(map))?;
        fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Extract one field, falling back to its default when the stored shape
    /// does not match the expected type.
    fn field<T: DeserializeOwned + Default>(
        &self,
        map: &serde_json::Map<String, Value>,
        key: &str,
    ) -> T {
        let Some(value) = map.get(key) else {
            return T::default();
        };
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(path = %self.path.display(), key, error = %e, "Stored entry has an unexpected shape; using default");
                T::default()
            }
        }
    }

    /// The persisted traversal bookkeeping; absent entries come back empty.
    pub async fn traversal_state(&self) -> TraversalState {
        let map = self.load().await;
        TraversalState {
            timestamp: self.field::<i64>(&map, TIMESTAMP),
            available_editions: self.field::<Vec<Edition>>(&map, AVAILABLE_EDITIONS),
            remaining_dates: self
                .field::<BTreeMap<Edition, Vec<NaiveDate>>>(&map, REMAINING_DATES),
        }
    }

    /// Persist the traversal bookkeeping, leaving unrelated entries alone.
    #[instrument(level = "debug", skip_all)]
    pub async fn set_traversal_state(&self, state: &TraversalState) -> Result<(), Box<dyn Error>> {
        let mut map = self.load().await;
        map.insert(TIMESTAMP.into(), serde_json::to_value(state.timestamp)?);
        map.insert(
            AVAILABLE_EDITIONS.into(),
            serde_json::to_value(&state.available_editions)?,
        );
        map.insert(
            REMAINING_DATES.into(),
            serde_json::to_value(&state.remaining_dates)?,
        );
        self.save(map).await
    }

    /// Drop the edition and date tables once traversal completes.
    ///
    /// The timestamp and autopilot flag survive, matching what the next
    /// session expects to find.
    pub async fn clear_traversal_state(&self) -> Result<(), Box<dyn Error>> {
        let mut map = self.load().await;
        map.remove(AVAILABLE_EDITIONS);
        map.remove(REMAINING_DATES);
        self.save(map).await
    }

    /// The autopilot flag; defaults to on when never set.
    pub async fn autopilot(&self) -> bool {
        let map = self.load().await;
        let Some(value) = map.get(AUTOPILOT) else {
            return true;
        };
        match serde_json::from_value(value.clone()) {
            Ok(flag) => flag,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Autopilot entry has an unexpected shape; defaulting to on");
                true
            }
        }
    }

    pub async fn set_autopilot(&self, enabled: bool) -> Result<(), Box<dyn Error>> {
        let mut map = self.load().await;
        map.insert(AUTOPILOT.into(), Value::Bool(enabled));
        self.save(map).await
    }
}
