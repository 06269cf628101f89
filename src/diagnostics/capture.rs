//! Debounced incident bundle capture.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classify::{BackendSessionSnapshot, IncidentClass, classify};
use super::IncidentEvent;

/// Everything known about one incident, ready to be written as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentBundle {
    pub pane_key: String,
    pub class: IncidentClass,
    pub label: String,
    pub reason: String,
    /// RFC 3339 capture time
    pub captured_at: String,
    pub events: Vec<IncidentEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<BackendSessionSnapshot>,
}

impl IncidentBundle {
    /// File name used when writing the bundle to the incident directory
    pub fn file_name(&self) -> String {
        let stamp: String = self
            .captured_at
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("incident-{}-{}.json", self.pane_key, stamp)
    }
}

/// Per pane debounce of bundle captures
#[derive(Debug)]
pub struct IncidentCapture {
    debounce_ms: u64,
    incident_dir: Option<PathBuf>,
    last_capture: HashMap<String, u64>,
}

impl IncidentCapture {
    pub fn new(debounce_ms: u64, incident_dir: Option<PathBuf>) -> Self {
        Self {
            debounce_ms,
            incident_dir,
            last_capture: HashMap::new(),
        }
    }

    pub fn incident_dir(&self) -> Option<&Path> {
        self.incident_dir.as_deref()
    }

    /// Whether a capture for `pane_key` at `now_ms` would be suppressed
    pub fn is_debounced(&self, pane_key: &str, now_ms: u64) -> bool {
        self.last_capture
            .get(pane_key)
            .is_some_and(|&last| now_ms.saturating_sub(last) < self.debounce_ms)
    }

    /// Build a bundle unless one was captured for this pane recently
    pub fn capture(
        &mut self,
        pane_key: &str,
        reason: &str,
        events: Vec<IncidentEvent>,
        snapshot: Option<BackendSessionSnapshot>,
        now_ms: u64,
    ) -> Option<IncidentBundle> {
        if self.is_debounced(pane_key, now_ms) {
            log::debug!("Incident capture for {} debounced", pane_key);
            return None;
        }
        self.last_capture.insert(pane_key.to_string(), now_ms);

        let class = classify(&events, snapshot.as_ref());
        log::info!("Captured incident for {}: {} ({})", pane_key, class, reason);
        Some(IncidentBundle {
            pane_key: pane_key.to_string(),
            class,
            label: class.label().to_string(),
            reason: reason.to_string(),
            captured_at: Utc::now().to_rfc3339(),
            events,
            snapshot,
        })
    }

    /// Write `bundle` to the incident directory; `Ok(None)` when none is configured
    pub fn write_bundle(&self, bundle: &IncidentBundle) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.incident_dir else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create incident directory {:?}", dir))?;
        let path = dir.join(bundle.file_name());
        let json = serde_json::to_string_pretty(bundle).context("Failed to serialize incident bundle")?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write incident bundle {:?}", path))?;
        Ok(Some(path))
    }
}

/// Parse the capture time of a bundle
pub fn captured_at(bundle: &IncidentBundle) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&bundle.captured_at)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
