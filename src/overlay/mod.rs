// src/overlay/mod.rs - Activity status overlay
pub mod store;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::models::records::ResolvedBusinessRecord;
use crate::models::stats_models::PipelineStats;
use crate::normalize::record::parse_datetime_lenient;

pub use store::{JsonFileStatusStore, StatusOverlayStore};

/// Timestamp format of `changed_at` in the overlay file (KST wall clock).
pub const OVERLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One persisted overlay entry. Field names on disk are the storage keys the
/// existing overlay files already use. Older writers store `null` for an
/// unknown author or empty notes; those read as "".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStatusEntry {
    #[serde(rename = "활동진행상태", default, deserialize_with = "lenient_text")]
    pub status: String,
    #[serde(rename = "특이사항", default, deserialize_with = "lenient_text")]
    pub notes: String,
    #[serde(rename = "변경일시", default, deserialize_with = "lenient_text")]
    pub changed_at: String,
    #[serde(rename = "변경자", default, deserialize_with = "lenient_text")]
    pub changed_by: String,
}

/// Strings pass through, `null` becomes "", and other scalars keep their
/// JSON text.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

pub type StatusOverlay = HashMap<String, ActivityStatusEntry>;

/// Canonical display labels, keyed by bare label.
pub const ACTIVITY_STATUSES: [(&str, &str); 5] = [
    ("방문", "✅ 방문"),
    ("상담중", "🟡 상담중"),
    ("상담완료", "🔵 상담완료"),
    ("상담불가", "🔴 상담불가"),
    ("계약완료", "🟢 계약완료"),
];

const STATUS_MARKERS: [&str; 5] = ["✅", "🟡", "🔵", "🔴", "🟢"];

/// Maps a stored status to its canonical display label. Unknown labels pass
/// through; empty-ish values become "".
pub fn normalize_status(status: &str) -> String {
    let trimmed = status.trim();
    if trimmed.is_empty() || trimmed == "None" || trimmed.eq_ignore_ascii_case("nan") {
        return String::new();
    }
    if ACTIVITY_STATUSES.iter().any(|(_, label)| *label == trimmed) {
        return trimmed.to_string();
    }
    let mut bare = trimmed;
    for marker in STATUS_MARKERS {
        bare = bare.trim_start_matches(marker).trim_start();
    }
    ACTIVITY_STATUSES
        .iter()
        .find(|(key, _)| *key == bare)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Applies `overlay` to every record by identity key. Records without an
/// entry, or whose entry has no status, keep their raw status label.
pub fn merge_overlay(records: &mut [ResolvedBusinessRecord], overlay: &StatusOverlay, stats: &mut PipelineStats) {
    stats.overlay_entries = overlay.len();
    stats.overlay_applied = 0;

    for record in records.iter_mut() {
        let Some(entry) = overlay.get(&record.identity_key) else {
            continue;
        };
        stats.overlay_applied += 1;

        let status = normalize_status(&entry.status);
        if !status.is_empty() {
            record.activity_status = status;
        }
        record.notes = entry.notes.clone();
        record.status_changed_at = parse_datetime_lenient(&entry.changed_at);
        record.status_changed_by = Some(entry.changed_by.clone()).filter(|s| !s.is_empty());
    }
}
