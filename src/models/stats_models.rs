// src/models/stats_models.rs
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Extract,
    Normalize,
    Dedup,
    Coordinates,
    Territory,
    Match,
    Merge,
    Overlay,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Extract => "EXTRACT",
            PipelineStage::Normalize => "NORMALIZE",
            PipelineStage::Dedup => "DEDUP",
            PipelineStage::Coordinates => "COORDS",
            PipelineStage::Territory => "TERRITORY",
            PipelineStage::Match => "MATCH",
            PipelineStage::Merge => "MERGE",
            PipelineStage::Overlay => "OVERLAY",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            PipelineStage::Extract => "📦",
            PipelineStage::Normalize => "🧾",
            PipelineStage::Dedup => "🧹",
            PipelineStage::Coordinates => "🌍",
            PipelineStage::Territory => "🗺️",
            PipelineStage::Match => "📍",
            PipelineStage::Merge => "🔗",
            PipelineStage::Overlay => "📝",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// Archive or archive member could not be read.
    Extraction,
    /// Table has no address-like column.
    Schema,
}

/// One isolated per-file failure, kept for manual triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub kind: SkipKind,
    pub source: String,
    pub detail: String,
}

/// Diagnostics for one load. Counters only ever describe isolated,
/// non-fatal conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub run_id: String,
    pub served_from_cache: bool,

    pub archives_opened: usize,
    pub members_skipped_extraction: usize,
    pub tables_loaded: usize,
    pub tables_skipped_schema: usize,
    pub malformed_rows_skipped: usize,

    pub rows_before_dedup: usize,
    pub rows_after_dedup: usize,
    pub duplicates_collapsed: usize,
    pub collision_groups: usize,
    pub degenerate_keys: usize,

    pub coordinates_passthrough: usize,
    pub coordinates_converted: usize,
    pub coordinates_nulled: usize,
    pub coordinates_missing: usize,

    pub territory_rows: usize,
    pub territory_unique_addresses: usize,

    pub matched: usize,
    pub unassigned_no_address: usize,
    pub unassigned_below_threshold: usize,
    pub unassigned_geo_guard: usize,

    pub overlay_entries: usize,
    pub overlay_applied: usize,
    pub last_modified_sentinel: usize,

    pub skipped: Vec<SkippedItem>,
}

impl PipelineStats {
    pub fn unassigned_total(&self) -> usize {
        self.unassigned_no_address + self.unassigned_below_threshold + self.unassigned_geo_guard
    }

    pub fn record_skip(&mut self, kind: SkipKind, source: impl Into<String>, detail: impl Into<String>) {
        match kind {
            SkipKind::Extraction => self.members_skipped_extraction += 1,
            SkipKind::Schema => self.tables_skipped_schema += 1,
        }
        self.skipped.push(SkippedItem {
            kind,
            source: source.into(),
            detail: detail.into(),
        });
    }
}
