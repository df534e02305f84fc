// src/derive.rs - Area and last-modified derivation
use chrono::NaiveDateTime;

use crate::models::records::ResolvedBusinessRecord;
use crate::models::stats_models::PipelineStats;
use crate::utils::constants::SQUARE_METERS_PER_PYEONG;

/// Site area when positive, otherwise total area, converted to pyeong and
/// rounded to one decimal. Missing areas count as zero.
pub fn area_pyeong(site_area: Option<f64>, total_area: Option<f64>) -> f64 {
    let site = site_area.unwrap_or(0.0);
    let area = if site > 0.0 { site } else { total_area.unwrap_or(0.0) };
    ((area / SQUARE_METERS_PER_PYEONG) * 10.0).round() / 10.0
}

pub fn derive_areas(records: &mut [ResolvedBusinessRecord]) {
    for record in records.iter_mut() {
        record.area_pyeong = area_pyeong(record.site_area, record.total_area);
    }
}

/// Latest business event for a record: overlay change, closure, permit, or
/// source modification.
pub fn latest_event(record: &ResolvedBusinessRecord) -> Option<NaiveDateTime> {
    let closure = record.closure_date.and_then(|d| d.and_hms_opt(0, 0, 0));
    let permit = record.permit_date.and_then(|d| d.and_hms_opt(0, 0, 0));
    [record.status_changed_at, closure, permit, record.source_last_modified]
        .into_iter()
        .flatten()
        .max()
}

/// Sets `last_modified` on every record. Records with no event at all get
/// `ingestion_time` and are flagged.
pub fn derive_last_modified(
    records: &mut [ResolvedBusinessRecord],
    ingestion_time: NaiveDateTime,
    stats: &mut PipelineStats,
) {
    stats.last_modified_sentinel = 0;
    for record in records.iter_mut() {
        match latest_event(record) {
            Some(ts) => {
                record.last_modified = Some(ts);
                record.last_modified_is_ingestion_time = false;
            }
            None => {
                record.last_modified = Some(ingestion_time);
                record.last_modified_is_ingestion_time = true;
                stats.last_modified_sentinel += 1;
            }
        }
    }
}
