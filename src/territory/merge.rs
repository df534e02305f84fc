// src/territory/merge.rs - Left-join of resolved businesses onto territory rows
use std::collections::HashSet;

use super::TerritoryTable;
use crate::matching::MatchOutcome;
use crate::models::records::{GeoPoint, RawPermitRecord, ResolvedBusinessRecord, UnassignedReason};
use crate::models::stats_models::PipelineStats;
use crate::utils::constants::UNASSIGNED;

/// Builds one output row per business. Every input row yields exactly one
/// output row; unmatched rows carry the `미지정` sentinel instead of nulls.
pub fn merge_assignments(
    records: Vec<RawPermitRecord>,
    normalized: Vec<Option<String>>,
    coordinates: Vec<Option<GeoPoint>>,
    outcomes: Vec<MatchOutcome>,
    territory: &TerritoryTable,
    review_keys: &HashSet<String>,
    stats: &mut PipelineStats,
) -> Vec<ResolvedBusinessRecord> {
    records
        .into_iter()
        .zip(normalized)
        .zip(coordinates)
        .zip(outcomes)
        .map(|(((raw, normalized_address), point), outcome)| {
            let needs_review = review_keys.contains(&raw.identity_key);
            let mut resolved = base_record(raw, normalized_address, point, needs_review);
            apply_outcome(&mut resolved, outcome, territory, stats);
            resolved
        })
        .collect()
}

fn base_record(
    raw: RawPermitRecord,
    normalized_address: Option<String>,
    point: Option<GeoPoint>,
    needs_review: bool,
) -> ResolvedBusinessRecord {
    ResolvedBusinessRecord {
        identity_key: raw.identity_key,
        source: raw.source,
        business_name: raw.business_name,
        business_type: raw.business_type,
        phone: raw.phone,
        address: raw.address,
        road_address: raw.road_address,
        normalized_address,
        matched_address: None,
        match_score: None,
        match_method: None,
        unassigned_reason: None,
        branch: UNASSIGNED.to_string(),
        rep: UNASSIGNED.to_string(),
        zone_code: String::new(),
        activity_status: raw.status_label.clone().unwrap_or_default(),
        status_label: raw.status_label,
        notes: String::new(),
        status_changed_at: None,
        status_changed_by: None,
        latitude: point.map(|p| p.latitude),
        longitude: point.map(|p| p.longitude),
        site_area: raw.site_area,
        total_area: raw.total_area,
        area_pyeong: 0.0,
        permit_date: raw.permit_date,
        closure_date: raw.closure_date,
        reopen_date: raw.reopen_date,
        source_last_modified: raw.source_last_modified,
        last_modified: None,
        last_modified_is_ingestion_time: false,
        needs_review,
    }
}

fn apply_outcome(
    record: &mut ResolvedBusinessRecord,
    outcome: MatchOutcome,
    territory: &TerritoryTable,
    stats: &mut PipelineStats,
) {
    let (candidate, score, method) = match outcome {
        MatchOutcome::Matched { candidate, score, method } => (candidate, score, method),
        MatchOutcome::Unassigned(reason) => {
            record_unassigned(record, reason, stats);
            return;
        }
    };
    let Some(assignment) = territory.assignments.get(candidate) else {
        record_unassigned(record, UnassignedReason::BelowThreshold, stats);
        return;
    };

    stats.matched += 1;
    record.matched_address = Some(assignment.address.clone());
    record.match_score = Some(score);
    record.match_method = Some(method);
    record.branch = non_empty_or_sentinel(&assignment.branch);
    record.rep = non_empty_or_sentinel(&assignment.rep);
    record.zone_code = assignment.zone_code.clone().unwrap_or_default();
}

fn record_unassigned(record: &mut ResolvedBusinessRecord, reason: UnassignedReason, stats: &mut PipelineStats) {
    match reason {
        UnassignedReason::NoAddress => stats.unassigned_no_address += 1,
        UnassignedReason::BelowThreshold => stats.unassigned_below_threshold += 1,
        UnassignedReason::GeoGuardRejected => stats.unassigned_geo_guard += 1,
    }
    record.unassigned_reason = Some(reason);
}

fn non_empty_or_sentinel(value: &str) -> String {
    if value.trim().is_empty() {
        UNASSIGNED.to_string()
    } else {
        value.to_string()
    }
}
