// src/models/records.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// One normalized row from a permit/closure extract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPermitRecord {
    pub identity_key: String,
    /// `archive#member` the row came from.
    pub source: String,
    pub business_name: String,
    /// Address used for the key and for matching (site address preferred).
    pub address: String,
    pub road_address: Option<String>,
    pub phone: Option<String>,
    pub business_type: Option<String>,
    pub status_label: Option<String>,
    pub site_area: Option<f64>,
    pub total_area: Option<f64>,
    pub permit_date: Option<NaiveDate>,
    pub closure_date: Option<NaiveDate>,
    pub reopen_date: Option<NaiveDate>,
    pub source_last_modified: Option<NaiveDateTime>,
    pub raw_x: Option<f64>,
    pub raw_y: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// One row of the sales-territory table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerritoryAssignment {
    /// Address as written in the territory table (assembled if componentized).
    pub address: String,
    /// Matching form of `address`.
    pub normalized_address: String,
    pub branch: String,
    pub rep: String,
    pub zone_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RosterEntry {
    pub rep: String,
    pub zone_code: Option<String>,
    pub branch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Cosine,
    EditRatio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// Address missing, masked, or too short to match.
    NoAddress,
    BelowThreshold,
    GeoGuardRejected,
}

/// The single canonical output row per business.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedBusinessRecord {
    pub identity_key: String,
    pub source: String,
    pub business_name: String,
    pub business_type: Option<String>,
    pub phone: Option<String>,
    pub address: String,
    pub road_address: Option<String>,
    pub normalized_address: Option<String>,

    pub matched_address: Option<String>,
    pub match_score: Option<f64>,
    pub match_method: Option<MatchMethod>,
    pub unassigned_reason: Option<UnassignedReason>,
    pub branch: String,
    pub rep: String,
    pub zone_code: String,

    pub status_label: Option<String>,
    pub activity_status: String,
    pub notes: String,
    pub status_changed_at: Option<NaiveDateTime>,
    pub status_changed_by: Option<String>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub site_area: Option<f64>,
    pub total_area: Option<f64>,
    pub area_pyeong: f64,

    pub permit_date: Option<NaiveDate>,
    pub closure_date: Option<NaiveDate>,
    pub reopen_date: Option<NaiveDate>,
    pub source_last_modified: Option<NaiveDateTime>,
    pub last_modified: Option<NaiveDateTime>,
    /// True when `last_modified` is the load time, not a business event.
    pub last_modified_is_ingestion_time: bool,

    pub needs_review: bool,
}
