// src/geo/mod.rs - Batch coordinate resolution
pub mod projection;

use crate::models::records::{GeoPoint, RawPermitRecord};
use crate::models::stats_models::PipelineStats;
use crate::utils::constants::{MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE, MIN_LONGITUDE};
use crate::utils::logging::StageLogger;

pub use projection::epsg5174_to_wgs84;

/// Where a coordinate pair came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSource {
    /// Raw X was already a longitude.
    Passthrough,
    Converted,
}

pub fn in_korea(point: &GeoPoint) -> bool {
    (MIN_LATITUDE..=MAX_LATITUDE).contains(&point.latitude)
        && (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&point.longitude)
}

/// Raw (x, y) to a geographic point, before bounds enforcement.
pub fn resolve_pair(x: f64, y: f64) -> (GeoPoint, CoordinateSource) {
    if (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&x) {
        (GeoPoint { latitude: y, longitude: x }, CoordinateSource::Passthrough)
    } else {
        (epsg5174_to_wgs84(x, y), CoordinateSource::Converted)
    }
}

/// Resolves coordinates for every record, in order. Pairs outside Korea's
/// bounding box come back as `None`.
pub fn resolve_coordinates(
    records: &[RawPermitRecord],
    stats: &mut PipelineStats,
    logger: &StageLogger,
) -> Vec<Option<GeoPoint>> {
    let resolved: Vec<Option<GeoPoint>> = records
        .iter()
        .map(|record| {
            let (Some(x), Some(y)) = (record.raw_x, record.raw_y) else {
                stats.coordinates_missing += 1;
                return None;
            };
            let (point, source) = resolve_pair(x, y);
            match source {
                CoordinateSource::Passthrough => stats.coordinates_passthrough += 1,
                CoordinateSource::Converted => stats.coordinates_converted += 1,
            }
            if in_korea(&point) {
                Some(point)
            } else {
                stats.coordinates_nulled += 1;
                None
            }
        })
        .collect();

    logger.log_data_quality_issue("coordinates outside Korea nulled", stats.coordinates_nulled);
    logger.log_processing_complete(records.len(), resolved.iter().filter(|p| p.is_some()).count());
    resolved
}
