// src/utils/constants.rs

/// Sentinel branch/rep value for businesses with no accepted territory match.
pub const UNASSIGNED: &str = "미지정";

/// Square metres per pyeong, the local floor-area unit.
pub const SQUARE_METERS_PER_PYEONG: f64 = 3.3058;

/// Inclusive bounding box for coordinates that can plausibly be in Korea.
pub const MIN_LATITUDE: f64 = 30.0;
pub const MAX_LATITUDE: f64 = 45.0;
pub const MIN_LONGITUDE: f64 = 120.0;
pub const MAX_LONGITUDE: f64 = 140.0;

/// Substring that marks a column as address-like during the header probe.
pub const ADDRESS_COLUMN_MARKER: &str = "주소";

/// Hours east of UTC for all wall-clock timestamps (KST).
pub const KST_OFFSET_HOURS: i32 = 9;
