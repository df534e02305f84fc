// src/geo/projection.rs - EPSG:5174 (Korean 1985 / Modified Central Belt) to WGS84
//
// Inverse transverse Mercator on the Bessel 1841 ellipsoid, then a
// 7-parameter position-vector Helmert shift through geocentric coordinates.

use crate::models::records::GeoPoint;

#[derive(Debug, Clone, Copy)]
pub struct Ellipsoid {
    pub a: f64,
    pub inv_f: f64,
}

impl Ellipsoid {
    fn e2(&self) -> f64 {
        let f = 1.0 / self.inv_f;
        2.0 * f - f * f
    }
}

pub const BESSEL_1841: Ellipsoid = Ellipsoid { a: 6_377_397.155, inv_f: 299.152_812_8 };
pub const WGS84: Ellipsoid = Ellipsoid { a: 6_378_137.0, inv_f: 298.257_223_563 };

/// Transverse Mercator parameters, angles in degrees.
#[derive(Debug, Clone, Copy)]
pub struct TransverseMercator {
    pub ellipsoid: Ellipsoid,
    pub lat_0: f64,
    pub lon_0: f64,
    pub k_0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

/// Translations in metres, rotations in arc-seconds, scale in ppm.
#[derive(Debug, Clone, Copy)]
pub struct Helmert {
    pub tx: f64,
    pub ty: f64,
    pub tz: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
    pub ds_ppm: f64,
}

pub const EPSG_5174: TransverseMercator = TransverseMercator {
    ellipsoid: BESSEL_1841,
    lat_0: 38.0,
    lon_0: 127.002_890_277_777_8,
    k_0: 1.0,
    false_easting: 200_000.0,
    false_northing: 500_000.0,
};

pub const KOREAN_1985_TO_WGS84: Helmert = Helmert {
    tx: -115.80,
    ty: 474.99,
    tz: 674.11,
    rx: 1.16,
    ry: -2.31,
    rz: -1.63,
    ds_ppm: 6.43,
};

const ARCSEC_TO_RAD: f64 = std::f64::consts::PI / (180.0 * 3600.0);

/// Meridional arc length from the equator to `phi` (radians).
fn meridian_arc(e: &Ellipsoid, phi: f64) -> f64 {
    let e2 = e.e2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    e.a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

impl TransverseMercator {
    /// Projected (easting, northing) to geodetic (lat, lon) in radians on
    /// this projection's ellipsoid.
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let el = &self.ellipsoid;
        let e2 = el.e2();
        let ep2 = e2 / (1.0 - e2);
        let lat_0 = self.lat_0.to_radians();
        let lon_0 = self.lon_0.to_radians();

        let m = meridian_arc(el, lat_0) + (northing - self.false_northing) / self.k_0;
        let mu = m / (el.a * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0));
        let sq = (1.0 - e2).sqrt();
        let e1 = (1.0 - sq) / (1.0 + sq);

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin1, cos1) = phi1.sin_cos();
        let tan1 = sin1 / cos1;
        let c1 = ep2 * cos1 * cos1;
        let t1 = tan1 * tan1;
        let w = 1.0 - e2 * sin1 * sin1;
        let n1 = el.a / w.sqrt();
        let r1 = el.a * (1.0 - e2) / w.powf(1.5);
        let d = (easting - self.false_easting) / (n1 * self.k_0);

        let lat = phi1
            - (n1 * tan1 / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lon = lon_0
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                    * d.powi(5)
                    / 120.0)
                / cos1;
        (lat, lon)
    }
}

fn geodetic_to_geocentric(e: &Ellipsoid, lat: f64, lon: f64, h: f64) -> [f64; 3] {
    let e2 = e.e2();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let n = e.a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    [
        (n + h) * cos_lat * lon.cos(),
        (n + h) * cos_lat * lon.sin(),
        (n * (1.0 - e2) + h) * sin_lat,
    ]
}

fn geocentric_to_geodetic(e: &Ellipsoid, xyz: [f64; 3]) -> (f64, f64) {
    let e2 = e.e2();
    let [x, y, z] = xyz;
    let p = (x * x + y * y).sqrt();
    let lon = y.atan2(x);
    let mut lat = z.atan2(p * (1.0 - e2));
    for _ in 0..10 {
        let sin_lat = lat.sin();
        let n = e.a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let h = p / lat.cos() - n;
        let next = z.atan2(p * (1.0 - e2 * n / (n + h)));
        if (next - lat).abs() < 1e-12 {
            lat = next;
            break;
        }
        lat = next;
    }
    (lat, lon)
}

impl Helmert {
    /// Position-vector convention, as used by PROJ `+towgs84`.
    pub fn apply(&self, xyz: [f64; 3]) -> [f64; 3] {
        let [x, y, z] = xyz;
        let rx = self.rx * ARCSEC_TO_RAD;
        let ry = self.ry * ARCSEC_TO_RAD;
        let rz = self.rz * ARCSEC_TO_RAD;
        let s = 1.0 + self.ds_ppm * 1e-6;
        [
            self.tx + s * (x - rz * y + ry * z),
            self.ty + s * (rz * x + y - rx * z),
            self.tz + s * (-ry * x + rx * y + z),
        ]
    }
}

/// EPSG:5174 (x, y) in metres to WGS84.
pub fn epsg5174_to_wgs84(x: f64, y: f64) -> GeoPoint {
    let (lat, lon) = EPSG_5174.inverse(x, y);
    let local = geodetic_to_geocentric(&BESSEL_1841, lat, lon, 0.0);
    let shifted = KOREAN_1985_TO_WGS84.apply(local);
    let (lat, lon) = geocentric_to_geodetic(&WGS84, shifted);
    GeoPoint {
        latitude: lat.to_degrees(),
        longitude: lon.to_degrees(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_origin() {
        let (lat, lon) = EPSG_5174.inverse(200_000.0, 500_000.0);
        assert!((lat.to_degrees() - 38.0).abs() < 1e-7);
        assert!((lon.to_degrees() - 127.002_890_277_777_8).abs() < 1e-9);
    }

    #[test]
    fn test_origin_to_wgs84() {
        let p = epsg5174_to_wgs84(200_000.0, 500_000.0);
        // Datum shift moves the origin by a few hundred metres at most.
        assert!((p.latitude - 38.0).abs() < 0.01, "lat {}", p.latitude);
        assert!((p.longitude - 127.0).abs() < 0.01, "lon {}", p.longitude);
    }

    #[test]
    fn test_seoul_city_hall() {
        let p = epsg5174_to_wgs84(198_040.0, 451_570.0);
        assert!((p.latitude - 37.5665).abs() < 0.02, "lat {}", p.latitude);
        assert!((p.longitude - 126.978).abs() < 0.02, "lon {}", p.longitude);
    }

    #[test]
    fn test_geocentric_round_trip() {
        let lat = 37.5_f64.to_radians();
        let lon = 127.0_f64.to_radians();
        let xyz = geodetic_to_geocentric(&WGS84, lat, lon, 0.0);
        let (lat2, lon2) = geocentric_to_geodetic(&WGS84, xyz);
        assert!((lat - lat2).abs() < 1e-10);
        assert!((lon - lon2).abs() < 1e-12);
    }
}
