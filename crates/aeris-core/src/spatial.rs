//! Spatial math for exposure sampling and alert geometry.

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculate distance between two points in meters using the Haversine formula.
///
/// Standard great-circle distance on a sphere given decimal-degree
/// latitudes and longitudes.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Bearing from point 1 to point 2 in degrees, normalized to [0, 360).
/// 0 = north, 90 = east.
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    (x.atan2(y).to_degrees() + 360.0) % 360.0
}

/// Absolute difference between two compass angles, in [0, 180].
pub fn angle_diff_deg(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 360.0;
    d.min(360.0 - d)
}

/// Resample a polyline (list of (lon, lat)) at `step_m` geodesic intervals.
///
/// The first and last input vertices are always included; intermediate
/// samples are linearly interpolated in degree space, which is adequate
/// at the ~50 m steps used for raster sampling.
pub fn resample_line(coords: &[(f64, f64)], step_m: f64) -> Vec<(f64, f64)> {
    if coords.is_empty() || step_m <= 0.0 {
        return coords.to_vec();
    }
    let mut out = vec![coords[0]];
    // Distance remaining until the next sample point.
    let mut residual = step_m;
    for pair in coords.windows(2) {
        let (lon1, lat1) = pair[0];
        let (lon2, lat2) = pair[1];
        let seg_m = haversine_distance(lat1, lon1, lat2, lon2);
        if seg_m <= 0.0 {
            continue;
        }
        let mut offset = 0.0;
        while residual <= seg_m - offset {
            offset += residual;
            let t = offset / seg_m;
            out.push((lon1 + t * (lon2 - lon1), lat1 + t * (lat2 - lat1)));
            residual = step_m;
        }
        residual -= seg_m - offset;
    }
    if let (Some(last_in), Some(last_out)) = (coords.last(), out.last()) {
        if last_in != last_out {
            out.push(*last_in);
        }
    }
    out
}

/// Axis-aligned geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self { west, south, east, north }
    }

    /// Envelope of a point set, useful for origin/destination pairs.
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = BoundingBox::new(first.0, first.1, first.0, first.1);
        for &(lon, lat) in points.iter().skip(1) {
            bbox.west = bbox.west.min(lon);
            bbox.east = bbox.east.max(lon);
            bbox.south = bbox.south.min(lat);
            bbox.north = bbox.north.max(lat);
        }
        Some(bbox)
    }

    /// Expand every side by approximately `km` kilometers.
    pub fn expanded_km(&self, km: f64) -> Self {
        let center_lat = (self.south + self.north) / 2.0;
        let dlat = km / 111.32;
        let cos_lat = center_lat.to_radians().cos().abs().max(0.01);
        let dlon = km / (111.32 * cos_lat);
        BoundingBox {
            west: self.west - dlon,
            south: (self.south - dlat).max(-90.0),
            east: self.east + dlon,
            north: (self.north + dlat).min(90.0),
        }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.west + self.east) / 2.0, (self.south + self.north) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // ~111km between these points (1 degree latitude)
        let dist = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((dist - 111_194.0).abs() < 100.0);
    }

    #[test]
    fn test_haversine_same_point() {
        let dist = haversine_distance(34.05, -118.24, 34.05, -118.24);
        assert!(dist < 0.001);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        assert!((bearing_deg(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 0.5);
        assert!((bearing_deg(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 0.5);
        assert!((bearing_deg(1.0, 0.0, 0.0, 0.0) - 180.0).abs() < 0.5);
        assert!((bearing_deg(0.0, 1.0, 0.0, 0.0) - 270.0).abs() < 0.5);
    }

    #[test]
    fn test_angle_diff_wraps() {
        assert_eq!(angle_diff_deg(10.0, 350.0), 20.0);
        assert_eq!(angle_diff_deg(350.0, 10.0), 20.0);
        assert_eq!(angle_diff_deg(90.0, 90.0), 0.0);
        assert_eq!(angle_diff_deg(0.0, 180.0), 180.0);
    }

    #[test]
    fn test_resample_line_step_count() {
        // ~1.1 km segment, 100 m step: endpoints plus ~10 interior samples.
        let coords = vec![(-118.2, 34.0), (-118.2, 34.01)];
        let samples = resample_line(&coords, 100.0);
        assert!(samples.len() >= 11 && samples.len() <= 13);
        assert_eq!(samples.first(), Some(&coords[0]));
        assert_eq!(samples.last(), Some(&coords[1]));
    }

    #[test]
    fn test_resample_is_deterministic() {
        let coords = vec![(-118.2, 34.0), (-118.19, 34.005), (-118.18, 34.01)];
        assert_eq!(resample_line(&coords, 50.0), resample_line(&coords, 50.0));
    }

    #[test]
    fn test_bbox_expand_contains_original() {
        let bbox = BoundingBox::from_points(&[(-118.2, 34.0), (-118.1, 34.1)]).unwrap();
        let grown = bbox.expanded_km(3.0);
        assert!(grown.west < bbox.west);
        assert!(grown.north > bbox.north);
        assert!(grown.contains(-118.15, 34.05));
    }
}
