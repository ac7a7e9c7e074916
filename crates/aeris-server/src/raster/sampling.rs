//! Sample a UPES raster along a polyline.

use aeris_core::spatial::resample_line;

use super::geotiff::Raster;

/// Exposure assumed when no raster exists or no sample lands on data.
pub const UPES_FALLBACK: f64 = 0.5;

/// Geodesic step between samples along an edge or route line.
pub const SAMPLE_STEP_M: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSampleStats {
    pub mean: f64,
    pub max: f64,
    pub samples: usize,
}

/// Resample the line at `step_m` and read the raster at each point.
/// Returns `None` when no raster is given or no point hits valid data.
/// Values are clamped to [0, 1].
pub fn sample_along_line(
    raster: Option<&Raster>,
    coords: &[(f64, f64)],
    step_m: f64,
) -> Option<LineSampleStats> {
    let raster = raster?;
    if coords.is_empty() {
        return None;
    }
    let points = resample_line(coords, step_m);
    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    let mut count = 0usize;
    for (lon, lat) in points {
        if let Some(value) = raster.sample(lon, lat) {
            let value = value.clamp(0.0, 1.0);
            sum += value;
            max = max.max(value);
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some(LineSampleStats {
        mean: sum / count as f64,
        max,
        samples: count,
    })
}

/// Mean exposure along a line with the documented fallback.
pub fn mean_upes_or_fallback(raster: Option<&Raster>, coords: &[(f64, f64)], step_m: f64) -> f64 {
    sample_along_line(raster, coords, step_m)
        .map(|stats| stats.mean)
        .unwrap_or(UPES_FALLBACK)
}

/// (mean, max) along a line with the documented fallback.
pub fn mean_max_or_fallback(
    raster: Option<&Raster>,
    coords: &[(f64, f64)],
    step_m: f64,
) -> (f64, f64) {
    sample_along_line(raster, coords, step_m)
        .map(|stats| (stats.mean, stats.max))
        .unwrap_or((UPES_FALLBACK, UPES_FALLBACK))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aeris_core::GridSpec;

    fn gradient_raster() -> Raster {
        // 4x4 grid over 1 degree: top row 1.0 fading to 0.25 at the bottom.
        let spec = GridSpec::from_bbox(-119.0, 33.0, -118.0, 34.0, 0.25);
        let mut values = Vec::with_capacity(spec.len());
        for row in 0..spec.ny {
            for _ in 0..spec.nx {
                values.push(1.0 - row as f64 * 0.25);
            }
        }
        Raster::from_grid(&spec, &values)
    }

    #[test]
    fn test_missing_raster_falls_back() {
        let line = vec![(-118.9, 33.1), (-118.1, 33.9)];
        assert_eq!(mean_upes_or_fallback(None, &line, 50.0), UPES_FALLBACK);
        assert_eq!(mean_max_or_fallback(None, &line, 50.0), (UPES_FALLBACK, UPES_FALLBACK));
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let raster = gradient_raster();
        let line = vec![(-118.9, 33.1), (-118.1, 33.9)];
        let a = sample_along_line(Some(&raster), &line, 50.0).unwrap();
        let b = sample_along_line(Some(&raster), &line, 50.0).unwrap();
        assert_eq!(a, b);
        assert!(a.samples > 2);
    }

    #[test]
    fn test_mean_and_max_reflect_gradient() {
        let raster = gradient_raster();
        // South-to-north line crosses all four bands: max is the north band.
        let line = vec![(-118.5, 33.05), (-118.5, 33.95)];
        let stats = sample_along_line(Some(&raster), &line, 50.0).unwrap();
        assert!((stats.max - 1.0).abs() < 1e-9);
        assert!(stats.mean > 0.25 && stats.mean < 1.0);
    }

    #[test]
    fn test_line_outside_coverage_falls_back() {
        let raster = gradient_raster();
        let line = vec![(0.0, 0.0), (0.1, 0.1)];
        assert!(sample_along_line(Some(&raster), &line, 50.0).is_none());
        assert_eq!(mean_upes_or_fallback(Some(&raster), &line, 50.0), UPES_FALLBACK);
    }
}
