//! UPES scoring math: gas normalization, weighted satellite score,
//! environmental modifiers and EMA smoothing.
//!
//! All per-cell arrays are row-major grids where missing data is NaN.

use crate::gases::GasType;

/// Default gas weights for the satellite score; they sum to 1.0.
pub fn upes_weight(gas: GasType) -> f64 {
    match gas {
        GasType::No2 => 0.30,
        GasType::Pm => 0.25,
        GasType::O3 => 0.20,
        GasType::Ch2o => 0.15,
        GasType::Ai => 0.10,
    }
}

/// Linear-interpolated percentile of already-valid (finite) values.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let t = rank - lo as f64;
        sorted[lo] + t * (sorted[hi] - sorted[lo])
    }
}

/// Normalization bounds for one gas's hourly grid: 5th/99th percentile of
/// the valid values, with the high bound clamped to the gas's hazardous
/// threshold and the low bound clamped to >= 0.
pub fn normalization_bounds(values: &[f64], gas: GasType) -> (f64, f64) {
    let mut valid: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if valid.is_empty() {
        return (0.0, 1.0);
    }
    valid.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut low = percentile(&valid, 5.0).max(0.0);
    let high = percentile(&valid, 99.0).min(gas.thresholds().hazardous);
    if high <= 0.0 {
        return (0.0, 1.0);
    }
    // Degenerate spread (single value, or a grid entirely above the
    // hazardous clamp): anchor the low bound at zero.
    if low >= high {
        low = 0.0;
    }
    (low, high)
}

/// Normalize one value into [0, 1]; values below `low` map to 0, above
/// `high` to 1, linear in between. NaN stays NaN.
pub fn normalize_value(value: f64, low: f64, high: f64) -> f64 {
    if value.is_nan() {
        return f64::NAN;
    }
    if high <= low {
        return 0.0;
    }
    ((value - low) / (high - low)).clamp(0.0, 1.0)
}

/// Normalize a whole grid in place semantics (returns a new vec).
pub fn normalize_grid(values: &[f64], low: f64, high: f64) -> Vec<f64> {
    values.iter().map(|&v| normalize_value(v, low, high)).collect()
}

/// Weighted satellite score per cell over the normalized gas grids.
///
/// Missing gases are dropped per cell and the remaining weights are
/// renormalized; a cell where no gas is present stays NaN.
pub fn satellite_score(normalized: &[(GasType, Vec<f64>)], cells: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; cells];
    for i in 0..cells {
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        for (gas, grid) in normalized {
            let v = grid.get(i).copied().unwrap_or(f64::NAN);
            if v.is_nan() {
                continue;
            }
            let w = upes_weight(*gas);
            weighted += w * v;
            weight_sum += w;
        }
        if weight_sum > 0.0 {
            out[i] = weighted / weight_sum;
        }
    }
    out
}

/// Humidity dispersion factor: HDF = 1 + 0.3*(humidity%/100 - 0.5),
/// clamped to [0.85, 1.15].
pub fn humidity_dispersion_factor(humidity_pct: f64) -> f64 {
    (1.0 + 0.3 * (humidity_pct / 100.0 - 0.5)).clamp(0.85, 1.15)
}

/// Wind factor: more wind disperses pollutants and lowers the score.
/// WTF = 1 - 0.02 * wind_kph, clamped to [0.7, 1.0].
pub fn wind_factor(wind_kph: f64) -> f64 {
    (1.0 - 0.02 * wind_kph).clamp(0.7, 1.0)
}

/// Traffic factor: TF = 1 + alpha * traffic_density, density in [0, 1].
pub fn traffic_factor(traffic_density: f64, alpha: f64) -> f64 {
    1.0 + alpha * traffic_density.clamp(0.0, 1.0)
}

/// EMA across consecutive hours: lam*current + (1-lam)*previous per cell.
/// Shape mismatch or absent previous returns the current grid unchanged;
/// cells where only one side is valid keep the valid side's semantics
/// (missing previous falls back to current).
pub fn apply_ema(current: &[f64], previous: Option<&[f64]>, lam: f64) -> Vec<f64> {
    let previous = match previous {
        Some(prev) if prev.len() == current.len() => prev,
        _ => return current.to_vec(),
    };
    current
        .iter()
        .zip(previous.iter())
        .map(|(&cur, &prev)| {
            if cur.is_nan() {
                f64::NAN
            } else if prev.is_nan() {
                cur
            } else {
                lam * cur + (1.0 - lam) * prev
            }
        })
        .collect()
}

/// Final per-cell score: satellite * HDF * WTF * TF clamped to [0, 1],
/// then EMA-smoothed when a lambda in (0, 1] is configured.
pub fn final_scores(
    satellite: &[f64],
    hdf: f64,
    wtf: f64,
    tf: f64,
    previous_final: Option<&[f64]>,
    ema_lambda: Option<f64>,
) -> Vec<f64> {
    let raw: Vec<f64> = satellite
        .iter()
        .map(|&v| {
            if v.is_nan() {
                f64::NAN
            } else {
                (v * hdf * wtf * tf).clamp(0.0, 1.0)
            }
        })
        .collect();
    match ema_lambda {
        Some(lam) if lam > 0.0 && lam <= 1.0 => apply_ema(&raw, previous_final, lam),
        _ => raw,
    }
}

/// Mean of the finite values; NaN when there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &v in values {
        if v.is_finite() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = crate::gases::ALL_GASES.iter().map(|g| upes_weight(*g)).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_clamps_and_keeps_nan() {
        assert_eq!(normalize_value(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(normalize_value(25.0, 0.0, 10.0), 1.0);
        assert_eq!(normalize_value(5.0, 0.0, 10.0), 0.5);
        assert!(normalize_value(f64::NAN, 0.0, 10.0).is_nan());
    }

    #[test]
    fn test_bounds_clamp_to_hazardous() {
        // A grid far above the hazardous threshold: the high bound clamps.
        let values = vec![5.0e16, 6.0e16, 9.0e16];
        let (_, high) = normalization_bounds(&values, GasType::No2);
        assert_eq!(high, GasType::No2.thresholds().hazardous);
    }

    #[test]
    fn test_bounds_empty_grid() {
        assert_eq!(normalization_bounds(&[f64::NAN], GasType::Pm), (0.0, 1.0));
    }

    #[test]
    fn test_satellite_score_renormalizes_missing_gases() {
        // Only NO2 present at cell 0: score equals the NO2 value alone.
        let normalized = vec![
            (GasType::No2, vec![0.8, f64::NAN]),
            (GasType::Pm, vec![f64::NAN, f64::NAN]),
        ];
        let score = satellite_score(&normalized, 2);
        assert!((score[0] - 0.8).abs() < 1e-12);
        assert!(score[1].is_nan());
    }

    #[test]
    fn test_satellite_score_weighted_mix() {
        let normalized = vec![
            (GasType::No2, vec![1.0]),
            (GasType::Pm, vec![0.0]),
        ];
        // (0.30*1 + 0.25*0) / 0.55
        let score = satellite_score(&normalized, 1);
        assert!((score[0] - 0.30 / 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_hdf_bounds() {
        assert_eq!(humidity_dispersion_factor(50.0), 1.0);
        assert_eq!(humidity_dispersion_factor(0.0), 0.85);
        assert_eq!(humidity_dispersion_factor(100.0), 1.15);
    }

    #[test]
    fn test_wtf_bounds() {
        assert_eq!(wind_factor(0.0), 1.0);
        assert_eq!(wind_factor(10.0), 0.8);
        assert_eq!(wind_factor(50.0), 0.7);
        assert_eq!(wind_factor(500.0), 0.7);
    }

    #[test]
    fn test_traffic_factor_default_density() {
        assert_eq!(traffic_factor(0.0, 0.1), 1.0);
        assert_eq!(traffic_factor(1.0, 0.1), 1.1);
        assert_eq!(traffic_factor(7.0, 0.1), 1.1);
    }

    #[test]
    fn test_ema_blends_and_falls_back() {
        let current = vec![1.0, 0.5, f64::NAN];
        let previous = vec![0.0, f64::NAN, 0.2];
        let out = apply_ema(&current, Some(&previous), 0.6);
        assert!((out[0] - 0.6).abs() < 1e-12);
        assert_eq!(out[1], 0.5);
        assert!(out[2].is_nan());

        // Shape mismatch: current wins untouched.
        let out = apply_ema(&current, Some(&[0.1]), 0.6);
        assert_eq!(out[0], 1.0);
    }

    #[test]
    fn test_final_scores_clamped() {
        let sat = vec![0.9];
        let out = final_scores(&sat, 1.15, 1.0, 1.1, None, None);
        assert_eq!(out[0], 1.0);
    }
}
