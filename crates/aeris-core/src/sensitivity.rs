//! Exposure sensitivity levels (1..=5) mapped to alert threshold scales
//! and user-facing labels.

/// Threshold multiplier for a user's sensitivity level.
/// Lower scale tightens the deterioration threshold.
pub fn sensitivity_scale(level: Option<i64>) -> f64 {
    match level {
        Some(1) | Some(2) => 1.0,
        Some(3) | Some(4) => 0.7,
        Some(5) => 0.5,
        _ => 1.0,
    }
}

/// Human-readable label for a sensitivity level.
pub fn sensitivity_label(level: Option<i64>) -> &'static str {
    match level {
        Some(1) | Some(2) => "Normal",
        Some(3) | Some(4) => "Sensitive",
        Some(5) => "Asthmatic",
        _ => "Normal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_bands() {
        assert_eq!(sensitivity_scale(Some(1)), 1.0);
        assert_eq!(sensitivity_scale(Some(2)), 1.0);
        assert_eq!(sensitivity_scale(Some(3)), 0.7);
        assert_eq!(sensitivity_scale(Some(4)), 0.7);
        assert_eq!(sensitivity_scale(Some(5)), 0.5);
        assert_eq!(sensitivity_scale(None), 1.0);
        assert_eq!(sensitivity_scale(Some(9)), 1.0);
    }

    #[test]
    fn test_labels() {
        assert_eq!(sensitivity_label(Some(2)), "Normal");
        assert_eq!(sensitivity_label(Some(4)), "Sensitive");
        assert_eq!(sensitivity_label(Some(5)), "Asthmatic");
        assert_eq!(sensitivity_label(None), "Normal");
    }
}
