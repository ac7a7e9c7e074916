//! UPES output artifacts: raster paths, JSON run logs and latest-file
//! resolution.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hour slot used in every artifact name, e.g. `20260301_14`.
pub fn hour_slot(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%d_%H").to_string()
}

pub fn satellite_dir(base: &Path) -> PathBuf {
    base.join("hourly_scores").join("satellite_score")
}

pub fn final_dir(base: &Path) -> PathBuf {
    base.join("hourly_scores").join("final_score")
}

pub fn logs_dir(base: &Path) -> PathBuf {
    base.join("logs")
}

pub fn satellite_path(base: &Path, slot: &str) -> PathBuf {
    satellite_dir(base).join(format!("satellite_score_{slot}.tif"))
}

pub fn final_path(base: &Path, slot: &str) -> PathBuf {
    final_dir(base).join(format!("final_score_{slot}.tif"))
}

pub fn log_path(base: &Path, slot: &str) -> PathBuf {
    logs_dir(base).join(format!("upes_{slot}.json"))
}

pub fn ensure_dirs(base: &Path) -> Result<()> {
    fs::create_dir_all(satellite_dir(base))?;
    fs::create_dir_all(final_dir(base))?;
    fs::create_dir_all(logs_dir(base))?;
    Ok(())
}

/// Scalar factors and counts recorded for each UPES run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpesLog {
    pub timestamp: String,
    pub granule_ids: Vec<String>,
    pub gases: Vec<String>,
    pub cells: usize,
    pub satellite_score: f64,
    pub humidity_factor: f64,
    pub wind_factor: f64,
    pub traffic_factor: f64,
    pub final_score: f64,
}

pub fn write_log(base: &Path, slot: &str, log: &UpesLog) -> Result<PathBuf> {
    ensure_dirs(base)?;
    let path = log_path(base, slot);
    fs::write(&path, serde_json::to_string_pretty(log)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

pub fn read_log(path: &Path) -> Result<UpesLog> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Newest file by modification time matching a prefix/suffix in a dir.
fn latest_matching(dir: &Path, prefix: &str, suffix: &str) -> Option<PathBuf> {
    let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir).ok()? {
        let entry = entry.ok()?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(prefix) || !name.ends_with(suffix) {
            continue;
        }
        let modified = entry.metadata().ok()?.modified().ok()?;
        match &best {
            Some((best_time, _)) if *best_time >= modified => {}
            _ => best = Some((modified, entry.path())),
        }
    }
    best.map(|(_, path)| path)
}

/// The most recent final-score raster is the canonical "current UPES".
pub fn latest_final_raster(base: &Path) -> Option<PathBuf> {
    latest_matching(&final_dir(base), "final_score_", ".tif")
}

pub fn latest_log(base: &Path) -> Option<(PathBuf, UpesLog)> {
    let path = latest_matching(&logs_dir(base), "upes_", ".json")?;
    let log = read_log(&path).ok()?;
    Some((path, log))
}

/// Artifact paths for a specific hour slot, when they exist.
pub fn paths_for_slot(base: &Path, slot: &str) -> Option<(PathBuf, PathBuf, Option<PathBuf>)> {
    let satellite = satellite_path(base, slot);
    let final_score = final_path(base, slot);
    if !satellite.exists() && !final_score.exists() {
        return None;
    }
    let log = log_path(base, slot);
    Some((satellite, final_score, log.exists().then_some(log)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_slot_and_paths() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap();
        let slot = hour_slot(ts);
        assert_eq!(slot, "20260301_14");

        let base = Path::new("/tmp/upes");
        assert_eq!(
            satellite_path(base, &slot),
            Path::new("/tmp/upes/hourly_scores/satellite_score/satellite_score_20260301_14.tif")
        );
        assert_eq!(
            final_path(base, &slot),
            Path::new("/tmp/upes/hourly_scores/final_score/final_score_20260301_14.tif")
        );
        assert_eq!(log_path(base, &slot), Path::new("/tmp/upes/logs/upes_20260301_14.json"));
    }

    #[test]
    fn test_latest_final_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        ensure_dirs(base).unwrap();

        fs::write(final_path(base, "20260301_13"), b"old").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(final_path(base, "20260301_14"), b"new").unwrap();
        // Non-matching files are ignored.
        fs::write(final_dir(base).join("scratch.txt"), b"x").unwrap();

        let latest = latest_final_raster(base).unwrap();
        assert!(latest.ends_with("final_score_20260301_14.tif"));
    }

    #[test]
    fn test_log_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let log = UpesLog {
            timestamp: "2026-03-01T14:00:00+00:00".to_string(),
            granule_ids: vec![],
            gases: vec!["NO2".to_string()],
            cells: 42,
            satellite_score: 0.61,
            humidity_factor: 1.0,
            wind_factor: 0.9,
            traffic_factor: 1.0,
            final_score: 0.55,
        };
        let path = write_log(dir.path(), "20260301_14", &log).unwrap();
        let reread = read_log(&path).unwrap();
        assert_eq!(reread.cells, 42);
        assert_eq!(reread.gases, vec!["NO2"]);

        let (latest_path, latest) = latest_log(dir.path()).unwrap();
        assert_eq!(latest_path, path);
        assert!((latest.final_score - 0.55).abs() < 1e-12);
    }
}
