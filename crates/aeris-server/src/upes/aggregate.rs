//! Aggregate pollution_grid rows into regular per-gas grids.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use aeris_core::spatial::BoundingBox;
use aeris_core::{GasType, GridSpec};

use crate::persistence::pollution_grid;

/// Mean `pollution_value` per (gas, cell) over a time window; cells
/// without data are NaN. Gases come back in a stable order.
pub async fn aggregate_window(
    pool: &SqlitePool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bbox: &BoundingBox,
    resolution_deg: f64,
) -> Result<(GridSpec, Vec<(GasType, Vec<f64>)>)> {
    let spec = GridSpec::from_bbox(bbox.west, bbox.south, bbox.east, bbox.north, resolution_deg);
    let cells = pollution_grid::cells_in_window(pool, start, end, bbox).await?;

    let mut accum: HashMap<GasType, Vec<(f64, u32)>> = HashMap::new();
    for cell in cells {
        let per_gas = accum
            .entry(cell.gas_type)
            .or_insert_with(|| vec![(0.0, 0); spec.len()]);
        let (row, col) = spec.cell_index(cell.lon, cell.lat);
        let slot = &mut per_gas[spec.flat_index(row, col)];
        slot.0 += cell.pollution_value;
        slot.1 += 1;
    }

    let mut grids = Vec::new();
    for gas in aeris_core::ALL_GASES {
        if let Some(sums) = accum.remove(&gas) {
            let grid: Vec<f64> = sums
                .into_iter()
                .map(|(sum, count)| if count > 0 { sum / count as f64 } else { f64::NAN })
                .collect();
            grids.push((gas, grid));
        }
    }
    Ok((spec, grids))
}
