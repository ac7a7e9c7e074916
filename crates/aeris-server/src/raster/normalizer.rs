//! Raster normalizer: GeoTIFF band -> chunked pollution grid rows.

use chrono::{DateTime, Utc};

use aeris_core::{classify_pollution_level, CellBounds, GasType, GridRow};

use super::geotiff::Raster;

pub const DEFAULT_MAX_CELLS: usize = 5000;
pub const DEFAULT_CHUNK_SIZE: usize = 2000;

#[derive(Debug, Clone, Copy)]
pub struct NormalizerOptions {
    /// Upper bound on emitted cells; the stride is chosen to respect it.
    pub max_cells: usize,
    /// Rows per yielded chunk, sized for one bulk-insert transaction.
    pub chunk_size: usize,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            max_cells: DEFAULT_MAX_CELLS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Lazy chunked iterator over grid rows for one (gas, timestamp) raster.
pub struct GridRowChunks<'a> {
    raster: &'a Raster,
    gas: GasType,
    timestamp: DateTime<Utc>,
    step: usize,
    max_cells: usize,
    chunk_size: usize,
    row: usize,
    col: usize,
    emitted: usize,
}

impl<'a> GridRowChunks<'a> {
    fn next_row(&mut self) -> Option<GridRow> {
        while self.emitted < self.max_cells && self.row < self.raster.height {
            let (row, col) = (self.row, self.col);
            self.col += self.step;
            if self.col >= self.raster.width {
                self.col = 0;
                self.row += self.step;
            }

            let value = self.raster.values[row * self.raster.width + col] as f64;
            if value.is_nan() {
                continue;
            }
            let lon_c = self.raster.west + (col as f64 + 0.5) * self.raster.res_x;
            let lat_c = self.raster.north - (row as f64 + 0.5) * self.raster.res_y;
            let (_, severity) = classify_pollution_level(value, self.gas);
            self.emitted += 1;
            return Some(GridRow {
                timestamp: self.timestamp,
                gas_type: self.gas,
                bounds: CellBounds {
                    min_lon: lon_c - self.raster.res_x / 2.0,
                    min_lat: lat_c - self.raster.res_y / 2.0,
                    max_lon: lon_c + self.raster.res_x / 2.0,
                    max_lat: lat_c + self.raster.res_y / 2.0,
                },
                pollution_value: value,
                severity_level: severity,
            });
        }
        None
    }
}

impl<'a> Iterator for GridRowChunks<'a> {
    type Item = Vec<GridRow>;

    fn next(&mut self) -> Option<Vec<GridRow>> {
        let mut chunk = Vec::with_capacity(self.chunk_size);
        while chunk.len() < self.chunk_size {
            match self.next_row() {
                Some(row) => chunk.push(row),
                None => break,
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }
}

/// Subsample stride so the emitted cell count stays under `max_cells`.
fn subsample_step(total_pixels: usize, max_cells: usize) -> usize {
    if total_pixels <= max_cells {
        return 1;
    }
    (((total_pixels as f64) / (max_cells as f64)).sqrt() as usize).max(1)
}

/// Turn a raster into chunked grid rows ready for bulk insert.
pub fn raster_to_grid_rows<'a>(
    raster: &'a Raster,
    gas: GasType,
    timestamp: DateTime<Utc>,
    options: &NormalizerOptions,
) -> GridRowChunks<'a> {
    let step = subsample_step(raster.width * raster.height, options.max_cells);
    GridRowChunks {
        raster,
        gas,
        timestamp,
        step,
        max_cells: options.max_cells,
        chunk_size: options.chunk_size.max(1),
        row: 0,
        col: 0,
        emitted: 0,
    }
}
