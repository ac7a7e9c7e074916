//! Raster I/O: GeoTIFF codec, grid-row normalizer and line sampler.

pub mod geotiff;
pub mod normalizer;
pub mod sampling;

pub use geotiff::{decode_geotiff, encode_geotiff, read_raster, write_raster_atomic, Raster};
pub use normalizer::{raster_to_grid_rows, NormalizerOptions};
pub use sampling::{
    mean_max_or_fallback, mean_upes_or_fallback, sample_along_line, LineSampleStats,
    SAMPLE_STEP_M, UPES_FALLBACK,
};
