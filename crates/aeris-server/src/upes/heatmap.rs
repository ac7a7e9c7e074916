//! Heatmap PNG rendering for the latest final-score raster.

use anyhow::{Context, Result};

use crate::raster::Raster;

/// Yellow-to-red ramp over [0, 1]; cells above the alert threshold are
/// darkened, missing cells are transparent.
fn color_for(value: f64, threshold: f64) -> [u8; 4] {
    let v = value.clamp(0.0, 1.0);
    let red = 255u8;
    let green = (230.0 * (1.0 - v)) as u8;
    let blue = (60.0 * (1.0 - v)) as u8;
    if v >= threshold {
        [(red as f64 * 0.75) as u8, (green as f64 * 0.5) as u8, blue / 2, 255]
    } else {
        [red, green, blue, 255]
    }
}

/// Render a raster as an RGBA PNG in scan order.
pub fn render_heatmap(raster: &Raster, threshold: f64) -> Result<Vec<u8>> {
    let mut pixels = Vec::with_capacity(raster.width * raster.height * 4);
    for value in &raster.values {
        if value.is_nan() {
            pixels.extend_from_slice(&[0, 0, 0, 0]);
        } else {
            pixels.extend_from_slice(&color_for(*value as f64, threshold));
        }
    }

    let mut out = Vec::new();
    {
        let mut encoder =
            png::Encoder::new(&mut out, raster.width as u32, raster.height as u32);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().context("PNG header write failed")?;
        writer
            .write_image_data(&pixels)
            .context("PNG data write failed")?;
    }
    Ok(out)
}
