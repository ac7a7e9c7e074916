//! Minimal GeoTIFF codec for UPES score rasters.
//!
//! Encodes single-band float32 rasters as uncompressed strip-based
//! little-endian TIFF with ModelPixelScale/ModelTiepoint geo-referencing
//! (WGS84, pixel-is-area) and a GDAL nodata tag. The decoder accepts both
//! byte orders and float32/float64 samples, which covers the files the
//! coverage provider returns for subset requests as well as our own
//! output.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use aeris_core::GridSpec;

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_DOUBLE: u16 = 12;

const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_BITS_PER_SAMPLE: u16 = 258;
const TAG_COMPRESSION: u16 = 259;
const TAG_PHOTOMETRIC: u16 = 262;
const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_SAMPLES_PER_PIXEL: u16 = 277;
const TAG_ROWS_PER_STRIP: u16 = 278;
const TAG_STRIP_BYTE_COUNTS: u16 = 279;
const TAG_SAMPLE_FORMAT: u16 = 339;
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

/// A single-band raster in WGS84 with row-major scan order from the
/// north-west corner. Missing cells are NaN.
#[derive(Debug, Clone)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub west: f64,
    pub north: f64,
    /// Positive degrees per pixel.
    pub res_x: f64,
    pub res_y: f64,
    pub values: Vec<f32>,
}

impl Raster {
    /// Build a raster from a UPES grid and its per-cell values.
    pub fn from_grid(spec: &GridSpec, values: &[f64]) -> Raster {
        Raster {
            width: spec.nx,
            height: spec.ny,
            west: spec.west,
            north: spec.north,
            res_x: spec.resolution_deg,
            res_y: spec.resolution_deg,
            values: values.iter().map(|&v| v as f32).collect(),
        }
    }

    pub fn rowcol(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        let col = ((lon - self.west) / self.res_x).floor();
        let row = ((self.north - lat) / self.res_y).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.height || col >= self.width {
            return None;
        }
        Some((row, col))
    }

    /// Value at a geographic point; `None` outside coverage or on nodata.
    pub fn sample(&self, lon: f64, lat: f64) -> Option<f64> {
        let (row, col) = self.rowcol(lon, lat)?;
        let value = self.values[row * self.width + col];
        if value.is_nan() {
            None
        } else {
            Some(value as f64)
        }
    }

    pub fn values_f64(&self) -> Vec<f64> {
        self.values.iter().map(|&v| v as f64).collect()
    }
}

/// Encode a raster as a little-endian single-strip GeoTIFF.
pub fn encode_geotiff(raster: &Raster) -> Vec<u8> {
    let data_len = raster.values.len() * 4;
    let data_offset = 8u32;
    let scale_offset = data_offset + data_len as u32;
    let tiepoint_offset = scale_offset + 24;
    let geokeys_offset = tiepoint_offset + 48;
    let ifd_offset = geokeys_offset + 32;

    let mut out = Vec::with_capacity(ifd_offset as usize + 2 + 14 * 12 + 4);
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&ifd_offset.to_le_bytes());

    for value in &raster.values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    for scale in [raster.res_x, raster.res_y, 0.0] {
        out.extend_from_slice(&scale.to_le_bytes());
    }
    for tiepoint in [0.0, 0.0, 0.0, raster.west, raster.north, 0.0] {
        out.extend_from_slice(&tiepoint.to_le_bytes());
    }
    // GeoKeyDirectory: version 1.1.0, 3 keys: geographic model,
    // pixel-is-area, EPSG 4326.
    for short in [
        1u16, 1, 0, 3,
        1024, 0, 1, 2,
        1025, 0, 1, 1,
        2048, 0, 1, 4326,
    ] {
        out.extend_from_slice(&short.to_le_bytes());
    }

    let mut entry = |out: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: u32| {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    };

    out.extend_from_slice(&14u16.to_le_bytes());
    entry(&mut out, TAG_IMAGE_WIDTH, TYPE_LONG, 1, raster.width as u32);
    entry(&mut out, TAG_IMAGE_LENGTH, TYPE_LONG, 1, raster.height as u32);
    entry(&mut out, TAG_BITS_PER_SAMPLE, TYPE_SHORT, 1, 32);
    entry(&mut out, TAG_COMPRESSION, TYPE_SHORT, 1, 1);
    entry(&mut out, TAG_PHOTOMETRIC, TYPE_SHORT, 1, 1);
    entry(&mut out, TAG_STRIP_OFFSETS, TYPE_LONG, 1, data_offset);
    entry(&mut out, TAG_SAMPLES_PER_PIXEL, TYPE_SHORT, 1, 1);
    entry(&mut out, TAG_ROWS_PER_STRIP, TYPE_LONG, 1, raster.height as u32);
    entry(&mut out, TAG_STRIP_BYTE_COUNTS, TYPE_LONG, 1, data_len as u32);
    entry(&mut out, TAG_SAMPLE_FORMAT, TYPE_SHORT, 1, 3);
    entry(&mut out, TAG_MODEL_PIXEL_SCALE, TYPE_DOUBLE, 3, scale_offset);
    entry(&mut out, TAG_MODEL_TIEPOINT, TYPE_DOUBLE, 6, tiepoint_offset);
    entry(&mut out, TAG_GEO_KEY_DIRECTORY, TYPE_SHORT, 16, geokeys_offset);
    // "nan\0" fits inline.
    entry(&mut out, TAG_GDAL_NODATA, TYPE_ASCII, 4, u32::from_le_bytes(*b"nan\0"));
    out.extend_from_slice(&0u32.to_le_bytes());

    out
}

struct TiffReader<'a> {
    buffer: &'a [u8],
    big_endian: bool,
}

#[derive(Debug, Clone, Copy)]
struct IfdEntry {
    tag: u16,
    kind: u16,
    count: u32,
    raw_value: [u8; 4],
}

impl<'a> TiffReader<'a> {
    fn read_u16(&self, offset: usize) -> Result<u16> {
        let bytes: [u8; 2] = self
            .buffer
            .get(offset..offset + 2)
            .ok_or_else(|| anyhow!("out-of-range u16 read at {offset}"))?
            .try_into()?;
        Ok(if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    fn read_u32(&self, offset: usize) -> Result<u32> {
        let bytes: [u8; 4] = self
            .buffer
            .get(offset..offset + 4)
            .ok_or_else(|| anyhow!("out-of-range u32 read at {offset}"))?
            .try_into()?;
        Ok(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    fn read_f64(&self, offset: usize) -> Result<f64> {
        let bytes: [u8; 8] = self
            .buffer
            .get(offset..offset + 8)
            .ok_or_else(|| anyhow!("out-of-range f64 read at {offset}"))?
            .try_into()?;
        Ok(if self.big_endian {
            f64::from_be_bytes(bytes)
        } else {
            f64::from_le_bytes(bytes)
        })
    }

    fn value_from_raw(&self, raw: [u8; 4], kind: u16) -> u32 {
        match kind {
            TYPE_SHORT => {
                let bytes: [u8; 2] = [raw[0], raw[1]];
                if self.big_endian {
                    u16::from_be_bytes(bytes) as u32
                } else {
                    u16::from_le_bytes(bytes) as u32
                }
            }
            _ => {
                if self.big_endian {
                    u32::from_be_bytes(raw)
                } else {
                    u32::from_le_bytes(raw)
                }
            }
        }
    }

    /// Integer values of a SHORT/LONG entry, inline or external.
    fn integers(&self, entry: &IfdEntry) -> Result<Vec<u32>> {
        let size = match entry.kind {
            TYPE_SHORT => 2usize,
            TYPE_LONG => 4,
            other => bail!("unsupported integer tag type {other}"),
        };
        let total = size * entry.count as usize;
        if total <= 4 {
            let mut out = Vec::with_capacity(entry.count as usize);
            for i in 0..entry.count as usize {
                let chunk = [entry.raw_value[i * size], entry.raw_value.get(i * size + 1).copied().unwrap_or(0)];
                out.push(match entry.kind {
                    TYPE_SHORT => {
                        if self.big_endian {
                            u16::from_be_bytes(chunk) as u32
                        } else {
                            u16::from_le_bytes(chunk) as u32
                        }
                    }
                    _ => self.value_from_raw(entry.raw_value, TYPE_LONG),
                });
            }
            return Ok(out);
        }
        let offset = self.value_from_raw(entry.raw_value, TYPE_LONG) as usize;
        let mut out = Vec::with_capacity(entry.count as usize);
        for i in 0..entry.count as usize {
            out.push(match entry.kind {
                TYPE_SHORT => self.read_u16(offset + i * 2)? as u32,
                _ => self.read_u32(offset + i * 4)?,
            });
        }
        Ok(out)
    }

    fn doubles(&self, entry: &IfdEntry) -> Result<Vec<f64>> {
        if entry.kind != TYPE_DOUBLE {
            bail!("expected DOUBLE tag, got type {}", entry.kind);
        }
        let offset = self.value_from_raw(entry.raw_value, TYPE_LONG) as usize;
        let mut out = Vec::with_capacity(entry.count as usize);
        for i in 0..entry.count as usize {
            out.push(self.read_f64(offset + i * 8)?);
        }
        Ok(out)
    }
}

/// Decode a single-band GeoTIFF into a raster.
pub fn decode_geotiff(buffer: &[u8]) -> Result<Raster> {
    if buffer.len() < 8 {
        bail!("TIFF payload is too small");
    }
    let big_endian = match &buffer[0..2] {
        b"II" => false,
        b"MM" => true,
        _ => bail!("payload does not start with a TIFF byte-order mark"),
    };
    let reader = TiffReader { buffer, big_endian };
    if reader.read_u16(2)? != 42 {
        bail!("not a classic TIFF file");
    }

    let ifd_offset = reader.read_u32(4)? as usize;
    let entry_count = reader.read_u16(ifd_offset)? as usize;
    let mut entries = Vec::with_capacity(entry_count);
    for i in 0..entry_count {
        let base = ifd_offset + 2 + i * 12;
        let raw_value: [u8; 4] = buffer
            .get(base + 8..base + 12)
            .ok_or_else(|| anyhow!("truncated IFD entry"))?
            .try_into()?;
        entries.push(IfdEntry {
            tag: reader.read_u16(base)?,
            kind: reader.read_u16(base + 2)?,
            count: reader.read_u32(base + 4)?,
            raw_value,
        });
    }
    let find = |tag: u16| entries.iter().find(|e| e.tag == tag);

    let width = reader.integers(find(TAG_IMAGE_WIDTH).ok_or_else(|| anyhow!("missing ImageWidth"))?)?[0] as usize;
    let height = reader.integers(find(TAG_IMAGE_LENGTH).ok_or_else(|| anyhow!("missing ImageLength"))?)?[0] as usize;
    let bits = find(TAG_BITS_PER_SAMPLE)
        .map(|e| reader.integers(e).map(|v| v[0]))
        .transpose()?
        .unwrap_or(32);
    if bits != 32 && bits != 64 {
        bail!("unsupported bits-per-sample {bits}");
    }
    if let Some(compression) = find(TAG_COMPRESSION) {
        let value = reader.integers(compression)?[0];
        if value != 1 {
            bail!("unsupported TIFF compression {value}");
        }
    }
    if let Some(samples) = find(TAG_SAMPLES_PER_PIXEL) {
        let value = reader.integers(samples)?[0];
        if value != 1 {
            bail!("expected a single-band raster, got {value} samples per pixel");
        }
    }
    if let Some(format) = find(TAG_SAMPLE_FORMAT) {
        let value = reader.integers(format)?[0];
        if value != 3 {
            bail!("expected IEEE float samples, got sample format {value}");
        }
    }

    let offsets = reader.integers(
        find(TAG_STRIP_OFFSETS).ok_or_else(|| anyhow!("missing StripOffsets"))?,
    )?;
    let sample_bytes = (bits / 8) as usize;
    let total_bytes = width * height * sample_bytes;
    let counts = match find(TAG_STRIP_BYTE_COUNTS) {
        Some(entry) => reader.integers(entry)?,
        None if offsets.len() == 1 => vec![total_bytes as u32],
        None => bail!("missing StripByteCounts"),
    };
    if offsets.len() != counts.len() {
        bail!("strip offsets/counts mismatch");
    }

    let mut data = Vec::with_capacity(total_bytes);
    for (offset, count) in offsets.iter().zip(counts.iter()) {
        let start = *offset as usize;
        let end = start + *count as usize;
        data.extend_from_slice(
            buffer
                .get(start..end)
                .ok_or_else(|| anyhow!("strip data out of range"))?,
        );
    }
    if data.len() < total_bytes {
        bail!("truncated raster data: {} of {} bytes", data.len(), total_bytes);
    }

    let mut values = Vec::with_capacity(width * height);
    for chunk in data[..total_bytes].chunks_exact(sample_bytes) {
        let value = if sample_bytes == 4 {
            let bytes: [u8; 4] = chunk.try_into()?;
            if big_endian {
                f32::from_be_bytes(bytes)
            } else {
                f32::from_le_bytes(bytes)
            }
        } else {
            let bytes: [u8; 8] = chunk.try_into()?;
            (if big_endian {
                f64::from_be_bytes(bytes)
            } else {
                f64::from_le_bytes(bytes)
            }) as f32
        };
        values.push(value);
    }

    let scale = reader.doubles(
        find(TAG_MODEL_PIXEL_SCALE).ok_or_else(|| anyhow!("missing ModelPixelScale"))?,
    )?;
    let tiepoint = reader.doubles(
        find(TAG_MODEL_TIEPOINT).ok_or_else(|| anyhow!("missing ModelTiepoint"))?,
    )?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        bail!("incomplete geo-referencing tags");
    }
    let res_x = scale[0].abs();
    let res_y = scale[1].abs();
    // Tiepoint maps raster (I, J) to model (X, Y).
    let west = tiepoint[3] - tiepoint[0] * res_x;
    let north = tiepoint[4] + tiepoint[1] * res_y;

    Ok(Raster {
        width,
        height,
        west,
        north,
        res_x,
        res_y,
        values,
    })
}

pub fn read_raster(path: &Path) -> Result<Raster> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    decode_geotiff(&bytes)
}

/// Write a raster atomically: encode to a sibling temp file, then rename.
/// Readers never observe a truncated GeoTIFF.
pub fn write_raster_atomic(path: &Path, raster: &Raster) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("invalid raster path {}", path.display()))?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp_path, encode_geotiff(raster))
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to publish {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raster() -> Raster {
        let spec = GridSpec::from_bbox(-119.0, 33.0, -118.0, 34.0, 0.25);
        let mut values = vec![f64::NAN; spec.len()];
        values[0] = 0.9;
        values[5] = 0.25;
        Raster::from_grid(&spec, &values)
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let raster = sample_raster();
        let decoded = decode_geotiff(&encode_geotiff(&raster)).unwrap();
        assert_eq!(decoded.width, raster.width);
        assert_eq!(decoded.height, raster.height);
        assert!((decoded.west - raster.west).abs() < 1e-9);
        assert!((decoded.north - raster.north).abs() < 1e-9);
        assert!((decoded.res_x - raster.res_x).abs() < 1e-9);
        assert_eq!(decoded.values.len(), raster.values.len());
        assert!((decoded.values[0] - 0.9).abs() < 1e-6);
        assert!(decoded.values[1].is_nan());
    }

    #[test]
    fn test_sample_at_cell_centers() {
        let raster = sample_raster();
        // Cell (0, 0) center.
        let lon = raster.west + raster.res_x / 2.0;
        let lat = raster.north - raster.res_y / 2.0;
        assert!((raster.sample(lon, lat).unwrap() - 0.9).abs() < 1e-6);
        // NaN cell reads as None, as does out-of-coverage.
        assert!(raster.sample(lon + raster.res_x, lat).is_none());
        assert!(raster.sample(0.0, 0.0).is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_geotiff(b"not a tiff").is_err());
        assert!(decode_geotiff(b"II").is_err());
    }

    #[test]
    fn test_atomic_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final_score_20260301_14.tif");
        let raster = sample_raster();
        write_raster_atomic(&path, &raster).unwrap();
        assert!(path.exists());
        assert!(!path.with_file_name("final_score_20260301_14.tif.tmp").exists());

        let reread = read_raster(&path).unwrap();
        assert_eq!(reread.values.len(), raster.values.len());
    }
}
