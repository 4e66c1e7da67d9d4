//! Per-band metadata: spectral description plus the tile files that make up
//! the band in a given product.
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::types::{SpatialResolution, TileLayout};

/// Spectral description of one MSI band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WavebandInfo {
    pub band_id: usize,
    pub name: String,
    pub resolution: SpatialResolution,
    /// Central wavelength in nm.
    pub wavelength: f64,
    /// Bandwidth in nm.
    pub bandwidth: f64,
    pub solar_irradiance: f64,
    pub quantification_value: f64,
}

/// Fallback waveband table used when an image file has no metadata header.
/// (name, resolution m, central wavelength nm, bandwidth nm, solar irradiance)
pub const DEFAULT_WAVEBANDS: [(&str, u32, f64, f64, f64); 13] = [
    ("B1", 60, 443.0, 20.0, 1913.57),
    ("B2", 10, 490.0, 65.0, 1941.63),
    ("B3", 10, 560.0, 35.0, 1822.61),
    ("B4", 10, 665.0, 30.0, 1512.79),
    ("B5", 20, 705.0, 15.0, 1425.56),
    ("B6", 20, 740.0, 15.0, 1288.32),
    ("B7", 20, 783.0, 20.0, 1163.19),
    ("B8", 10, 842.0, 115.0, 1036.39),
    ("B8A", 20, 865.0, 20.0, 955.19),
    ("B9", 60, 945.0, 20.0, 813.04),
    ("B10", 60, 1375.0, 30.0, 367.15),
    ("B11", 20, 1610.0, 90.0, 245.59),
    ("B12", 20, 2190.0, 180.0, 85.25),
];

pub const DEFAULT_QUANTIFICATION_VALUE: f64 = 10000.0;

/// Level-2A quality layers, stored under the band indices that follow the
/// header's spectral entries, in this order.
/// (name, resolution m)
pub const L2A_QUALITY_LAYERS: [(&str, u32); 3] = [("AOT", 10), ("WVP", 10), ("SCL", 20)];

/// Scale of the AOT and WVP layers when the header does not give one.
pub const DEFAULT_L2A_QUALITY_QUANTIFICATION_VALUE: f64 = 1000.0;

impl WavebandInfo {
    /// Entry of the built-in table, `None` when `band_id` is outside it.
    pub fn default_for(band_id: usize) -> Option<Self> {
        let (name, meters, wavelength, bandwidth, irradiance) = DEFAULT_WAVEBANDS.get(band_id)?;
        Some(Self {
            band_id,
            name: (*name).to_string(),
            resolution: SpatialResolution::from_meters(*meters)?,
            wavelength: *wavelength,
            bandwidth: *bandwidth,
            solar_irradiance: *irradiance,
            quantification_value: DEFAULT_QUANTIFICATION_VALUE,
        })
    }

    /// Quality layer `layer` of [`L2A_QUALITY_LAYERS`] stored as band
    /// `band_id`. The scene classification holds class codes and is unscaled.
    pub fn l2a_quality(
        layer: usize,
        band_id: usize,
        aot_quantification: Option<f64>,
        wvp_quantification: Option<f64>,
    ) -> Option<Self> {
        let (name, meters) = L2A_QUALITY_LAYERS.get(layer)?;
        let quantification_value = match *name {
            "AOT" => aot_quantification.unwrap_or(DEFAULT_L2A_QUALITY_QUANTIFICATION_VALUE),
            "WVP" => wvp_quantification.unwrap_or(DEFAULT_L2A_QUALITY_QUANTIFICATION_VALUE),
            _ => 1.0,
        };
        Some(Self {
            band_id,
            name: (*name).to_string(),
            resolution: SpatialResolution::from_meters(*meters)?,
            wavelength: 0.0,
            bandwidth: 0.0,
            solar_irradiance: 0.0,
            quantification_value,
        })
    }
}

/// Everything needed to assemble one band of a product.
#[derive(Debug, Clone)]
pub struct BandInfo {
    pub band_index: usize,
    pub waveband: WavebandInfo,
    /// tile id -> image file. Only files that exist on disk are recorded.
    pub tile_files: BTreeMap<String, PathBuf>,
    pub layout: TileLayout,
}

impl BandInfo {
    pub fn new(waveband: WavebandInfo, tile_files: BTreeMap<String, PathBuf>) -> Self {
        let layout = waveband.resolution.tile_layout();
        Self {
            band_index: waveband.band_id,
            waveband,
            tile_files,
            layout,
        }
    }

    pub fn name(&self) -> &str {
        &self.waveband.name
    }

    pub fn resolution(&self) -> SpatialResolution {
        self.waveband.resolution
    }

    pub fn tile_file(&self, tile_id: &str) -> Option<&PathBuf> {
        self.tile_files.get(tile_id)
    }
}
