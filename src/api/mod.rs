//! High-level, ergonomic library API: open products, export one band at one
//! level to GeoTIFF or JPEG, summarise a product as JSON, and batch over a
//! directory of products. Prefer these entrypoints over the low-level reader
//! and compositor when integrating the crate.
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::core::params::{ExportParams, ReaderConfig};
use crate::core::stretch::stretch_to_u8;
use crate::error::{Error, Result};
use crate::io::naming::MtdFilename;
use crate::io::sentinel2::{ProductBand, ProductKind, Sentinel2Product, Sentinel2Reader};
use crate::io::writers::jpeg::write_gray_jpeg;
use crate::io::writers::metadata::{
    ExportMetadata, create_metadata_sidecar, crs_to_wkt, embed_tiff_metadata,
};
use crate::io::writers::tiff::write_tiff_u16;
use crate::io::writers::worldfile::{write_prj_file, write_world_file};
use crate::types::{Envelope, OutputFormat, PixelRect};

/// Open a product from its `MTD_*.xml` or `IMG_*.jp2` file
pub fn open_product(input: &Path, config: &ReaderConfig) -> Result<Sentinel2Product> {
    Sentinel2Reader::open(input, config)
}

fn export_metadata(product: &Sentinel2Product, band: &ProductBand, level: usize) -> ExportMetadata {
    let waveband = &band.info.waveband;
    let geocoding = product.geocoding.as_ref();
    ExportMetadata {
        product_name: product.name.clone(),
        product_type: product.product_type.clone(),
        spacecraft: product.spacecraft.clone(),
        start_time: product.start_time.map(|t| t.to_string()),
        stop_time: product.stop_time.map(|t| t.to_string()),
        band_name: waveband.name.clone(),
        band_index: band.info.band_index,
        native_resolution: waveband.resolution.meters(),
        wavelength: waveband.wavelength,
        bandwidth: waveband.bandwidth,
        solar_irradiance: waveband.solar_irradiance,
        quantification_value: waveband.quantification_value,
        level,
        pixel_size: geocoding.map_or(0.0, |g| g.pixel_size_at(level)),
        tile_count: product.tile_count(),
        fill_value: product.fill_value,
        geotransform: geocoding.map(|g| g.geotransform(level)),
        crs: geocoding.map(|g| g.crs_code.clone()),
        crs_name: geocoding.map(|g| g.crs_name.clone()),
    }
}

/// Write band `params.band` at `params.level` of `product` to `output`.
///
/// TIFF output is u16 with georeferencing and band metadata embedded; JPEG
/// output is an 8-bit 2-98 % stretch with world file, `.prj` and JSON sidecar.
pub fn export_band_level(
    product: &Sentinel2Product,
    params: &ExportParams,
    output: &Path,
) -> Result<()> {
    let band = product.band(&params.band)?;
    let image = band
        .image_at(params.level)?
        .ok_or_else(|| Error::EmptyMosaic {
            band: band.name().to_string(),
            level: params.level,
        })?;
    let meta = export_metadata(product, band, params.level);
    let (cols, rows) = (image.width(), image.height());

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match params.format {
        OutputFormat::TIFF => {
            let mut ds = write_tiff_u16(output, image.data().view(), Some(product.fill_value))
                .map_err(Error::external)?;
            embed_tiff_metadata(&mut ds, &meta).map_err(Error::external)?;
        }
        OutputFormat::JPEG => {
            let stretched = stretch_to_u8(image.data(), product.fill_value);
            write_gray_jpeg(output, stretched.view()).map_err(Error::external)?;
            if let Some(gt) = meta.geotransform {
                write_world_file(output, gt).map_err(Error::external)?;
            }
            if let Some(crs) = meta.crs.as_deref() {
                let wkt = crs_to_wkt(crs).unwrap_or_else(|e| {
                    warn!("Writing {} verbatim to .prj: {}", crs, e);
                    crs.to_string()
                });
                write_prj_file(output, &wkt).map_err(Error::external)?;
            }
            create_metadata_sidecar(output, &meta).map_err(Error::external)?;
        }
    }
    info!(
        "Exported {} band {} level {} ({}x{}) to {:?}",
        product.name,
        band.name(),
        params.level,
        cols,
        rows,
        output
    );
    Ok(())
}

/// Default export file name: `<product>_<band>_L<level>.<ext>`
pub fn export_file_name(product: &Sentinel2Product, params: &ExportParams) -> String {
    format!(
        "{}_{}_L{}.{}",
        product.name,
        params.band,
        params.level,
        params.format.extension()
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct TileSummary {
    pub index: usize,
    pub id: String,
    pub rectangle: PixelRect,
    pub envelope: Envelope,
}

#[derive(Debug, Clone, Serialize)]
pub struct BandSummary {
    pub index: usize,
    pub name: String,
    pub resolution: u32,
    pub wavelength: f64,
    pub bandwidth: f64,
    pub solar_irradiance: f64,
    pub quantification_value: f64,
    pub tile_files: usize,
    pub num_resolutions: usize,
}

/// Serializable overview of an opened product
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub name: String,
    pub product_type: String,
    pub kind: ProductKind,
    pub spacecraft: Option<String>,
    pub start_time: Option<String>,
    pub stop_time: Option<String>,
    pub width: usize,
    pub height: usize,
    pub num_resolutions: usize,
    pub crs: Option<String>,
    pub crs_name: Option<String>,
    pub envelope: Option<Envelope>,
    pub geotransform: Option<[f64; 6]>,
    pub tile_count: usize,
    pub tile_grid: (usize, usize),
    pub tiles: Vec<TileSummary>,
    pub bands: Vec<BandSummary>,
}

impl ProductSummary {
    pub fn from_product(product: &Sentinel2Product) -> Self {
        let tiles = match product.scene() {
            Some(scene) => scene
                .tiles()
                .iter()
                .enumerate()
                .filter_map(|(index, tile)| {
                    Some(TileSummary {
                        index,
                        id: tile.id.clone(),
                        rectangle: scene.tile_rectangle(index).ok()?,
                        envelope: scene.tile_envelope(index).ok()?,
                    })
                })
                .collect(),
            None => match (&product.kind, product.scene_envelope()) {
                (ProductKind::SingleTile { tile_id }, Some(envelope)) => vec![TileSummary {
                    index: 0,
                    id: tile_id.clone(),
                    rectangle: product.scene_rectangle(),
                    envelope,
                }],
                _ => Vec::new(),
            },
        };
        let bands = product
            .bands()
            .iter()
            .map(|b| {
                let w = &b.info.waveband;
                BandSummary {
                    index: b.info.band_index,
                    name: w.name.clone(),
                    resolution: w.resolution.meters(),
                    wavelength: w.wavelength,
                    bandwidth: w.bandwidth,
                    solar_irradiance: w.solar_irradiance,
                    quantification_value: w.quantification_value,
                    tile_files: b.info.tile_files.len(),
                    num_resolutions: b.num_resolutions(),
                }
            })
            .collect();
        let geocoding = product.geocoding.as_ref();
        Self {
            name: product.name.clone(),
            product_type: product.product_type.clone(),
            kind: product.kind.clone(),
            spacecraft: product.spacecraft.clone(),
            start_time: product.start_time.map(|t| t.to_string()),
            stop_time: product.stop_time.map(|t| t.to_string()),
            width: product.width,
            height: product.height,
            num_resolutions: product.num_resolutions(),
            crs: geocoding.map(|g| g.crs_code.clone()),
            crs_name: geocoding.map(|g| g.crs_name.clone()),
            envelope: product.scene_envelope(),
            geotransform: geocoding.map(|g| g.geotransform(0)),
            tile_count: product.tile_count(),
            tile_grid: (product.tile_grid_width(), product.tile_grid_height()),
            tiles,
            bands,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::external)
    }
}

/// Batch processing report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// First `MTD_*.xml` file directly inside `dir`, by name order
pub fn find_metadata_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_mtd = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(MtdFilename::is_metadata_filename);
        if is_mtd && path.is_file() {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Immediate subdirectories of `input_dir` (candidate products), sorted
pub fn iterate_product_dirs(input_dir: &Path) -> Result<std::vec::IntoIter<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(input_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs.into_iter())
}

/// Export `params` from every product folder in `input_dir` into `output_dir`.
/// Folders without a metadata file are skipped. If `continue_on_error` is true,
/// errors are counted in the report and processing continues; otherwise, the
/// first error is returned.
pub fn process_directory_to_path(
    input_dir: &Path,
    output_dir: &Path,
    config: &ReaderConfig,
    params: &ExportParams,
    continue_on_error: bool,
) -> Result<BatchReport> {
    std::fs::create_dir_all(output_dir)?;

    let mut report = BatchReport::default();
    for dir in iterate_product_dirs(input_dir)? {
        let Some(mtd) = find_metadata_file(&dir)? else {
            info!("Skipping {:?}: no metadata file", dir);
            report.skipped += 1;
            continue;
        };

        let result = open_product(&mtd, config).and_then(|product| {
            let output = output_dir.join(export_file_name(&product, params));
            export_band_level(&product, params, &output)
        });
        match result {
            Ok(()) => report.processed += 1,
            Err(e) => {
                warn!("Failed to process {:?}: {}", dir, e);
                report.errors += 1;
                if !continue_on_error {
                    return Err(e);
                }
            }
        }
    }

    info!(
        "Batch finished: {} processed, {} skipped, {} errors",
        report.processed, report.skipped, report.errors
    );
    Ok(report)
}
