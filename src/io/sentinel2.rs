//! Sentinel-2 MSI product reader.
//!
//! A product is opened from one of its files:
//! - `MTD_*.xml` opens the whole product as a mosaic of all its tiles;
//! - `IMG_*.jp2` opens a single tile (granule), using its sibling band images.
//!
//! Either way the result is a [`Sentinel2Product`] whose bands expose a lazily
//! composed multi-level image.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::band::{BandInfo, L2A_QUALITY_LAYERS, WavebandInfo};
use crate::core::layout::SceneDescription;
use crate::core::mosaic::{MosaicComposer, MosaicCompositor};
use crate::core::multilevel::{MultiLevelSource, SingleTileComposer};
use crate::core::params::ReaderConfig;
use crate::core::raster::Raster;
use crate::error::{Error, Result};
use crate::io::decoder::{CacheDir, TileCodec, TileDecoder};
use crate::io::gdal::GdalCodec;
use crate::io::metadata::{ProductMetadata, SpectralInformation};
use crate::io::naming::{ImgFilename, MtdFilename, ProductStem};
use crate::types::{Envelope, PixelRect, SpatialResolution};

/// How the product was opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProductKind {
    Mosaic,
    SingleTile { tile_id: String },
}

/// Map geometry of a product: a north-up grid anchored at the upper-left
/// corner of the scene envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrsGeoCoding {
    pub crs_code: String,
    pub crs_name: String,
    /// Easting of the upper-left corner.
    pub easting: f64,
    /// Northing of the upper-left corner.
    pub northing: f64,
    /// Level-0 pixel size in metres.
    pub pixel_size: f64,
}

impl CrsGeoCoding {
    pub fn from_envelope(envelope: &Envelope, crs_code: &str, crs_name: &str) -> Self {
        Self {
            crs_code: crs_code.to_string(),
            crs_name: crs_name.to_string(),
            easting: envelope.min_x,
            northing: envelope.max_y(),
            pixel_size: SpatialResolution::REFERENCE.meters() as f64,
        }
    }

    pub fn pixel_size_at(&self, level: usize) -> f64 {
        self.pixel_size * (1u64 << level.min(63)) as f64
    }

    /// GDAL geotransform of the image at `level`.
    pub fn geotransform(&self, level: usize) -> [f64; 6] {
        let size = self.pixel_size_at(level);
        [self.easting, size, 0.0, self.northing, 0.0, -size]
    }

    /// Map coordinates of the upper-left corner of pixel `(x, y)` at `level`.
    pub fn pixel_to_map(&self, x: f64, y: f64, level: usize) -> (f64, f64) {
        let size = self.pixel_size_at(level);
        (self.easting + x * size, self.northing - y * size)
    }
}

/// One band of an opened product
pub struct ProductBand {
    pub info: Arc<BandInfo>,
    pub source: MultiLevelSource,
}

impl ProductBand {
    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn num_resolutions(&self) -> usize {
        self.source.num_resolutions()
    }

    pub fn image_at(&self, level: usize) -> Result<Option<Arc<Raster>>> {
        self.source.image_at(level)
    }

    pub fn read_region(&self, level: usize, rect: PixelRect) -> Result<Option<Raster>> {
        self.source.read_region(level, rect)
    }
}

/// An opened Sentinel-2 product
pub struct Sentinel2Product {
    pub name: String,
    pub product_type: String,
    pub kind: ProductKind,
    pub path: PathBuf,
    pub spacecraft: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub stop_time: Option<NaiveDateTime>,
    pub width: usize,
    pub height: usize,
    pub geocoding: Option<CrsGeoCoding>,
    /// Value of pixels no tile covers
    pub fill_value: u16,
    pub cache_dir: PathBuf,
    scene: Option<Arc<SceneDescription>>,
    bands: Vec<ProductBand>,
}

impl Sentinel2Product {
    pub fn scene(&self) -> Option<&Arc<SceneDescription>> {
        self.scene.as_ref()
    }

    pub fn scene_rectangle(&self) -> PixelRect {
        PixelRect::new(0, 0, self.width, self.height)
    }

    /// Projected bounding box, when the product is geo-referenced.
    pub fn scene_envelope(&self) -> Option<Envelope> {
        match &self.scene {
            Some(scene) => Some(scene.scene_envelope()),
            None => self.geocoding.as_ref().map(|g| {
                Envelope::new(
                    g.easting,
                    g.northing - self.height as f64 * g.pixel_size,
                    self.width as f64 * g.pixel_size,
                    self.height as f64 * g.pixel_size,
                )
            }),
        }
    }

    pub fn tile_count(&self) -> usize {
        self.scene.as_ref().map_or(1, |s| s.tile_count())
    }

    pub fn tile_rectangle(&self, index: usize) -> Result<PixelRect> {
        self.tile_rectangle_at_level(index, 0)
    }

    pub fn tile_rectangle_at_level(&self, index: usize, level: usize) -> Result<PixelRect> {
        match &self.scene {
            Some(scene) => Ok(scene.tile_rectangle_at_level(index, level)?),
            None if index == 0 => Ok(self.scene_rectangle().shifted(level)),
            None => Err(crate::core::geometry::GeometryError::TileIndexOutOfRange {
                index,
                count: 1,
            }
            .into()),
        }
    }

    pub fn tile_envelope(&self, index: usize) -> Result<Envelope> {
        match &self.scene {
            Some(scene) => Ok(scene.tile_envelope(index)?),
            None => {
                self.tile_rectangle(index)?;
                self.scene_envelope().ok_or_else(|| {
                    Error::External("single-tile product has no geocoding".to_string())
                })
            }
        }
    }

    pub fn tile_grid_width(&self) -> usize {
        self.scene.as_ref().map_or(1, |s| s.tile_grid_width())
    }

    pub fn tile_grid_height(&self) -> usize {
        self.scene.as_ref().map_or(1, |s| s.tile_grid_height())
    }

    pub fn bands(&self) -> &[ProductBand] {
        &self.bands
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name()).collect()
    }

    pub fn band(&self, name: &str) -> Result<&ProductBand> {
        self.bands
            .iter()
            .find(|b| b.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownBand(name.to_string()))
    }

    pub fn num_resolutions(&self) -> usize {
        self.bands
            .iter()
            .map(|b| b.num_resolutions())
            .max()
            .unwrap_or(0)
    }

    /// Requests cancellation of every in-flight composite.
    pub fn cancel(&self) {
        self.bands.iter().for_each(|b| b.source.cancel_flag().cancel());
    }

    /// Drops every cached level raster of every band.
    pub fn release(&self) {
        self.bands.iter().for_each(|b| b.source.release());
    }
}

/// Entry point for opening products
pub struct Sentinel2Reader;

impl Sentinel2Reader {
    /// Opens a product decoding tiles through GDAL.
    pub fn open<P: AsRef<Path>>(path: P, config: &ReaderConfig) -> Result<Sentinel2Product> {
        Self::open_with_codec(path, config, Arc::new(GdalCodec::new()))
    }

    /// Opens a product decoding tiles through `codec`.
    pub fn open_with_codec<P: AsRef<Path>>(
        path: P,
        config: &ReaderConfig,
        codec: Arc<dyn TileCodec>,
    ) -> Result<Sentinel2Product> {
        let path = path.as_ref();
        std::fs::metadata(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::UnsupportedProductFile(path.to_path_buf()))?;

        if let Some(mtd) = MtdFilename::parse(file_name) {
            info!("Opening mosaic product from {:?}", path);
            Self::open_mosaic(path, &mtd, config, codec)
        } else if let Some(img) = ImgFilename::parse(file_name) {
            info!("Opening single-tile product from {:?}", path);
            Self::open_single_tile(path, &img, config, codec)
        } else {
            Err(Error::UnsupportedProductFile(path.to_path_buf()))
        }
    }

    fn open_mosaic(
        path: &Path,
        mtd: &MtdFilename,
        config: &ReaderConfig,
        codec: Arc<dyn TileCodec>,
    ) -> Result<Sentinel2Product> {
        let meta = ProductMetadata::parse_file(path)?;
        let product_dir = product_dir(path);

        let mut tiles = meta.tiles.clone();
        if let Some(epsg) = &config.epsg_filter {
            let before = tiles.len();
            tiles.retain(|t| t.horizontal_cs_code.eq_ignore_ascii_case(epsg));
            info!("CRS filter {} kept {}/{} tile(s)", epsg, tiles.len(), before);
        }
        let scene = Arc::new(SceneDescription::new(tiles)?);
        let cache = CacheDir::provision(&config.product_cache_dir(&product_dir))?;
        let decoder = TileDecoder::new(codec, cache.clone());
        let compositor = Arc::new(
            MosaicCompositor::new(scene.clone(), decoder)
                .with_fill_value(config.fill_value)
                .with_parallel(config.parallel_decode),
        );

        let band_count = meta.product_characteristics.band_informations.len();
        let mut wavebands = Vec::new();
        for spectral in &meta.product_characteristics.band_informations {
            if spectral.band_id >= band_count {
                warn!(
                    "Illegal band id {} for band {}, skipping",
                    spectral.band_id, spectral.physical_band
                );
                continue;
            }
            wavebands.extend(waveband_from_header(spectral, &meta));
        }
        if meta.is_level_2a() {
            wavebands.extend(
                (0..L2A_QUALITY_LAYERS.len())
                    .filter_map(|layer| quality_waveband(&meta, layer, band_count + layer)),
            );
        }

        let mut bands = Vec::new();
        for waveband in wavebands {
            let mut tile_files = BTreeMap::new();
            for tile in scene.tiles() {
                let file = product_dir.join(mtd.img_filename(waveband.band_id, &tile.id));
                if file.is_file() {
                    tile_files.insert(tile.id.clone(), file);
                } else {
                    warn!("Missing tile image {:?}", file);
                }
            }
            if tile_files.is_empty() {
                warn!("No image files found for band {}, skipping", waveband.name);
                continue;
            }

            debug!(
                "Band {} ({}) has {} tile file(s)",
                waveband.name,
                waveband.resolution,
                tile_files.len()
            );
            let info = Arc::new(BandInfo::new(waveband, tile_files));
            let composer = MosaicComposer::new(compositor.clone(), info.clone());
            let source = MultiLevelSource::new(Box::new(composer), info.layout.num_resolutions);
            bands.push(ProductBand { info, source });
        }
        if bands.is_empty() {
            return Err(Error::NoValidBands(path.to_path_buf()));
        }
        bands.sort_by_key(|b| b.info.band_index);

        let rect = scene.scene_rectangle();
        let geocoding =
            CrsGeoCoding::from_envelope(&scene.scene_envelope(), scene.crs_code(), scene.crs_name());
        let (start_time, stop_time) = product_times(&mtd.stem);
        let spacecraft = Some(meta.product_characteristics.spacecraft.clone()).filter(|s| !s.is_empty());

        info!(
            "Opened mosaic {} ({} tile(s), {} band(s), {}x{} px)",
            mtd.product_name(),
            scene.tile_count(),
            bands.len(),
            rect.width,
            rect.height
        );
        Ok(Sentinel2Product {
            name: mtd.product_name(),
            product_type: format!("S2_MSI_{}", mtd.processing_level()),
            kind: ProductKind::Mosaic,
            path: path.to_path_buf(),
            spacecraft,
            start_time,
            stop_time,
            width: rect.width,
            height: rect.height,
            geocoding: Some(geocoding),
            fill_value: config.fill_value,
            cache_dir: cache.path().to_path_buf(),
            scene: Some(scene),
            bands,
        })
    }

    fn open_single_tile(
        path: &Path,
        img: &ImgFilename,
        config: &ReaderConfig,
        codec: Arc<dyn TileCodec>,
    ) -> Result<Sentinel2Product> {
        let product_dir = product_dir(path);
        let cache = CacheDir::provision(&config.product_cache_dir(&product_dir))?;
        let decoder = TileDecoder::new(codec, cache.clone());

        let mut entries: Vec<PathBuf> = std::fs::read_dir(&product_dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        entries.sort();
        let file_name = |p: &Path| p.file_name().and_then(|n| n.to_str()).map(str::to_string);

        let header = match entries
            .iter()
            .find(|p| file_name(p).is_some_and(|n| MtdFilename::is_metadata_filename(&n)))
        {
            Some(mtd_path) => match ProductMetadata::parse_file(mtd_path) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    warn!("Failed to parse metadata file {:?}: {}", mtd_path, e);
                    None
                }
            },
            None => {
                warn!("No metadata file found in {:?}", product_dir);
                None
            }
        };

        let layout = SpatialResolution::REFERENCE.tile_layout();
        let mut band_map: BTreeMap<usize, ProductBand> = BTreeMap::new();
        for entry in &entries {
            let Some(sibling) = file_name(entry).and_then(|n| ImgFilename::parse(&n)) else {
                continue;
            };
            if !img.is_sibling(&sibling) {
                continue;
            }
            let band_index = sibling.band_index;
            let waveband = match &header {
                Some(meta) => header_waveband(meta, band_index),
                None => WavebandInfo::default_for(band_index),
            };
            let Some(waveband) = waveband else {
                warn!("Band index {} of {:?} is not valid, skipping", band_index, entry);
                continue;
            };

            let tile_files = BTreeMap::from([(img.tile_id.clone(), entry.clone())]);
            let info = Arc::new(BandInfo::new(waveband, tile_files));
            let composer = SingleTileComposer::new(
                decoder.clone(),
                info.clone(),
                img.tile_id.clone(),
                entry.clone(),
                layout.width,
                layout.height,
            );
            let source = MultiLevelSource::new(Box::new(composer), info.layout.num_resolutions);
            band_map.insert(band_index, ProductBand { info, source });
        }
        if band_map.is_empty() {
            return Err(Error::NoValidBands(path.to_path_buf()));
        }

        let geocoding = header.as_ref().and_then(|meta| {
            let Some(tile) = meta.tile(&img.tile_id) else {
                warn!("Tile {} not described in metadata header", img.tile_id);
                return None;
            };
            match tile.envelope(SpatialResolution::REFERENCE) {
                Ok(envelope) => Some(CrsGeoCoding::from_envelope(
                    &envelope,
                    &tile.horizontal_cs_code,
                    &tile.horizontal_cs_name,
                )),
                Err(e) => {
                    warn!("No geocoding for tile {}: {}", img.tile_id, e);
                    None
                }
            }
        });
        let spacecraft = header
            .as_ref()
            .map(|m| m.product_characteristics.spacecraft.clone())
            .filter(|s| !s.is_empty());

        let product_type = format!("S2_MSI_{}", img.processing_level());
        let name = format!("{}_{}_{}", product_type, img.stem.orbit, img.tile_id);
        let (start_time, stop_time) = product_times(&img.stem);
        let bands: Vec<ProductBand> = band_map.into_values().collect();
        info!(
            "Opened tile product {} ({} band(s), {}x{} px)",
            name,
            bands.len(),
            layout.width,
            layout.height
        );
        Ok(Sentinel2Product {
            name,
            product_type,
            kind: ProductKind::SingleTile {
                tile_id: img.tile_id.clone(),
            },
            path: path.to_path_buf(),
            spacecraft,
            start_time,
            stop_time,
            width: layout.width,
            height: layout.height,
            geocoding,
            fill_value: config.fill_value,
            cache_dir: cache.path().to_path_buf(),
            scene: None,
            bands,
        })
    }
}

fn product_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn product_times(stem: &ProductStem) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    let start = stem.start_time();
    if start.is_none() {
        warn!("Unparsable start time {}", stem.start);
    }
    let stop = stem.stop_time();
    if stop.is_none() {
        warn!("Unparsable stop time {}", stem.stop);
    }
    (start, stop)
}

/// Waveband of image band `band_index` of a product described by `meta`:
/// a spectral entry, or for Level-2A a quality layer past the spectral ones.
fn header_waveband(meta: &ProductMetadata, band_index: usize) -> Option<WavebandInfo> {
    let band_count = meta.product_characteristics.band_informations.len();
    if band_index < band_count {
        meta.band_information(band_index)
            .and_then(|spectral| waveband_from_header(spectral, meta))
    } else if meta.is_level_2a() {
        quality_waveband(meta, band_index - band_count, band_index)
    } else {
        None
    }
}

fn quality_waveband(meta: &ProductMetadata, layer: usize, band_id: usize) -> Option<WavebandInfo> {
    WavebandInfo::l2a_quality(
        layer,
        band_id,
        meta.resample_data.aot_quantification_value,
        meta.resample_data.wvp_quantification_value,
    )
}

/// Waveband description from a header band entry; `None` (with a warning) when
/// the entry's resolution is not 10, 20 or 60 m.
fn waveband_from_header(spectral: &SpectralInformation, meta: &ProductMetadata) -> Option<WavebandInfo> {
    let Some(resolution) = SpatialResolution::from_meters(spectral.resolution) else {
        warn!(
            "Band {} has unsupported resolution {} m, skipping",
            spectral.physical_band, spectral.resolution
        );
        return None;
    };
    let solar_irradiance = meta
        .solar_irradiance(spectral.band_id)
        .filter(|v| !v.is_nan())
        .or_else(|| WavebandInfo::default_for(spectral.band_id).map(|w| w.solar_irradiance))
        .unwrap_or(0.0);
    Some(WavebandInfo {
        band_id: spectral.band_id,
        name: spectral.physical_band.clone(),
        resolution,
        wavelength: spectral.wavelength_central,
        bandwidth: spectral.wavelength_max - spectral.wavelength_min,
        solar_irradiance,
        quantification_value: meta.resample_data.quantification_value,
    })
}
