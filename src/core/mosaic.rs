//! Mosaic compositor: merges the decoded tiles of one band into a single
//! overview-level raster.
//!
//! Tiles are decoded independently (on the rayon pool when enabled) and then
//! overlaid strictly in tile list order, so where tiles overlap the one with
//! the highest index wins no matter which decode finished first. Pixels no
//! tile covers keep [`FILL_CODE_MOSAIC_BG`] (or the configured fill value).
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::core::band::BandInfo;
use crate::core::cancel::CancelFlag;
use crate::core::layout::SceneDescription;
use crate::core::multilevel::ImageComposer;
use crate::core::raster::Raster;
use crate::error::{Error, Result};
use crate::io::decoder::TileDecoder;
use crate::types::PixelRect;

/// Value of mosaic pixels not covered by any decoded tile.
pub const FILL_CODE_MOSAIC_BG: u16 = 0;

struct TileJob<'a> {
    index: usize,
    tile_id: &'a str,
    path: &'a Path,
    placement: PixelRect,
    window: PixelRect,
}

/// Shared per-product compositing engine.
pub struct MosaicCompositor {
    scene: Arc<SceneDescription>,
    decoder: TileDecoder,
    fill_value: u16,
    parallel: bool,
}

impl MosaicCompositor {
    pub fn new(scene: Arc<SceneDescription>, decoder: TileDecoder) -> Self {
        Self {
            scene,
            decoder,
            fill_value: FILL_CODE_MOSAIC_BG,
            parallel: true,
        }
    }

    pub fn with_fill_value(mut self, fill_value: u16) -> Self {
        self.fill_value = fill_value;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn scene(&self) -> &Arc<SceneDescription> {
        &self.scene
    }

    /// The whole scene of `band` at `level`.
    pub fn composite(&self, band: &BandInfo, level: usize, cancel: &CancelFlag) -> Result<Raster> {
        let rect = self.scene.scene_rectangle_at_level(level);
        self.composite_region(band, level, rect, cancel)
    }

    /// The part `region` (mosaic coordinates at `level`) of `band`. Only tiles
    /// intersecting `region` are decoded, and only over the intersection.
    ///
    /// Fails with `EmptyMosaic` when tiles should have contributed but none
    /// decoded. A region no tile touches is returned as pure fill.
    pub fn composite_region(
        &self,
        band: &BandInfo,
        level: usize,
        region: PixelRect,
        cancel: &CancelFlag,
    ) -> Result<Raster> {
        let started = Instant::now();
        let full_scene = region == self.scene.scene_rectangle_at_level(level);

        let mut jobs = Vec::new();
        for (index, tile) in self.scene.tiles().iter().enumerate() {
            let Some(path) = band.tile_file(&tile.id) else {
                continue;
            };
            let placement = self.scene.tile_rectangle_at_level(index, level)?;
            if let Some(window) = placement.intersection(&region) {
                jobs.push(TileJob {
                    index,
                    tile_id: &tile.id,
                    path,
                    placement,
                    window,
                });
            }
        }
        debug!(
            "Band {} level {}: {} tile(s) intersect {}",
            band.name(),
            level,
            jobs.len(),
            region
        );

        let decode = |job: &TileJob<'_>| -> Result<Raster> {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.decoder.decode_region(
                job.tile_id,
                job.path,
                band.resolution(),
                level,
                job.placement,
                job.window,
            )
        };
        // Indexed collect keeps job order, which is tile list order.
        let decoded: Vec<Result<Raster>> = if self.parallel {
            jobs.par_iter().map(decode).collect()
        } else {
            jobs.iter().map(decode).collect()
        };

        let mut canvas = Raster::filled(region, self.fill_value);
        let mut merged = 0usize;
        for (job, result) in jobs.iter().zip(decoded) {
            match result {
                Ok(raster) => {
                    canvas.overlay(&raster);
                    merged += 1;
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => warn!(
                    "Omitting tile {} (index {}) from band {} level {}: {}",
                    job.tile_id,
                    job.index,
                    band.name(),
                    level,
                    e
                ),
            }
        }

        if merged == 0 && (full_scene || !jobs.is_empty()) {
            return Err(Error::EmptyMosaic {
                band: band.name().to_string(),
                level,
            });
        }
        info!(
            "Composited band {} level {} from {}/{} tile(s) in {:.2?}",
            band.name(),
            level,
            merged,
            jobs.len(),
            started.elapsed()
        );
        Ok(canvas)
    }
}

/// [`ImageComposer`] for one band of a mosaic product.
pub struct MosaicComposer {
    compositor: Arc<MosaicCompositor>,
    band: Arc<BandInfo>,
}

impl MosaicComposer {
    pub fn new(compositor: Arc<MosaicCompositor>, band: Arc<BandInfo>) -> Self {
        Self { compositor, band }
    }
}

impl ImageComposer for MosaicComposer {
    fn scene_rectangle(&self) -> PixelRect {
        self.compositor.scene().scene_rectangle()
    }

    fn compose(&self, level: usize, region: PixelRect, cancel: &CancelFlag) -> Result<Raster> {
        self.compositor
            .composite_region(&self.band, level, region, cancel)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use ndarray::Array2;

    use super::*;
    use crate::core::band::WavebandInfo;
    use crate::core::geometry::{Tile, TileGeometry};
    use crate::io::decoder::{CacheDir, CodecError, DecodeRequest, TileCodec};
    use crate::types::SpatialResolution;

    /// Fills each tile with the number stored in its file name (`<n>.img`).
    /// Lower values sleep longer so completion order is the reverse of tile
    /// order. Names starting with `bad` fail.
    struct NumberCodec;

    impl TileCodec for NumberCodec {
        fn decode_region(
            &self,
            request: &DecodeRequest<'_>,
            _cache_dir: &Path,
        ) -> std::result::Result<Array2<u16>, CodecError> {
            let stem = request
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let value: u16 = stem
                .parse()
                .map_err(|_| CodecError::UnsupportedFormat(stem.to_string()))?;
            std::thread::sleep(Duration::from_millis(u64::from(20u16.saturating_sub(value))));
            Ok(Array2::from_elem(
                (request.region.height, request.region.width),
                value,
            ))
        }
    }

    fn tile(id: &str, ulx: f64, uly: f64, size: usize) -> Tile {
        Tile::new(id).with_geometry(
            SpatialResolution::R10M,
            TileGeometry {
                num_rows: size,
                num_cols: size,
                upper_left_x: ulx,
                upper_left_y: uly,
                x_dim: 10.0,
                y_dim: -10.0,
            },
        )
    }

    /// Six 4x4 tiles in a row, each overlapping the previous by 2 pixels.
    fn overlapping_scene() -> Arc<SceneDescription> {
        let tiles = (0..6)
            .map(|i| tile(&format!("T{}", i), i as f64 * 20.0, 40.0, 4))
            .collect();
        Arc::new(SceneDescription::new(tiles).unwrap())
    }

    fn band(files: &[(&str, &str)]) -> BandInfo {
        let tile_files: BTreeMap<String, PathBuf> = files
            .iter()
            .map(|(id, file)| (id.to_string(), PathBuf::from(file)))
            .collect();
        BandInfo::new(WavebandInfo::default_for(3).unwrap(), tile_files)
    }

    fn compositor(scene: Arc<SceneDescription>, parallel: bool) -> (tempfile::TempDir, MosaicCompositor) {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::provision(dir.path()).unwrap();
        let decoder = TileDecoder::new(Arc::new(NumberCodec), cache);
        (dir, MosaicCompositor::new(scene, decoder).with_parallel(parallel))
    }

    #[test]
    fn test_last_writer_wins_in_list_order() {
        let scene = overlapping_scene();
        let band = band(&[("T2", "2.img"), ("T3", "3.img"), ("T5", "5.img")]);
        let (_dir, compositor) = compositor(scene, true);
        let raster = compositor.composite(&band, 0, &CancelFlag::new()).unwrap();
        assert_eq!(raster.rect(), PixelRect::new(0, 0, 14, 4));
        let row: Vec<u16> = raster.data().row(0).to_vec();
        assert_eq!(row, vec![0, 0, 0, 0, 2, 2, 3, 3, 3, 3, 5, 5, 5, 5]);
    }

    #[test]
    fn test_higher_index_wins_even_when_it_decodes_first() {
        // T2 and T5 share a footprint; T5 finishes decoding long before T2
        let positions = [0.0, 40.0, 80.0, 120.0, 160.0, 80.0];
        let tiles = positions
            .iter()
            .enumerate()
            .map(|(i, &x)| tile(&format!("T{}", i), x, 40.0, 4))
            .collect();
        let scene = Arc::new(SceneDescription::new(tiles).unwrap());
        let band = band(&[("T2", "1.img"), ("T5", "12.img")]);
        let (_dir, compositor) = compositor(scene, true);
        let raster = compositor.composite(&band, 0, &CancelFlag::new()).unwrap();
        let row: Vec<u16> = raster.data().row(3).to_vec();
        assert_eq!(&row[8..12], &[12, 12, 12, 12]);
        assert!(row[..8].iter().chain(&row[12..]).all(|&v| v == FILL_CODE_MOSAIC_BG));
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let scene = overlapping_scene();
        let band = band(&[("T0", "9.img"), ("T1", "1.img"), ("T4", "4.img"), ("T5", "15.img")]);
        let (_d1, parallel) = compositor(scene.clone(), true);
        let (_d2, sequential) = compositor(scene, false);
        let cancel = CancelFlag::new();
        for level in 0..3 {
            let a = parallel.composite(&band, level, &cancel).unwrap();
            let b = sequential.composite(&band, level, &cancel).unwrap();
            assert_eq!(a, b, "level {}", level);
            assert_eq!(a, parallel.composite(&band, level, &cancel).unwrap());
        }
    }

    #[test]
    fn test_failed_tile_is_filled() {
        let scene = overlapping_scene();
        let band = band(&[("T0", "1.img"), ("T3", "bad.img")]);
        let (_dir, compositor) = compositor(scene, false);
        let compositor = compositor.with_fill_value(9);
        let raster = compositor.composite(&band, 0, &CancelFlag::new()).unwrap();
        let row: Vec<u16> = raster.data().row(0).to_vec();
        assert_eq!(&row[..4], &[1, 1, 1, 1]);
        assert!(row[4..].iter().all(|&v| v == 9));
    }

    #[test]
    fn test_all_failures_is_empty_mosaic() {
        let scene = overlapping_scene();
        let band = band(&[("T0", "bad.img")]);
        let (_dir, compositor) = compositor(scene, true);
        assert!(matches!(
            compositor.composite(&band, 1, &CancelFlag::new()),
            Err(Error::EmptyMosaic { level: 1, .. })
        ));
    }

    #[test]
    fn test_region_without_tiles_is_fill() {
        let scene = overlapping_scene();
        let band = band(&[("T0", "1.img")]);
        let (_dir, compositor) = compositor(scene, true);
        let cancel = CancelFlag::new();
        let raster = compositor
            .composite_region(&band, 0, PixelRect::new(8, 0, 4, 2), &cancel)
            .unwrap();
        assert!(raster.data().iter().all(|&v| v == FILL_CODE_MOSAIC_BG));
        let raster = compositor
            .composite_region(&band, 0, PixelRect::new(2, 1, 4, 2), &cancel)
            .unwrap();
        assert_eq!(raster.sample(3, 1), Some(1));
        assert_eq!(raster.sample(4, 1), Some(0));
    }

    #[test]
    fn test_cancel_stops_the_composite() {
        let scene = overlapping_scene();
        let band = band(&[("T0", "1.img")]);
        let (_dir, compositor) = compositor(scene, true);
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(
            compositor.composite(&band, 0, &cancel),
            Err(Error::Cancelled)
        ));
    }
}
