//! Per-band multi-resolution image source.
//!
//! A [`MultiLevelSource`] answers "give me level N" (or a window of it) by
//! delegating to an [`ImageComposer`]. Full level rasters are memoised until
//! [`MultiLevelSource::release`] is called; region reads never populate the
//! cache.
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::core::band::BandInfo;
use crate::core::cancel::CancelFlag;
use crate::core::raster::Raster;
use crate::error::{Error, Result};
use crate::io::decoder::TileDecoder;
use crate::types::PixelRect;

/// Produces the pixels of one band at one level.
pub trait ImageComposer: Send + Sync {
    /// Level-0 extent of the image.
    fn scene_rectangle(&self) -> PixelRect;

    /// Pixels of `region` (mosaic coordinates at `level`, already clipped to the
    /// level rectangle).
    fn compose(&self, level: usize, region: PixelRect, cancel: &CancelFlag) -> Result<Raster>;
}

/// Single-granule product: the decoded tile placed at the origin.
pub struct SingleTileComposer {
    decoder: TileDecoder,
    band: Arc<BandInfo>,
    tile_id: String,
    path: PathBuf,
    rect: PixelRect,
}

impl SingleTileComposer {
    pub fn new(
        decoder: TileDecoder,
        band: Arc<BandInfo>,
        tile_id: impl Into<String>,
        path: PathBuf,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            decoder,
            band,
            tile_id: tile_id.into(),
            path,
            rect: PixelRect::new(0, 0, width, height),
        }
    }
}

impl ImageComposer for SingleTileComposer {
    fn scene_rectangle(&self) -> PixelRect {
        self.rect
    }

    fn compose(&self, level: usize, region: PixelRect, cancel: &CancelFlag) -> Result<Raster> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.decoder.decode_region(
            &self.tile_id,
            &self.path,
            self.band.resolution(),
            level,
            self.rect.shifted(level),
            region,
        )
    }
}

/// Lazily composed, cached overview pyramid of one band.
pub struct MultiLevelSource {
    composer: Box<dyn ImageComposer>,
    num_resolutions: usize,
    levels: Mutex<Vec<Option<Arc<Raster>>>>,
    cancel: CancelFlag,
}

impl MultiLevelSource {
    pub fn new(composer: Box<dyn ImageComposer>, num_resolutions: usize) -> Self {
        Self {
            composer,
            num_resolutions,
            levels: Mutex::new(vec![None; num_resolutions]),
            cancel: CancelFlag::new(),
        }
    }

    pub fn num_resolutions(&self) -> usize {
        self.num_resolutions
    }

    pub fn width(&self) -> usize {
        self.composer.scene_rectangle().width
    }

    pub fn height(&self) -> usize {
        self.composer.scene_rectangle().height
    }

    /// Image extent at `level`.
    pub fn level_rectangle(&self, level: usize) -> Result<PixelRect> {
        self.check_level(level)?;
        Ok(self.composer.scene_rectangle().shifted(level))
    }

    /// Flag observed between tile decodes of every composite of this source.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Full raster at `level`, or `None` when no tile could be decoded.
    pub fn image_at(&self, level: usize) -> Result<Option<Arc<Raster>>> {
        let rect = self.level_rectangle(level)?;
        if let Some(cached) = self.cached(level) {
            debug!("Level {} served from cache", level);
            return Ok(Some(cached));
        }

        let raster = match self.composer.compose(level, rect, &self.cancel) {
            Ok(raster) => Arc::new(raster),
            Err(Error::EmptyMosaic { band, level }) => {
                warn!("No image for band {} at level {}", band, level);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut levels = self.levels();
        // A concurrent caller may have filled the slot first; both results are
        // identical, keep the existing one.
        let slot = levels[level].get_or_insert_with(|| raster.clone());
        Ok(Some(slot.clone()))
    }

    /// Pixels of `rect` at `level`, clipped to the level extent. Only tiles
    /// intersecting `rect` are decoded unless the level is already cached.
    pub fn read_region(&self, level: usize, rect: PixelRect) -> Result<Option<Raster>> {
        let level_rect = self.level_rectangle(level)?;
        let region = level_rect
            .intersection(&rect)
            .ok_or_else(|| Error::InvalidArgument {
                arg: "region",
                value: format!("{} outside {}", rect, level_rect),
            })?;

        if let Some(cached) = self.cached(level) {
            return Ok(cached.crop(&region));
        }
        match self.composer.compose(level, region, &self.cancel) {
            Ok(raster) => Ok(Some(raster)),
            Err(Error::EmptyMosaic { band, level }) => {
                warn!("No image for band {} at level {} in {}", band, level, region);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Drops every cached level raster.
    pub fn release(&self) {
        self.levels().iter_mut().for_each(|slot| *slot = None);
    }

    pub fn is_cached(&self, level: usize) -> bool {
        self.cached(level).is_some()
    }

    fn cached(&self, level: usize) -> Option<Arc<Raster>> {
        self.levels().get(level)?.clone()
    }

    /// Slots only ever hold whole rasters, so a guard poisoned by a panicking
    /// holder is still consistent.
    fn levels(&self) -> MutexGuard<'_, Vec<Option<Arc<Raster>>>> {
        self.levels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_level(&self, level: usize) -> Result<()> {
        if level >= self.num_resolutions {
            return Err(Error::LevelOutOfRange {
                level,
                num_resolutions: self.num_resolutions,
            });
        }
        Ok(())
    }
}
