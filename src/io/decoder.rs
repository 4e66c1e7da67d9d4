//! Resolution-aware tile decoder adapter.
//!
//! The codec behind [`TileCodec`] knows how to read one image file; this layer
//! turns a tile placement on the reference grid into a codec request and hands
//! back a [`Raster`] positioned in mosaic coordinates. A band stored at 20 m or
//! 60 m is resampled by the codec to the reference-grid size of the tile at the
//! requested level, so every band of a tile covers the same mosaic pixels.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::raster::Raster;
use crate::error::{Error, Result};
use crate::types::{PixelRect, SpatialResolution};

/// Errors raised by a tile codec
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
}

/// One codec read: the part `region` of the tile image `path`, rendered as if
/// the whole image had `output_width` x `output_height` pixels.
#[derive(Debug, Clone)]
pub struct DecodeRequest<'a> {
    pub path: &'a Path,
    pub resolution: SpatialResolution,
    pub level: usize,
    pub output_width: usize,
    pub output_height: usize,
    /// Tile-local window in output pixels.
    pub region: PixelRect,
}

impl DecodeRequest<'_> {
    pub fn is_full_tile(&self) -> bool {
        self.region == PixelRect::new(0, 0, self.output_width, self.output_height)
    }
}

/// External image codec. Returned arrays are `[row, col]` with the shape of
/// `request.region`.
pub trait TileCodec: Send + Sync {
    fn decode_region(
        &self,
        request: &DecodeRequest<'_>,
        cache_dir: &Path,
    ) -> std::result::Result<Array2<u16>, CodecError>;
}

/// A scratch directory verified writable when the product was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDir(PathBuf);

impl CacheDir {
    /// Creates `path` if needed and checks it is writable with a temporary file.
    pub fn provision(path: &Path) -> Result<Self> {
        let unavailable = |reason: String| Error::CacheUnavailable {
            path: path.to_path_buf(),
            reason,
        };
        std::fs::create_dir_all(path).map_err(|e| unavailable(e.to_string()))?;
        tempfile::Builder::new()
            .prefix(".writable")
            .tempfile_in(path)
            .map_err(|e| unavailable(format!("not writable: {}", e)))?;
        debug!("Cache directory ready: {:?}", path);
        Ok(Self(path.to_path_buf()))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Decodes tiles through a codec into positioned rasters.
#[derive(Clone)]
pub struct TileDecoder {
    codec: Arc<dyn TileCodec>,
    cache: CacheDir,
}

impl TileDecoder {
    pub fn new(codec: Arc<dyn TileCodec>, cache: CacheDir) -> Self {
        Self { codec, cache }
    }

    pub fn cache_dir(&self) -> &Path {
        self.cache.path()
    }

    /// Whole tile placed at `placement` (its rectangle at `level`).
    pub fn decode(
        &self,
        tile_id: &str,
        path: &Path,
        resolution: SpatialResolution,
        level: usize,
        placement: PixelRect,
    ) -> Result<Raster> {
        self.decode_region(tile_id, path, resolution, level, placement, placement)
    }

    /// The part of the tile placed at `placement` that falls in `region`, both in
    /// mosaic coordinates at `level`.
    pub fn decode_region(
        &self,
        tile_id: &str,
        path: &Path,
        resolution: SpatialResolution,
        level: usize,
        placement: PixelRect,
        region: PixelRect,
    ) -> Result<Raster> {
        let tile_decode = |reason: String| Error::TileDecode {
            tile_id: tile_id.to_string(),
            level,
            reason,
        };
        let window = placement
            .intersection(&region)
            .ok_or_else(|| tile_decode(format!("region {} misses tile at {}", region, placement)))?;
        let request = DecodeRequest {
            path,
            resolution,
            level,
            output_width: placement.width,
            output_height: placement.height,
            region: window.relative_to(&placement),
        };

        let data = self
            .codec
            .decode_region(&request, self.cache.path())
            .map_err(|e| {
                warn!("Decoding {} ({:?}) at level {} failed: {}", tile_id, path, level, e);
                tile_decode(e.to_string())
            })?;
        if data.dim() != (window.height, window.width) {
            return Err(tile_decode(
                CodecError::DimensionMismatch(window.width, window.height, data.ncols(), data.nrows())
                    .to_string(),
            ));
        }
        debug!("Decoded {} at level {} into {}", tile_id, level, window);
        Ok(Raster::new(window.x, window.y, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records requests and fills the region with its own x offset.
    #[derive(Default)]
    struct RecordingCodec {
        seen: Mutex<Vec<(PixelRect, usize, usize)>>,
        short: bool,
    }

    impl TileCodec for RecordingCodec {
        fn decode_region(
            &self,
            request: &DecodeRequest<'_>,
            _cache_dir: &Path,
        ) -> std::result::Result<Array2<u16>, CodecError> {
            self.seen.lock().unwrap().push((
                request.region,
                request.output_width,
                request.output_height,
            ));
            let width = if self.short {
                request.region.width - 1
            } else {
                request.region.width
            };
            Ok(Array2::from_elem(
                (request.region.height, width),
                request.region.x as u16,
            ))
        }
    }

    fn decoder(codec: Arc<RecordingCodec>) -> (tempfile::TempDir, TileDecoder) {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::provision(&dir.path().join("cache")).unwrap();
        (dir, TileDecoder::new(codec, cache))
    }

    #[test]
    fn test_full_decode_is_positioned_at_placement() {
        let codec = Arc::new(RecordingCodec::default());
        let (_dir, decoder) = decoder(codec.clone());
        let placement = PixelRect::new(100, 50, 20, 10);
        let raster = decoder
            .decode("15SUC", Path::new("a.jp2"), SpatialResolution::R10M, 1, placement)
            .unwrap();
        assert_eq!(raster.rect(), placement);
        assert_eq!(
            codec.seen.lock().unwrap()[0],
            (PixelRect::new(0, 0, 20, 10), 20, 10)
        );
    }

    #[test]
    fn test_region_request_is_tile_local() {
        let codec = Arc::new(RecordingCodec::default());
        let (_dir, decoder) = decoder(codec.clone());
        let placement = PixelRect::new(100, 50, 20, 10);
        let raster = decoder
            .decode_region(
                "15SUC",
                Path::new("a.jp2"),
                SpatialResolution::R20M,
                0,
                placement,
                PixelRect::new(110, 0, 100, 55),
            )
            .unwrap();
        assert_eq!(raster.rect(), PixelRect::new(110, 50, 10, 5));
        assert_eq!(raster.sample(110, 50), Some(10));
        assert_eq!(codec.seen.lock().unwrap()[0].0, PixelRect::new(10, 0, 10, 5));
    }

    #[test]
    fn test_wrong_shape_is_a_tile_decode_error() {
        let codec = Arc::new(RecordingCodec {
            short: true,
            ..RecordingCodec::default()
        });
        let (_dir, decoder) = decoder(codec);
        let result = decoder.decode(
            "15SVD",
            Path::new("b.jp2"),
            SpatialResolution::R10M,
            2,
            PixelRect::new(0, 0, 8, 8),
        );
        assert!(matches!(
            result,
            Err(Error::TileDecode { ref tile_id, level: 2, .. }) if tile_id == "15SVD"
        ));
    }

    #[test]
    fn test_unwritable_cache_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            CacheDir::provision(&file.join("cache")),
            Err(Error::CacheUnavailable { .. })
        ));
    }
}
