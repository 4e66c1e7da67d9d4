//! GDAL-backed tile codec.
//!
//! JPEG2000 tile images are opened through whichever GDAL driver is available
//! (JP2OpenJPEG, JP2KAK, ...). Reads request a buffer sized for the target
//! level, so GDAL serves them from the image's internal overviews and resamples
//! with nearest neighbour. A region read returns exactly the pixels of the
//! same region in a full read: whole-multiple upscales read only the source
//! pixels under the region, any other scale decodes the whole image once.
//! Full decodes are written to the product cache directory as GeoTIFF and
//! later requests read their windows from it.
use std::path::{Path, PathBuf};

use gdal::Dataset;
use gdal::raster::ResampleAlg;
use ndarray::{Array2, s};
use tracing::{debug, warn};

use crate::io::decoder::{CodecError, DecodeRequest, TileCodec};
use crate::io::writers::tiff::write_tiff_u16;
use crate::types::PixelRect;

/// Georeferencing read from a GDAL dataset
#[derive(Debug, Clone)]
pub struct GdalMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// `EPSG:<code>` when the WKT carries an authority, else the WKT itself
    pub projection: String,
}

/// Extracts `EPSG:<code>` from the last authority tag of a WKT string.
pub fn parse_epsg(wkt: &str) -> Option<String> {
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    let start = wkt.rfind(KEY)? + KEY.len();
    let end = wkt[start..].find('"')?;
    Some(format!("EPSG:{}", &wkt[start..start + end]))
}

/// Single-band u16 image opened through GDAL
pub struct GdalTileReader {
    pub dataset: Dataset,
    pub metadata: GdalMetadata,
}

impl GdalTileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CodecError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        if dataset.raster_count() == 0 {
            return Err(CodecError::UnsupportedFormat(format!(
                "No raster bands in {}",
                path.as_ref().display()
            )));
        }
        let geotransform = dataset
            .geo_transform()
            .unwrap_or([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let wkt = dataset.projection();
        let projection = parse_epsg(&wkt).unwrap_or(wkt);
        Ok(Self {
            dataset,
            metadata: GdalMetadata {
                size_x,
                size_y,
                geotransform,
                projection,
            },
        })
    }

    /// Reads the source window `(x, y, width, height)` of band 1 into a
    /// `buffer_width` x `buffer_height` array.
    pub fn read_window(
        &self,
        window: (usize, usize, usize, usize),
        buffer_width: usize,
        buffer_height: usize,
    ) -> Result<Array2<u16>, CodecError> {
        let (x, y, width, height) = window;
        let band = self.dataset.rasterband(1)?;
        let buf = band.read_as::<u16>(
            (x as isize, y as isize),
            (width, height),
            (buffer_width, buffer_height),
            Some(ResampleAlg::NearestNeighbour),
        )?;
        let data_vec = buf.data().to_vec();
        let len = data_vec.len();
        Array2::from_shape_vec((buffer_height, buffer_width), data_vec).map_err(|_| {
            CodecError::DimensionMismatch(buffer_width, buffer_height, len, 1)
        })
    }

    /// Whole band at native size.
    pub fn read_band(&self) -> Result<Array2<u16>, CodecError> {
        let (w, h) = (self.metadata.size_x, self.metadata.size_y);
        self.read_window((0, 0, w, h), w, h)
    }
}

/// How source pixels land on output pixels along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisScale {
    /// Output is a whole multiple of the source: output pixel `i` is source
    /// pixel `i / n`, which is what nearest neighbour picks for that ratio.
    Replicate(usize),
    /// Any other ratio, left to GDAL over the whole image.
    Resample,
}

impl AxisScale {
    fn of(source: usize, output: usize) -> Self {
        if source > 0 && output % source == 0 {
            AxisScale::Replicate(output / source)
        } else {
            AxisScale::Resample
        }
    }
}

/// Source pixels `[start, end)` feeding output pixels `[start, start + len)`
/// when each source pixel is replicated `n` times.
fn replicated_span(start: usize, len: usize, n: usize) -> (usize, usize) {
    (start / n, (start + len).div_ceil(n))
}

/// `region` of an image, or the image itself when the region covers it.
fn crop(data: Array2<u16>, region: PixelRect) -> Result<Array2<u16>, CodecError> {
    let (rows, cols) = data.dim();
    if region.x == 0 && region.y == 0 && (region.height, region.width) == (rows, cols) {
        return Ok(data);
    }
    if region.right() > cols || region.bottom() > rows {
        return Err(CodecError::DimensionMismatch(
            region.right(),
            region.bottom(),
            cols,
            rows,
        ));
    }
    Ok(data
        .slice(s![region.y..region.bottom(), region.x..region.right()])
        .to_owned())
}

/// [`TileCodec`] over GDAL with a GeoTIFF decode cache.
#[derive(Debug, Clone)]
pub struct GdalCodec {
    use_cache: bool,
}

impl Default for GdalCodec {
    fn default() -> Self {
        Self { use_cache: true }
    }
}

impl GdalCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_cache() -> Self {
        Self { use_cache: false }
    }

    /// Cache file of a full decode of `path` at `level`. Image names are unique
    /// per band and tile, so names never collide inside one product.
    pub fn cache_file(cache_dir: &Path, path: &Path, level: usize) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tile".to_string());
        cache_dir.join(format!("{}_L{}.tif", stem, level))
    }

    /// `request.region` of a cached full decode, read at native size.
    fn read_cached(
        &self,
        cache_file: &Path,
        request: &DecodeRequest<'_>,
    ) -> Option<Array2<u16>> {
        if !cache_file.is_file() {
            return None;
        }
        let reader = GdalTileReader::open(cache_file)
            .map_err(|e| warn!("Ignoring unreadable cache file {:?}: {}", cache_file, e))
            .ok()?;
        let size = (reader.metadata.size_x, reader.metadata.size_y);
        if size != (request.output_width, request.output_height) {
            warn!("Ignoring cache file {:?} of size {:?}", cache_file, size);
            return None;
        }
        let region = request.region;
        reader
            .read_window(
                (region.x, region.y, region.width, region.height),
                region.width,
                region.height,
            )
            .map_err(|e| warn!("Ignoring unreadable cache file {:?}: {}", cache_file, e))
            .ok()
    }

    /// `region` of the image rendered at `output_width` x `output_height`.
    /// Whole-multiple scales read only the source pixels under the region;
    /// other scales read the whole image so every region crops the same pixels.
    fn decode_uncached(
        reader: &GdalTileReader,
        request: &DecodeRequest<'_>,
        region: PixelRect,
    ) -> Result<Array2<u16>, CodecError> {
        let (source_w, source_h) = (reader.metadata.size_x, reader.metadata.size_y);
        let scales = (
            AxisScale::of(source_w, request.output_width),
            AxisScale::of(source_h, request.output_height),
        );
        match scales {
            (AxisScale::Replicate(nx), AxisScale::Replicate(ny)) => {
                let (x0, x1) = replicated_span(region.x, region.width, nx);
                let (y0, y1) = replicated_span(region.y, region.height, ny);
                debug!(
                    "GDAL read {:?} window ({}, {}, {}, {}) x{}/{} -> {}",
                    request.path,
                    x0,
                    y0,
                    x1 - x0,
                    y1 - y0,
                    nx,
                    ny,
                    region
                );
                let native = reader.read_window((x0, y0, x1 - x0, y1 - y0), x1 - x0, y1 - y0)?;
                Ok(Array2::from_shape_fn(
                    (region.height, region.width),
                    |(r, c)| native[((region.y + r) / ny - y0, (region.x + c) / nx - x0)],
                ))
            }
            _ => {
                debug!(
                    "GDAL read {:?} {}x{} -> {}x{} for {}",
                    request.path,
                    source_w,
                    source_h,
                    request.output_width,
                    request.output_height,
                    region
                );
                let data = reader.read_window(
                    (0, 0, source_w, source_h),
                    request.output_width,
                    request.output_height,
                )?;
                crop(data, region)
            }
        }
    }

    fn write_cache(&self, cache_dir: &Path, cache_file: &Path, data: &Array2<u16>) {
        let result = (|| -> Result<(), Box<dyn std::error::Error>> {
            let tmp = tempfile::Builder::new()
                .prefix(".decode")
                .suffix(".tif")
                .tempfile_in(cache_dir)?;
            drop(write_tiff_u16(tmp.path(), data.view(), None)?);
            tmp.persist(cache_file)?;
            Ok(())
        })();
        match result {
            Ok(()) => debug!("Cached decode in {:?}", cache_file),
            Err(e) => warn!("Failed to cache decode in {:?}: {}", cache_file, e),
        }
    }
}

impl TileCodec for GdalCodec {
    fn decode_region(
        &self,
        request: &DecodeRequest<'_>,
        cache_dir: &Path,
    ) -> Result<Array2<u16>, CodecError> {
        if !request.path.is_file() {
            return Err(CodecError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", request.path.display()),
            )));
        }
        let cache_file = Self::cache_file(cache_dir, request.path, request.level);
        if self.use_cache {
            if let Some(data) = self.read_cached(&cache_file, request) {
                debug!("Cache hit {:?}", cache_file);
                return Ok(data);
            }
        }

        let reader = GdalTileReader::open(request.path)?;
        let whole = PixelRect::new(0, 0, request.output_width, request.output_height);
        let windowed = matches!(
            (
                AxisScale::of(reader.metadata.size_x, request.output_width),
                AxisScale::of(reader.metadata.size_y, request.output_height),
            ),
            (AxisScale::Replicate(_), AxisScale::Replicate(_))
        );
        if windowed && !request.is_full_tile() {
            return Self::decode_uncached(&reader, request, request.region);
        }

        let data = Self::decode_uncached(&reader, request, whole)?;
        if self.use_cache {
            self.write_cache(cache_dir, &cache_file, &data);
        }
        crop(data, request.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SpatialResolution;

    #[test]
    fn test_parse_epsg() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 15N",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],AUTHORITY["EPSG","32615"]]"#;
        assert_eq!(parse_epsg(wkt).as_deref(), Some("EPSG:32615"));
        assert_eq!(parse_epsg("LOCAL_CS[\"x\"]"), None);
    }

    #[test]
    fn test_axis_scales() {
        assert_eq!(AxisScale::of(10980, 10980), AxisScale::Replicate(1));
        assert_eq!(AxisScale::of(5490, 10980), AxisScale::Replicate(2));
        assert_eq!(AxisScale::of(1830, 10980), AxisScale::Replicate(6));
        assert_eq!(AxisScale::of(1826, 10960), AxisScale::Resample);
        assert_eq!(AxisScale::of(10980, 343), AxisScale::Resample);
        assert_eq!(AxisScale::of(10980, 5490), AxisScale::Resample);
        // Pixel 1 of this region is output pixel 10468, source pixel 5234
        assert_eq!(replicated_span(10467, 13, 2), (5233, 5240));
        assert_eq!(replicated_span(12, 6, 6), (2, 3));
    }

    fn gradient_tile(dir: &Path, side: usize) -> PathBuf {
        let tile = dir.join(format!("IMG_gradient_{}.tif", side));
        let values = Array2::from_shape_fn((side, side), |(r, c)| (r * 100 + c) as u16);
        drop(write_tiff_u16(&tile, values.view(), None).unwrap());
        tile
    }

    fn request(path: &Path, output: usize, region: PixelRect) -> DecodeRequest<'_> {
        DecodeRequest {
            path,
            resolution: SpatialResolution::R20M,
            level: 0,
            output_width: output,
            output_height: output,
            region,
        }
    }

    #[test]
    fn test_region_reads_match_crops_of_full_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let tile = gradient_tile(dir.path(), 5);
        let codec = GdalCodec::without_cache();

        // 10: whole multiple, 8: upsampled by 1.6, 3: downsampled
        for output in [10, 8, 3] {
            let whole = PixelRect::new(0, 0, output, output);
            let full = codec
                .decode_region(&request(&tile, output, whole), dir.path())
                .unwrap();
            assert_eq!(full.dim(), (output, output));
            for x in 0..output {
                for width in 1..=output - x {
                    let y = (x * 3) % output;
                    let height = (width % (output - y)).max(1);
                    let region = PixelRect::new(x, y, width, height);
                    let data = codec
                        .decode_region(&request(&tile, output, region), dir.path())
                        .unwrap();
                    assert_eq!(
                        data,
                        full.slice(s![y..y + height, x..x + width]).to_owned(),
                        "{}x{} output, region {}",
                        output,
                        output,
                        region
                    );
                }
            }
        }
    }

    #[test]
    fn test_whole_multiple_scale_replicates_source_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let tile = gradient_tile(dir.path(), 5);
        let codec = GdalCodec::without_cache();
        let full = codec
            .decode_region(&request(&tile, 10, PixelRect::new(0, 0, 10, 10)), dir.path())
            .unwrap();
        for ((r, c), v) in full.indexed_iter() {
            assert_eq!(*v as usize, (r / 2) * 100 + c / 2);
        }
        let data = codec
            .decode_region(&request(&tile, 10, PixelRect::new(7, 3, 2, 1)), dir.path())
            .unwrap();
        assert_eq!(data.row(0).to_vec(), vec![103, 104]);
    }

    #[test]
    fn test_cached_region_reads_match_crops() {
        let dir = tempfile::tempdir().unwrap();
        let tile = gradient_tile(dir.path(), 7);
        let codec = GdalCodec::new();
        let full = codec
            .decode_region(&request(&tile, 3, PixelRect::new(0, 0, 3, 3)), dir.path())
            .unwrap();
        assert!(GdalCodec::cache_file(dir.path(), &tile, 0).is_file());
        let region = PixelRect::new(1, 1, 2, 2);
        let data = codec
            .decode_region(&request(&tile, 3, region), dir.path())
            .unwrap();
        assert_eq!(data, full.slice(s![1..3, 1..3]).to_owned());
    }

    #[test]
    fn test_decode_and_cache_geotiff() {
        let dir = tempfile::tempdir().unwrap();
        let tile = dir.path().join("IMG_tile.tif");
        let cache = dir.path().join("cache");
        std::fs::create_dir_all(&cache).unwrap();
        let values = Array2::from_shape_fn((8, 8), |(r, c)| (r * 8 + c) as u16);
        drop(write_tiff_u16(&tile, values.view(), None).unwrap());

        let codec = GdalCodec::new();
        let full = DecodeRequest {
            path: &tile,
            resolution: SpatialResolution::R10M,
            level: 0,
            output_width: 8,
            output_height: 8,
            region: PixelRect::new(0, 0, 8, 8),
        };
        let data = codec.decode_region(&full, &cache).unwrap();
        assert_eq!(data[(3, 5)], 29);
        assert!(GdalCodec::cache_file(&cache, &tile, 0).is_file());
        assert_eq!(codec.decode_region(&full, &cache).unwrap(), data);

        let half = DecodeRequest {
            level: 1,
            output_width: 4,
            output_height: 4,
            region: PixelRect::new(0, 0, 4, 4),
            ..full.clone()
        };
        let data = codec.decode_region(&half, &cache).unwrap();
        assert_eq!(data.dim(), (4, 4));
        assert!(data.iter().all(|v| *v < 64));

        let window = DecodeRequest {
            region: PixelRect::new(2, 4, 3, 2),
            ..full
        };
        let data = codec.decode_region(&window, &cache).unwrap();
        assert_eq!(data.row(0).to_vec(), vec![34, 35, 36]);
        assert_eq!(data.row(1).to_vec(), vec![42, 43, 44]);
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.jp2");
        let request = DecodeRequest {
            path: &missing,
            resolution: SpatialResolution::R10M,
            level: 0,
            output_width: 4,
            output_height: 4,
            region: PixelRect::new(0, 0, 4, 4),
        };
        assert!(matches!(
            GdalCodec::new().decode_region(&request, dir.path()),
            Err(CodecError::Io(_))
        ));
    }
}
