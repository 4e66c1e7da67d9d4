use gdal::Dataset;
use gdal::DriverManager;
use gdal::raster::{Buffer, ColorInterpretation};
use ndarray::ArrayView2;
use std::path::Path;

/// Single-band u16 GeoTIFF of `image`, with `no_data` marked on the band when
/// given. The dataset is returned open so callers can attach georeferencing
/// and metadata before it is flushed on drop.
pub fn write_tiff_u16(
    output: &Path,
    image: ArrayView2<'_, u16>,
    no_data: Option<u16>,
) -> Result<Dataset, Box<dyn std::error::Error>> {
    let (rows, cols) = image.dim();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let ds = driver.create_with_band_type::<u16, _>(output, cols, rows, 1)?;
    let mut band = ds.rasterband(1)?;
    band.set_color_interpretation(ColorInterpretation::GrayIndex)?;
    if let Some(value) = no_data {
        band.set_no_data_value(Some(f64::from(value)))?;
    }
    // Row-major copy regardless of the view's memory order
    let mut buf = Buffer::new((cols, rows), image.iter().copied().collect());
    band.write((0, 0), (cols, rows), &mut buf)?;
    Ok(ds)
}
