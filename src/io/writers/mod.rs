//! Output writers for exported band rasters: GDAL GeoTIFF, grayscale JPEG,
//! world/.prj files and metadata (embedded items or JSON sidecar).
pub mod jpeg;
pub mod metadata;
pub mod tiff;
pub mod worldfile;
