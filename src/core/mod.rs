//! Core building blocks: tile geometry, scene layout, rasters, the mosaic
//! compositor and the per-band multi-level image source. Consumed by the
//! product reader in `io` and the high-level `api` module.
pub mod band;
pub mod cancel;
pub mod geometry;
pub mod layout;
pub mod mosaic;
pub mod multilevel;
pub mod params;
pub mod raster;
pub mod stretch;
