//! Tile geometry registry: per-tile footprints at each native resolution plus
//! the sun/viewing angle grids carried along from the granule metadata.
//!
//! Everything here is built once while the metadata is read and never mutated
//! afterwards; lookups fail loudly because a missing geometry means the
//! metadata is inconsistent.
use std::collections::BTreeMap;

use ndarray::Array2;
use thiserror::Error;

use crate::types::{Envelope, SpatialResolution};

/// Errors raised by the geometry and layout layer
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Tile {tile_id} has no geometry at {resolution}")]
    GeometryNotFound {
        tile_id: String,
        resolution: SpatialResolution,
    },
    #[error("Scene has no tiles")]
    EmptyTileList,
    #[error("Unknown tile id: {0}")]
    UnknownTileId(String),
    #[error("Tile id {0} appears more than once")]
    DuplicateTileId(String),
    #[error("Tile index {index} is out of range for {count} tiles")]
    TileIndexOutOfRange { index: usize, count: usize },
}

/// Raster geometry of one tile at one resolution, in projected coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TileGeometry {
    pub num_rows: usize,
    pub num_cols: usize,
    pub upper_left_x: f64,
    pub upper_left_y: f64,
    pub x_dim: f64,
    /// Negative for north-up rasters.
    pub y_dim: f64,
}

impl TileGeometry {
    pub fn width(&self) -> f64 {
        self.num_cols as f64 * self.x_dim.abs()
    }

    pub fn height(&self) -> f64 {
        self.num_rows as f64 * self.y_dim.abs()
    }

    pub fn envelope(&self) -> Envelope {
        let height = self.height();
        Envelope::new(
            self.upper_left_x,
            self.upper_left_y - height,
            self.width(),
            height,
        )
    }
}

/// Azimuth/zenith angle grid. `NaN` cells mean no valid observation and are
/// kept as-is.
#[derive(Debug, Clone)]
pub struct AnglesGrid {
    pub band_id: Option<u32>,
    pub detector_id: Option<u32>,
    pub zenith: Array2<f32>,
    pub azimuth: Array2<f32>,
}

impl AnglesGrid {
    pub fn zenith_nan_count(&self) -> usize {
        self.zenith.iter().filter(|v| v.is_nan()).count()
    }

    pub fn azimuth_nan_count(&self) -> usize {
        self.azimuth.iter().filter(|v| v.is_nan()).count()
    }
}

/// One MGRS tile (granule) of a product.
#[derive(Debug, Clone)]
pub struct Tile {
    pub id: String,
    pub horizontal_cs_code: String,
    pub horizontal_cs_name: String,
    pub geometries: BTreeMap<SpatialResolution, TileGeometry>,
    pub sun_angles: Option<AnglesGrid>,
    pub viewing_incidence_angles: Vec<AnglesGrid>,
}

impl Tile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            horizontal_cs_code: String::new(),
            horizontal_cs_name: String::new(),
            geometries: BTreeMap::new(),
            sun_angles: None,
            viewing_incidence_angles: Vec::new(),
        }
    }

    pub fn with_geometry(mut self, resolution: SpatialResolution, geometry: TileGeometry) -> Self {
        self.geometries.insert(resolution, geometry);
        self
    }

    pub fn geometry(&self, resolution: SpatialResolution) -> Result<&TileGeometry, GeometryError> {
        self.geometries
            .get(&resolution)
            .ok_or_else(|| GeometryError::GeometryNotFound {
                tile_id: self.id.clone(),
                resolution,
            })
    }

    pub fn envelope(&self, resolution: SpatialResolution) -> Result<Envelope, GeometryError> {
        Ok(self.geometry(resolution)?.envelope())
    }
}
