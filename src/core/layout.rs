//! Scene layout: the global mosaic pixel grid and every tile's placement in it.
//!
//! Placements are computed once on the 10 m reference grid. Overview levels
//! reuse them by right-shifting each component by the level instead of
//! re-deriving them from per-resolution geometry, so every band of a tile lands
//! on the same mosaic origin at every level. The shift floors sub-pixel
//! offsets; that loss is accepted in exchange for a single consistent grid.
//!
//! Overlapping tiles are resolved by list order (later tiles win). That rule
//! knows nothing about per-pixel quality and is a known simplification.
use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::core::geometry::{GeometryError, Tile};
use crate::types::{Envelope, PixelRect, SpatialResolution};

const GRID_EPSILON: f64 = 1e-6;

fn reference_pixel_size() -> f64 {
    SpatialResolution::REFERENCE.meters() as f64
}

fn grid_floor(v: f64) -> usize {
    (v + GRID_EPSILON).floor().max(0.0) as usize
}

fn grid_ceil(v: f64) -> usize {
    (v - GRID_EPSILON).ceil().max(0.0) as usize
}

/// Union of every tile's reference-resolution envelope.
pub fn compute_scene_envelope(tiles: &[Tile]) -> Result<Envelope, GeometryError> {
    let mut iter = tiles.iter();
    let first = iter.next().ok_or(GeometryError::EmptyTileList)?;
    let mut envelope = first.envelope(SpatialResolution::REFERENCE)?;
    for tile in iter {
        envelope = envelope.union(&tile.envelope(SpatialResolution::REFERENCE)?);
    }
    Ok(envelope)
}

/// Scene envelope as a reference-grid pixel rectangle anchored at (0, 0).
/// Extents are rounded up so fractional tile borders never clip the mosaic.
pub fn compute_scene_rectangle(envelope: &Envelope) -> PixelRect {
    let px = reference_pixel_size();
    PixelRect::new(
        0,
        0,
        grid_ceil(envelope.width / px),
        grid_ceil(envelope.height / px),
    )
}

/// Level-0 placement of `tile` inside a scene spanning `scene`.
pub fn compute_tile_rectangle(scene: &Envelope, tile: &Envelope) -> PixelRect {
    let px = reference_pixel_size();
    PixelRect::new(
        grid_floor((tile.min_x - scene.min_x) / px),
        grid_floor((scene.max_y() - tile.max_y()) / px),
        grid_ceil(tile.width / px),
        grid_ceil(tile.height / px),
    )
}

/// Ordered tiles of one product and the layout derived from them.
///
/// A tile's index is its position in the list handed to [`SceneDescription::new`];
/// it is the only handle used by pixel-rectangle lookups.
#[derive(Debug, Clone)]
pub struct SceneDescription {
    tiles: Vec<Tile>,
    envelope: Envelope,
    rectangle: PixelRect,
    tile_envelopes: Vec<Envelope>,
    tile_rectangles: Vec<PixelRect>,
    index_by_id: HashMap<String, usize>,
}

impl SceneDescription {
    pub fn new(tiles: Vec<Tile>) -> Result<Self, GeometryError> {
        let envelope = compute_scene_envelope(&tiles)?;
        let rectangle = compute_scene_rectangle(&envelope);

        let mut index_by_id = HashMap::with_capacity(tiles.len());
        let mut tile_envelopes = Vec::with_capacity(tiles.len());
        let mut tile_rectangles = Vec::with_capacity(tiles.len());
        for (index, tile) in tiles.iter().enumerate() {
            if index_by_id.insert(tile.id.clone(), index).is_some() {
                return Err(GeometryError::DuplicateTileId(tile.id.clone()));
            }
            let tile_envelope = tile.envelope(SpatialResolution::REFERENCE)?;
            let tile_rectangle = compute_tile_rectangle(&envelope, &tile_envelope);
            debug!("Tile {} ({}) placed at {}", index, tile.id, tile_rectangle);
            tile_envelopes.push(tile_envelope);
            tile_rectangles.push(tile_rectangle);
        }

        Ok(Self {
            tiles,
            envelope,
            rectangle,
            tile_envelopes,
            tile_rectangles,
            index_by_id,
        })
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn scene_envelope(&self) -> Envelope {
        self.envelope
    }

    pub fn scene_rectangle(&self) -> PixelRect {
        self.rectangle
    }

    pub fn scene_rectangle_at_level(&self, level: usize) -> PixelRect {
        self.rectangle.shifted(level)
    }

    /// CRS code of the scene, taken from the first tile.
    pub fn crs_code(&self) -> &str {
        &self.tiles[0].horizontal_cs_code
    }

    pub fn crs_name(&self) -> &str {
        &self.tiles[0].horizontal_cs_name
    }

    pub fn tile_index(&self, tile_id: &str) -> Result<usize, GeometryError> {
        self.index_by_id
            .get(tile_id)
            .copied()
            .ok_or_else(|| GeometryError::UnknownTileId(tile_id.to_string()))
    }

    pub fn tile(&self, index: usize) -> Result<&Tile, GeometryError> {
        self.tiles
            .get(index)
            .ok_or(GeometryError::TileIndexOutOfRange {
                index,
                count: self.tiles.len(),
            })
    }

    pub fn tile_envelope(&self, index: usize) -> Result<Envelope, GeometryError> {
        self.check_index(index)?;
        Ok(self.tile_envelopes[index])
    }

    pub fn tile_rectangle(&self, index: usize) -> Result<PixelRect, GeometryError> {
        self.tile_rectangle_at_level(index, 0)
    }

    pub fn tile_rectangle_at_level(
        &self,
        index: usize,
        level: usize,
    ) -> Result<PixelRect, GeometryError> {
        self.check_index(index)?;
        Ok(self.tile_rectangles[index].shifted(level))
    }

    /// Number of distinct tile columns in the scene.
    pub fn tile_grid_width(&self) -> usize {
        self.tile_rectangles
            .iter()
            .map(|r| r.x)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Number of distinct tile rows in the scene.
    pub fn tile_grid_height(&self) -> usize {
        self.tile_rectangles
            .iter()
            .map(|r| r.y)
            .collect::<BTreeSet<_>>()
            .len()
    }

    fn check_index(&self, index: usize) -> Result<(), GeometryError> {
        if index >= self.tiles.len() {
            return Err(GeometryError::TileIndexOutOfRange {
                index,
                count: self.tiles.len(),
            });
        }
        Ok(())
    }
}
