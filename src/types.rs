//! Shared value types used across the crate.
//! Includes `SpatialResolution`, the per-resolution `TileLayout`, the pixel-space
//! `PixelRect`, the projected-space `Envelope`, and the export `OutputFormat`.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Native sampling of a Sentinel-2 band, in metres per pixel.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum SpatialResolution {
    R10M,
    R20M,
    R60M,
}

impl SpatialResolution {
    pub const ALL: [SpatialResolution; 3] = [
        SpatialResolution::R10M,
        SpatialResolution::R20M,
        SpatialResolution::R60M,
    ];

    /// The grid every mosaic placement is computed on.
    pub const REFERENCE: SpatialResolution = SpatialResolution::R10M;

    pub fn meters(self) -> u32 {
        match self {
            SpatialResolution::R10M => 10,
            SpatialResolution::R20M => 20,
            SpatialResolution::R60M => 60,
        }
    }

    pub fn from_meters(meters: u32) -> Option<Self> {
        match meters {
            10 => Some(SpatialResolution::R10M),
            20 => Some(SpatialResolution::R20M),
            60 => Some(SpatialResolution::R60M),
            _ => None,
        }
    }

    /// Number of reference-grid pixels covered by one native pixel along an axis.
    pub fn reference_ratio(self) -> u32 {
        self.meters() / Self::REFERENCE.meters()
    }

    /// Default JPEG2000 image layout of a 109.8 km tile at this resolution.
    pub fn tile_layout(self) -> TileLayout {
        match self {
            SpatialResolution::R10M => TileLayout::new(10980, 10980, 4096, 4096, 3, 3, 6),
            SpatialResolution::R20M => TileLayout::new(5490, 5490, 4096, 4096, 2, 2, 6),
            SpatialResolution::R60M => TileLayout::new(1830, 1830, 1830, 1830, 1, 1, 6),
        }
    }
}

impl std::fmt::Display for SpatialResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.meters())
    }
}

/// Pixel layout of one tile image, including its internal JPEG2000 tiling and
/// the depth of its resolution pyramid.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TileLayout {
    pub width: usize,
    pub height: usize,
    pub tile_width: usize,
    pub tile_height: usize,
    pub num_x_tiles: usize,
    pub num_y_tiles: usize,
    pub num_resolutions: usize,
}

impl TileLayout {
    pub const fn new(
        width: usize,
        height: usize,
        tile_width: usize,
        tile_height: usize,
        num_x_tiles: usize,
        num_y_tiles: usize,
        num_resolutions: usize,
    ) -> Self {
        Self {
            width,
            height,
            tile_width,
            tile_height,
            num_x_tiles,
            num_y_tiles,
            num_resolutions,
        }
    }
}

/// Axis-aligned rectangle in mosaic pixel space. Origin is the upper-left corner
/// of the scene, x grows east and y grows south.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> usize {
        self.x + self.width
    }

    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Every component shifted right by `level`: the overview placement rule.
    pub fn shifted(&self, level: usize) -> PixelRect {
        let shift = |v: usize| v.checked_shr(level as u32).unwrap_or(0);
        PixelRect::new(
            shift(self.x),
            shift(self.y),
            shift(self.width),
            shift(self.height),
        )
    }

    pub fn intersection(&self, other: &PixelRect) -> Option<PixelRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn contains(&self, other: &PixelRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// The same rectangle expressed relative to `origin`'s upper-left corner.
    /// Callers must ensure `self` lies inside `origin`.
    pub fn relative_to(&self, origin: &PixelRect) -> PixelRect {
        PixelRect::new(
            self.x - origin.x,
            self.y - origin.y,
            self.width,
            self.height,
        )
    }
}

impl std::fmt::Display for PixelRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[x={}, y={}, w={}, h={}]",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Bounding box in a projected CRS (UTM metres for Sentinel-2).
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, width: f64, height: f64) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
        }
    }

    pub fn max_x(&self) -> f64 {
        self.min_x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.min_y + self.height
    }

    pub fn union(&self, other: &Envelope) -> Envelope {
        let min_x = self.min_x.min(other.min_x);
        let min_y = self.min_y.min(other.min_y);
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        Envelope::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum OutputFormat {
    TIFF,
    JPEG, // 8-bit stretched quicklook
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::TIFF => "tif",
            OutputFormat::JPEG => "jpg",
        }
    }
}
