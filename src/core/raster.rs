//! Positioned pixel buffers. Decoded tiles and composed levels both live in
//! mosaic pixel coordinates at their level.
use ndarray::{Array2, s};

use crate::types::PixelRect;

/// A u16 pixel buffer positioned in mosaic pixel space.
///
/// `data` is indexed `[row, col]`; the buffer covers the rectangle whose
/// upper-left corner is `(origin_x, origin_y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    origin_x: usize,
    origin_y: usize,
    data: Array2<u16>,
}

impl Raster {
    pub fn new(origin_x: usize, origin_y: usize, data: Array2<u16>) -> Self {
        Self {
            origin_x,
            origin_y,
            data,
        }
    }

    /// A raster covering `rect` with every pixel set to `value`.
    pub fn filled(rect: PixelRect, value: u16) -> Self {
        Self::new(
            rect.x,
            rect.y,
            Array2::from_elem((rect.height, rect.width), value),
        )
    }

    pub fn origin_x(&self) -> usize {
        self.origin_x
    }

    pub fn origin_y(&self) -> usize {
        self.origin_y
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.origin_x, self.origin_y, self.width(), self.height())
    }

    /// Sample at global mosaic coordinates; `None` outside the raster.
    pub fn sample(&self, x: usize, y: usize) -> Option<u16> {
        if x < self.origin_x || y < self.origin_y {
            return None;
        }
        self.data
            .get((y - self.origin_y, x - self.origin_x))
            .copied()
    }

    pub fn data(&self) -> &Array2<u16> {
        &self.data
    }

    /// Copies the part of `src` that intersects this raster over the existing
    /// pixels. Returns the overwritten rectangle in global coordinates.
    pub fn overlay(&mut self, src: &Raster) -> Option<PixelRect> {
        let overlap = self.rect().intersection(&src.rect())?;
        let dst = overlap.relative_to(&self.rect());
        let from = overlap.relative_to(&src.rect());
        self.data
            .slice_mut(s![dst.y..dst.bottom(), dst.x..dst.right()])
            .assign(&src.data.slice(s![from.y..from.bottom(), from.x..from.right()]));
        Some(overlap)
    }

    /// Sub-raster covering `rect ∩ self.rect()`.
    pub fn crop(&self, rect: &PixelRect) -> Option<Raster> {
        let overlap = self.rect().intersection(rect)?;
        let local = overlap.relative_to(&self.rect());
        let data = self
            .data
            .slice(s![local.y..local.bottom(), local.x..local.right()])
            .to_owned();
        Some(Raster::new(overlap.x, overlap.y, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_uses_global_coordinates() {
        let raster = Raster::new(10, 20, Array2::from_shape_fn((2, 3), |(r, c)| (r * 3 + c) as u16));
        assert_eq!(raster.sample(10, 20), Some(0));
        assert_eq!(raster.sample(12, 21), Some(5));
        assert_eq!(raster.sample(13, 21), None);
        assert_eq!(raster.sample(9, 20), None);
        assert_eq!(raster.rect(), PixelRect::new(10, 20, 3, 2));
        assert_eq!((raster.origin_x(), raster.origin_y()), (10, 20));
    }

    #[test]
    fn test_overlay_copies_only_the_intersection() {
        let mut canvas = Raster::filled(PixelRect::new(0, 0, 4, 4), 0);
        let tile = Raster::filled(PixelRect::new(2, 3, 5, 5), 7);
        let written = canvas.overlay(&tile);
        assert_eq!(written, Some(PixelRect::new(2, 3, 2, 1)));
        assert_eq!(canvas.sample(2, 3), Some(7));
        assert_eq!(canvas.sample(3, 3), Some(7));
        assert_eq!(canvas.sample(1, 3), Some(0));
        assert_eq!(canvas.sample(2, 2), Some(0));
    }

    #[test]
    fn test_later_overlay_wins() {
        let mut canvas = Raster::filled(PixelRect::new(0, 0, 4, 1), 0);
        canvas.overlay(&Raster::filled(PixelRect::new(0, 0, 3, 1), 1));
        canvas.overlay(&Raster::filled(PixelRect::new(2, 0, 2, 1), 2));
        assert_eq!(canvas.data().row(0).to_vec(), vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_disjoint_overlay_is_a_no_op() {
        let mut canvas = Raster::filled(PixelRect::new(0, 0, 2, 2), 3);
        assert_eq!(canvas.overlay(&Raster::filled(PixelRect::new(5, 5, 1, 1), 9)), None);
        assert!(canvas.data().iter().all(|&v| v == 3));
    }

    #[test]
    fn test_crop() {
        let raster = Raster::new(4, 4, Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as u16));
        let cropped = raster.crop(&PixelRect::new(6, 5, 10, 1)).unwrap();
        assert_eq!(cropped.rect(), PixelRect::new(6, 5, 2, 1));
        assert_eq!(cropped.data().row(0).to_vec(), vec![6, 7]);
    }
}
