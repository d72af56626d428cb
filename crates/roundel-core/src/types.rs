use serde::{Deserialize, Serialize};

/// Tight integer rectangle around the visible part of a cutout.
///
/// Coordinates are in pixels of the source image; `x_max` and `y_max` are
/// exclusive, so a single opaque pixel at (3, 4) yields `3..4 × 4..5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl BoundingBox {
    /// Build a box, rejecting empty or inverted extents.
    pub fn new(x_min: u32, y_min: u32, x_max: u32, y_max: u32) -> Option<Self> {
        if x_min < x_max && y_min < y_max {
            Some(Self { x_min, y_min, x_max, y_max })
        } else {
            None
        }
    }

    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }

    /// Whether the box lies entirely within an image of the given size.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x_max <= width && self.y_max <= height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_extent() {
        let b = BoundingBox::new(10, 20, 40, 100).unwrap();
        assert_eq!(b.width(), 30);
        assert_eq!(b.height(), 80);
        assert!(b.fits_within(40, 100));
        assert!(!b.fits_within(39, 100));
    }

    #[test]
    fn test_bbox_rejects_empty() {
        assert!(BoundingBox::new(5, 5, 5, 10).is_none());
        assert!(BoundingBox::new(5, 5, 10, 5).is_none());
        assert!(BoundingBox::new(6, 0, 5, 1).is_none());
    }
}
