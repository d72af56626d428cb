//! Colored disc layer and its matching binary clip mask.

use crate::color::Color;
use crate::geometry::AvatarGeometry;
use image::{GrayImage, Luma, Rgba, RgbaImage};

const MASK_INSIDE: u8 = 255;
const MASK_OUTSIDE: u8 = 0;

/// Co-registered canvas-sized layers for one fill color.
#[derive(Debug, Clone)]
pub struct CircleLayers {
    /// Transparent canvas with an opaque disc in the fill color.
    pub disc: RgbaImage,
    /// 255 inside the disc, 0 outside.
    pub mask: GrayImage,
}

/// Rasterizes the centered disc for a given canvas geometry.
///
/// Pixel `(x, y)` belongs to the disc when `(x - cx)² + (y - cy)² <= (D / 2)²`
/// with `(cx, cy) = (left + D / 2, top + D / 2)`, where the bounding square
/// starts at `(left, top) = ((TW - D) / 2, (TH - D) / 2)`.
#[derive(Debug, Clone, Copy)]
pub struct CircleBuilder {
    width: u32,
    height: u32,
    center_x: f64,
    center_y: f64,
    radius: f64,
}

impl CircleBuilder {
    pub fn new(geometry: &AvatarGeometry) -> Self {
        let (left, top) = geometry.circle_origin();
        let radius = geometry.diameter() as f64 / 2.0;
        Self {
            width: geometry.target_width,
            height: geometry.target_height,
            center_x: left as f64 + radius,
            center_y: top as f64 + radius,
            radius,
        }
    }

    /// Whether pixel `(x, y)` is inside the disc.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let dx = x as f64 - self.center_x;
        let dy = y as f64 - self.center_y;
        dx * dx + dy * dy <= self.radius * self.radius
    }

    pub fn mask(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.contains(x, y) { MASK_INSIDE } else { MASK_OUTSIDE }])
        })
    }

    pub fn build(&self, color: Color) -> CircleLayers {
        let mask = self.mask();
        let fill = color.to_rgba();
        let clear = Rgba([0, 0, 0, 0]);
        let disc = RgbaImage::from_fn(self.width, self.height, |x, y| {
            if mask.get_pixel(x, y).0[0] == MASK_INSIDE { fill } else { clear }
        });
        CircleLayers { disc, mask }
    }
}

/// Multiply a canvas's alpha by a mask, in place: `a' = a × m / 255`.
pub fn clip_to_mask(canvas: &mut RgbaImage, mask: &GrayImage) {
    debug_assert_eq!(canvas.dimensions(), mask.dimensions());
    for (px, m) in canvas.pixels_mut().zip(mask.pixels()) {
        px.0[3] = (px.0[3] as u16 * m.0[0] as u16 / 255) as u8;
    }
}
