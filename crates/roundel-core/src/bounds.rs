//! Subject extent from an alpha matte.

use crate::types::BoundingBox;
use image::{GrayImage, Luma, RgbaImage};

/// Copy the alpha channel of a cutout into a single-channel mask.
pub fn alpha_channel(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y).0[3]])
    })
}

/// Smallest box enclosing every pixel with a non-zero mask value.
///
/// Returns `None` for a fully transparent (or empty) mask.
pub fn find_bounds(mask: &GrayImage) -> Option<BoundingBox> {
    let mut x_min = u32::MAX;
    let mut y_min = u32::MAX;
    let mut x_max = 0u32;
    let mut y_max = 0u32;
    let mut any = false;

    for (x, y, px) in mask.enumerate_pixels() {
        if px.0[0] > 0 {
            any = true;
            x_min = x_min.min(x);
            y_min = y_min.min(y);
            x_max = x_max.max(x);
            y_max = y_max.max(y);
        }
    }

    if !any {
        return None;
    }
    BoundingBox::new(x_min, y_min, x_max + 1, y_max + 1)
}
