//! Light clean-up for small or soft subject crops.
//!
//! Crops whose shorter side falls below a threshold are upsampled with a
//! Lanczos filter, then every crop gets an unsharp mask. Both steps are
//! deterministic and allocate a fresh buffer.

use crate::geometry::AvatarGeometry;
use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Upsample-and-sharpen stage applied to the cropped subject.
#[derive(Debug, Clone)]
pub struct SubjectEnhancer {
    small_threshold: u32,
    min_upscale: f64,
    max_upscale: f64,
    sharpen_radius: f32,
    sharpen_amount: f32,
    sharpen_threshold: u8,
}

impl SubjectEnhancer {
    pub fn new(geometry: &AvatarGeometry) -> Self {
        Self {
            small_threshold: geometry.small_subject_threshold,
            min_upscale: geometry.min_upscale,
            max_upscale: geometry.max_upscale,
            sharpen_radius: geometry.sharpen_radius,
            sharpen_amount: geometry.sharpen_amount,
            sharpen_threshold: geometry.sharpen_threshold,
        }
    }

    /// Uniform factor for a crop of the given size; 1.0 when it is large enough.
    pub fn upscale_factor(&self, width: u32, height: u32) -> f64 {
        let short = width.min(height);
        if short >= self.small_threshold {
            return 1.0;
        }
        (self.small_threshold as f64 / short.max(1) as f64).clamp(self.min_upscale, self.max_upscale)
    }

    pub fn enhance(&self, subject: &RgbaImage) -> RgbaImage {
        let (w, h) = subject.dimensions();
        let factor = self.upscale_factor(w, h);

        let upscaled = if factor > 1.0 {
            let new_w = ((w as f64 * factor) as u32).max(1);
            let new_h = ((h as f64 * factor) as u32).max(1);
            tracing::debug!(from = ?(w, h), to = ?(new_w, new_h), factor, "upscaling small subject");
            Some(imageops::resize(subject, new_w, new_h, FilterType::Lanczos3))
        } else {
            None
        };

        unsharp_mask(
            upscaled.as_ref().unwrap_or(subject),
            self.sharpen_radius,
            self.sharpen_amount,
            self.sharpen_threshold,
        )
    }
}

/// Classic unsharp mask on the color channels; alpha passes through untouched.
///
/// For each channel, `diff = original - gaussian(original)`; where
/// `|diff| >= threshold` the output is `original + amount × diff`.
pub fn unsharp_mask(image: &RgbaImage, radius: f32, amount: f32, threshold: u8) -> RgbaImage {
    let mut out = image.clone();
    if radius <= 0.0 || amount <= 0.0 || image.width() == 0 || image.height() == 0 {
        return out;
    }

    let blurred = imageops::blur(image, radius);
    for (px, soft) in out.pixels_mut().zip(blurred.pixels()) {
        for c in 0..3 {
            let orig = px.0[c] as i32;
            let diff = orig - soft.0[c] as i32;
            if diff.abs() >= threshold as i32 {
                let sharpened = orig as f32 + amount * diff as f32;
                px.0[c] = sharpened.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn enhancer() -> SubjectEnhancer {
        SubjectEnhancer::new(&AvatarGeometry::default())
    }

    #[test]
    fn test_factor_large_subject() {
        assert_eq!(enhancer().upscale_factor(450, 900), 1.0);
        assert_eq!(enhancer().upscale_factor(1200, 800), 1.0);
    }

    #[test]
    fn test_factor_clamped_to_range() {
        let e = enhancer();
        // 450 / 100 = 4.5 → capped at 2.0
        assert_eq!(e.upscale_factor(100, 300), 2.0);
        // 450 / 400 = 1.125 → raised to 1.3
        assert!((e.upscale_factor(400, 600) - 1.3).abs() < 1e-12);
        // 450 / 300 = 1.5 stays
        assert!((e.upscale_factor(300, 400) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_factor_zero_side() {
        assert_eq!(enhancer().upscale_factor(0, 10), 2.0);
    }

    #[test]
    fn test_small_subject_doubles() {
        let subject = RgbaImage::from_pixel(100, 150, Rgba([90, 120, 150, 255]));
        let out = enhancer().enhance(&subject);
        assert_eq!(out.dimensions(), (200, 300));
        assert_eq!(out.width().min(out.height()), 200);
    }

    #[test]
    fn test_lower_bound_upscale() {
        let subject = RgbaImage::from_pixel(400, 420, Rgba([90, 120, 150, 255]));
        let out = enhancer().enhance(&subject);
        let short = out.width().min(out.height());
        assert!((519..=520).contains(&short), "short side {short}");
    }

    #[test]
    fn test_large_subject_keeps_size() {
        let subject = RgbaImage::from_pixel(500, 460, Rgba([10, 20, 30, 255]));
        let out = enhancer().enhance(&subject);
        assert_eq!(out.dimensions(), (500, 460));
    }

    #[test]
    fn test_unsharp_uniform_is_identity() {
        let img = RgbaImage::from_pixel(20, 20, Rgba([128, 64, 32, 255]));
        let out = unsharp_mask(&img, 2.0, 1.8, 3);
        assert_eq!(out, img);
    }

    #[test]
    fn test_unsharp_increases_edge_contrast() {
        // Vertical step edge: dark left half, light right half
        let img = RgbaImage::from_fn(40, 10, |x, _| {
            if x < 20 { Rgba([80, 80, 80, 255]) } else { Rgba([160, 160, 160, 255]) }
        });
        let out = unsharp_mask(&img, 2.0, 1.8, 3);
        assert!(out.get_pixel(19, 5).0[0] < 80, "dark side should darken near edge");
        assert!(out.get_pixel(20, 5).0[0] > 160, "light side should brighten near edge");
        // Far from the edge nothing changes
        assert_eq!(out.get_pixel(0, 5).0[0], 80);
        assert_eq!(out.get_pixel(39, 5).0[0], 160);
    }

    #[test]
    fn test_unsharp_preserves_alpha() {
        let img = RgbaImage::from_fn(16, 16, |x, _| {
            if x < 8 { Rgba([0, 0, 0, 0]) } else { Rgba([200, 200, 200, 255]) }
        });
        let out = unsharp_mask(&img, 2.0, 1.8, 3);
        for (a, b) in img.pixels().zip(out.pixels()) {
            assert_eq!(a.0[3], b.0[3]);
        }
    }

    #[test]
    fn test_unsharp_disabled() {
        let img = RgbaImage::from_fn(8, 8, |x, y| Rgba([(x * 30) as u8, (y * 30) as u8, 0, 255]));
        assert_eq!(unsharp_mask(&img, 0.0, 1.8, 3), img);
        assert_eq!(unsharp_mask(&img, 2.0, 0.0, 3), img);
    }
}
