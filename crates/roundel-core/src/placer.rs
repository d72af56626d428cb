//! Head-to-chest framing: scale the subject, drop it into the disc, clip.
//!
//! The subject's bounding-box height stands in for anatomy: the top
//! `head_to_chest_ratio` of it is assumed to run from head to chest, and the
//! whole crop is scaled so that span covers `target_span_fraction` of the disc.
//! The same factor drives both axes. If either axis then overflows the
//! margin-bounded box, the factor is shrunk to fit (the multiplier is capped at
//! `max_clamp_factor`). Wide subjects end up framed narrower than tall ones;
//! there is intentionally no separate branch for them.

use crate::bounds::{alpha_channel, find_bounds};
use crate::circle::{clip_to_mask, CircleBuilder};
use crate::color::Color;
use crate::enhance::SubjectEnhancer;
use crate::geometry::AvatarGeometry;
use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Where and how large the scaled subject lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f64,
    pub width: u32,
    pub height: u32,
    pub x: i64,
    pub y: i64,
}

/// Places a segmented subject inside the circular canvas.
#[derive(Debug, Clone)]
pub struct SubjectPlacer {
    geometry: AvatarGeometry,
    enhancer: SubjectEnhancer,
    circle: CircleBuilder,
}

impl SubjectPlacer {
    pub fn new(geometry: &AvatarGeometry) -> Self {
        Self {
            geometry: geometry.clone(),
            enhancer: SubjectEnhancer::new(geometry),
            circle: CircleBuilder::new(geometry),
        }
    }

    /// Final scale for a subject of the given (post-enhancement) size.
    pub fn scale_for(&self, width: u32, height: u32) -> f64 {
        let g = &self.geometry;
        let head_to_chest = (g.head_to_chest_ratio * height as f64).max(1.0);
        let mut scale = g.target_span() as f64 / head_to_chest;

        let max_extent = g.max_subject_extent() as f64;
        let new_w = (width as f64 * scale).trunc();
        let new_h = (height as f64 * scale).trunc();
        if new_w > 0.0 && new_h > 0.0 && (new_w > max_extent || new_h > max_extent) {
            let clamp = (max_extent / new_w)
                .min(max_extent / new_h)
                .min(g.max_clamp_factor);
            tracing::debug!(scale, clamp, new_w, new_h, max_extent, "clamping subject to margin box");
            scale *= clamp;
        }
        scale
    }

    /// Size and position for a subject, or `None` if the scale collapses an axis to zero.
    pub fn plan(&self, width: u32, height: u32) -> Option<Placement> {
        let scale = self.scale_for(width, height);
        let scaled_w = (width as f64 * scale) as u32;
        let scaled_h = (height as f64 * scale) as u32;
        if scaled_w == 0 || scaled_h == 0 {
            return None;
        }
        Some(Placement {
            scale,
            width: scaled_w,
            height: scaled_h,
            x: (self.geometry.target_width / 2) as i64 - (scaled_w / 2) as i64,
            y: self.geometry.subject_top(),
        })
    }

    /// Compose the avatar for `cutout` on a disc of `background`.
    ///
    /// Falls back to the plain disc when the cutout has no visible pixels or
    /// its scale degenerates.
    pub fn place(&self, cutout: &RgbaImage, background: Color) -> RgbaImage {
        let layers = self.circle.build(background);

        let Some(bbox) = find_bounds(&alpha_channel(cutout)) else {
            tracing::warn!(
                width = cutout.width(),
                height = cutout.height(),
                "cutout is fully transparent; returning plain disc"
            );
            return layers.disc;
        };

        let crop = imageops::crop_imm(cutout, bbox.x_min, bbox.y_min, bbox.width(), bbox.height())
            .to_image();
        let subject = self.enhancer.enhance(&crop);

        let Some(placement) = self.plan(subject.width(), subject.height()) else {
            tracing::warn!(
                width = subject.width(),
                height = subject.height(),
                "subject scale collapses to zero area; returning plain disc"
            );
            return layers.disc;
        };

        tracing::debug!(?bbox, ?placement, "placing subject");

        let scaled = imageops::resize(&subject, placement.width, placement.height, FilterType::Lanczos3);

        let mut canvas = layers.disc;
        imageops::overlay(&mut canvas, &scaled, placement.x, placement.y);
        clip_to_mask(&mut canvas, &layers.mask);
        canvas
    }
}
