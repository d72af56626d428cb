//! Top-level avatar rendering entry point.
//!
//! Caps oversized cutouts, hands them to the [`SubjectPlacer`], and makes
//! sure the result is exactly the configured canvas size. Rendering never
//! mutates the caller's image and keeps no state between calls.

use crate::circle::CircleBuilder;
use crate::color::{Color, ColorError};
use crate::geometry::{AvatarGeometry, GeometryError};
use crate::placer::SubjectPlacer;
use crate::segment::{SegmentationError, Segmenter};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid background color: {0}")]
    InvalidColor(#[from] ColorError),
    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
}

/// Renders segmented cutouts into circular avatars for one geometry.
#[derive(Debug, Clone)]
pub struct AvatarPipeline {
    geometry: AvatarGeometry,
    placer: SubjectPlacer,
    circle: CircleBuilder,
}

impl AvatarPipeline {
    /// Build a pipeline, rejecting geometry that would break placement.
    pub fn new(geometry: AvatarGeometry) -> Result<Self, PipelineError> {
        geometry.validate()?;
        Ok(Self {
            placer: SubjectPlacer::new(&geometry),
            circle: CircleBuilder::new(&geometry),
            geometry,
        })
    }

    pub fn geometry(&self) -> &AvatarGeometry {
        &self.geometry
    }

    /// Render an already-segmented cutout onto a disc of `background`.
    pub fn render(&self, cutout: &RgbaImage, background: Color) -> RgbaImage {
        let working = limit_dimensions(cutout, self.geometry.max_input_dimension);
        let composed = self.placer.place(&working, background);

        let (tw, th) = (self.geometry.target_width, self.geometry.target_height);
        let out = if composed.dimensions() == (tw, th) {
            composed
        } else {
            tracing::warn!(
                got = ?composed.dimensions(),
                want = ?(tw, th),
                "composed canvas drifted from target size; resizing"
            );
            imageops::resize(&composed, tw, th, FilterType::Lanczos3)
        };

        tracing::info!(
            input = ?cutout.dimensions(),
            output = ?out.dimensions(),
            background = %background,
            "avatar rendered"
        );
        out
    }

    /// Like [`render`](Self::render), parsing the background from a hex string.
    pub fn render_hex(&self, cutout: &RgbaImage, background: &str) -> Result<RgbaImage, PipelineError> {
        let color = Color::from_hex(background)?;
        Ok(self.render(cutout, color))
    }

    /// Segment raw image bytes with `segmenter`, then render.
    pub fn render_bytes<S: Segmenter + ?Sized>(
        &self,
        segmenter: &S,
        bytes: &[u8],
        background: Color,
    ) -> Result<RgbaImage, PipelineError> {
        let cutout = segmenter.segment(bytes)?;
        Ok(self.render(&cutout, background))
    }

    /// The colored disc alone, as produced for an empty cutout.
    pub fn plain_disc(&self, background: Color) -> RgbaImage {
        self.circle.build(background).disc
    }
}

/// Proportionally shrink `image` so its longer side is at most `max_side`.
fn limit_dimensions(image: &RgbaImage, max_side: u32) -> Cow<'_, RgbaImage> {
    let (w, h) = image.dimensions();
    let longest = w.max(h);
    if longest <= max_side {
        return Cow::Borrowed(image);
    }
    let new_w = ((w as u64 * max_side as u64 / longest as u64) as u32).max(1);
    let new_h = ((h as u64 * max_side as u64 / longest as u64) as u32).max(1);
    tracing::debug!(from = ?(w, h), to = ?(new_w, new_h), "downscaling oversized cutout");
    Cow::Owned(imageops::resize(image, new_w, new_h, FilterType::Lanczos3))
}
