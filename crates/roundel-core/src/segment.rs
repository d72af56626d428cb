//! Seam to the foreground-extraction collaborator.
//!
//! Segmentation itself lives outside this crate. A [`Segmenter`] turns raw
//! image bytes into an RGBA cutout whose alpha marks the subject; the
//! pipeline only ever sees that cutout.

use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("failed to decode input image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("segmentation failed: {0}")]
    Failed(String),
}

/// Foreground extraction: raw bytes in, alpha-matted cutout out.
pub trait Segmenter: Send + Sync {
    fn segment(&self, bytes: &[u8]) -> Result<RgbaImage, SegmentationError>;
}

/// Uses the image's own alpha channel as the matte.
///
/// Suitable for inputs that are already cut out (transparent PNG/WebP) and
/// for feeding a rendered avatar back through the pipeline. Opaque formats
/// decode with alpha 255 everywhere, so the whole frame becomes the subject.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaMatte;

impl Segmenter for AlphaMatte {
    fn segment(&self, bytes: &[u8]) -> Result<RgbaImage, SegmentationError> {
        let decoded = image::load_from_memory(bytes)?;
        tracing::debug!(
            width = decoded.width(),
            height = decoded.height(),
            color = ?decoded.color(),
            "decoded pre-segmented input"
        );
        Ok(decoded.to_rgba8())
    }
}
