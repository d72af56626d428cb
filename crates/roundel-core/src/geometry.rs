//! Canvas geometry — the framing parameters shared by every pipeline stage.
//!
//! All values are immutable once a pipeline is built. The defaults describe a
//! 689×688 canvas with a 688px disc; a TOML file may override any subset.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Named constants (defaults for a 689×688 avatar) ---
const DEFAULT_TARGET_WIDTH: u32 = 689;
const DEFAULT_TARGET_HEIGHT: u32 = 688;
const DEFAULT_MARGIN_FRACTION: f64 = 0.08;
const DEFAULT_HEAD_TO_CHEST_RATIO: f64 = 0.35;
const DEFAULT_TARGET_SPAN_FRACTION: f64 = 0.62;
const DEFAULT_MAX_CLAMP_FACTOR: f64 = 2.0;
const DEFAULT_MAX_INPUT_DIMENSION: u32 = 2200;
const DEFAULT_SMALL_SUBJECT_THRESHOLD: u32 = 450;
const DEFAULT_MIN_UPSCALE: f64 = 1.3;
const DEFAULT_MAX_UPSCALE: f64 = 2.0;
const DEFAULT_SHARPEN_RADIUS: f32 = 2.0;
const DEFAULT_SHARPEN_AMOUNT: f32 = 1.8;
const DEFAULT_SHARPEN_THRESHOLD: u8 = 3;

#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("canvas must be non-empty, got {width}x{height}")]
    EmptyCanvas { width: u32, height: u32 },
    #[error("{name} must be within {min}..={max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{name} must be positive")]
    NotPositive { name: &'static str },
    #[error("upscale range is inverted: min {min} > max {max}")]
    InvertedUpscaleRange { min: f64, max: f64 },
    #[error("margin of {margin}px leaves no room inside a {diameter}px disc")]
    MarginTooLarge { margin: u32, diameter: u32 },
    #[error("invalid geometry TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Framing parameters for one avatar size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarGeometry {
    /// Output canvas width in pixels.
    pub target_width: u32,
    /// Output canvas height in pixels.
    pub target_height: u32,
    /// Margin as a fraction of the disc diameter.
    pub margin_fraction: f64,
    /// Share of the subject's height assumed to run from head top to chest.
    pub head_to_chest_ratio: f64,
    /// Share of the diameter the head-to-chest span should cover.
    pub target_span_fraction: f64,
    /// Upper bound on the fit-to-box clamp multiplier.
    pub max_clamp_factor: f64,
    /// Cutouts with a longer side above this are downscaled first.
    pub max_input_dimension: u32,
    /// Subjects whose shorter side is below this get upsampled.
    pub small_subject_threshold: u32,
    pub min_upscale: f64,
    pub max_upscale: f64,
    /// Gaussian sigma of the unsharp mask.
    pub sharpen_radius: f32,
    /// Unsharp gain; 1.8 adds 180% of the high-pass detail.
    pub sharpen_amount: f32,
    /// Minimum per-channel difference before sharpening applies.
    pub sharpen_threshold: u8,
}

impl Default for AvatarGeometry {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            target_height: DEFAULT_TARGET_HEIGHT,
            margin_fraction: DEFAULT_MARGIN_FRACTION,
            head_to_chest_ratio: DEFAULT_HEAD_TO_CHEST_RATIO,
            target_span_fraction: DEFAULT_TARGET_SPAN_FRACTION,
            max_clamp_factor: DEFAULT_MAX_CLAMP_FACTOR,
            max_input_dimension: DEFAULT_MAX_INPUT_DIMENSION,
            small_subject_threshold: DEFAULT_SMALL_SUBJECT_THRESHOLD,
            min_upscale: DEFAULT_MIN_UPSCALE,
            max_upscale: DEFAULT_MAX_UPSCALE,
            sharpen_radius: DEFAULT_SHARPEN_RADIUS,
            sharpen_amount: DEFAULT_SHARPEN_AMOUNT,
            sharpen_threshold: DEFAULT_SHARPEN_THRESHOLD,
        }
    }
}

impl AvatarGeometry {
    /// Default framing on a canvas of a different size.
    pub fn with_canvas(width: u32, height: u32) -> Self {
        Self {
            target_width: width,
            target_height: height,
            ..Self::default()
        }
    }

    /// Parse a (possibly partial) TOML table and validate the result.
    pub fn from_toml_str(src: &str) -> Result<Self, GeometryError> {
        let geometry: Self = toml::from_str(src)?;
        geometry.validate()?;
        Ok(geometry)
    }

    /// Disc diameter D = min(TW, TH).
    pub fn diameter(&self) -> u32 {
        self.target_width.min(self.target_height)
    }

    /// Margin MG = round(margin_fraction × D).
    pub fn margin(&self) -> u32 {
        (self.margin_fraction * self.diameter() as f64).round() as u32
    }

    /// Desired head-to-chest height in output pixels.
    pub fn target_span(&self) -> u32 {
        (self.target_span_fraction * self.diameter() as f64).round() as u32
    }

    /// Largest width or height a placed subject may have: D − 2·MG.
    pub fn max_subject_extent(&self) -> u32 {
        self.diameter().saturating_sub(2 * self.margin())
    }

    /// Top-left corner of the disc's bounding square.
    pub fn circle_origin(&self) -> (u32, u32) {
        let d = self.diameter();
        ((self.target_width - d) / 2, (self.target_height - d) / 2)
    }

    /// Row at which a placed subject's top edge sits.
    pub fn subject_top(&self) -> i64 {
        let circle_top = (self.target_height / 2) as i64 - (self.diameter() / 2) as i64;
        circle_top + self.margin() as i64
    }

    /// Check every invariant the pipeline relies on.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(GeometryError::EmptyCanvas {
                width: self.target_width,
                height: self.target_height,
            });
        }
        check_range("margin_fraction", self.margin_fraction, 0.0, 0.5)?;
        check_range("head_to_chest_ratio", self.head_to_chest_ratio, f64::MIN_POSITIVE, 1.0)?;
        check_range("target_span_fraction", self.target_span_fraction, f64::MIN_POSITIVE, 1.0)?;
        check_range("max_clamp_factor", self.max_clamp_factor, f64::MIN_POSITIVE, f64::MAX)?;
        check_range("min_upscale", self.min_upscale, 1.0, f64::MAX)?;
        check_range("max_upscale", self.max_upscale, 1.0, f64::MAX)?;
        if self.min_upscale > self.max_upscale {
            return Err(GeometryError::InvertedUpscaleRange {
                min: self.min_upscale,
                max: self.max_upscale,
            });
        }
        if self.max_input_dimension == 0 {
            return Err(GeometryError::NotPositive { name: "max_input_dimension" });
        }
        check_range("sharpen_radius", self.sharpen_radius as f64, 0.0, f64::MAX)?;
        check_range("sharpen_amount", self.sharpen_amount as f64, 0.0, f64::MAX)?;
        if self.max_subject_extent() == 0 {
            return Err(GeometryError::MarginTooLarge {
                margin: self.margin(),
                diameter: self.diameter(),
            });
        }
        Ok(())
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), GeometryError> {
    // NaN fails both comparisons, so test for containment rather than exclusion.
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(GeometryError::OutOfRange { name, value, min, max })
    }
}
