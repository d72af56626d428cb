//! roundel-core — Circular avatar framing and compositing.
//!
//! Takes an already-segmented RGBA cutout of a person, scales it so the
//! head-to-chest region fills a fixed share of a colored disc, and clips
//! everything outside the disc to full transparency.

pub mod bounds;
pub mod circle;
pub mod color;
pub mod enhance;
pub mod geometry;
pub mod pipeline;
pub mod placer;
pub mod segment;
pub mod types;

pub use circle::{CircleBuilder, CircleLayers};
pub use color::{Color, ColorError};
pub use geometry::{AvatarGeometry, GeometryError};
pub use pipeline::{AvatarPipeline, PipelineError};
pub use segment::{AlphaMatte, SegmentationError, Segmenter};
pub use types::BoundingBox;
