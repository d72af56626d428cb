//! Batch rendering with per-item failure isolation.
//!
//! Every input is rendered on a blocking worker, bounded by a semaphore. A
//! failing item is logged and recorded in the report; its siblings carry on.

use anyhow::{Context, Result};
use image::ImageFormat;
use roundel_core::{AvatarPipeline, Color, Segmenter};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// One input file and the background it should be rendered on.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub input: PathBuf,
    pub output: PathBuf,
    pub color: Color,
}

/// Outcome for a single input.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub input: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<ItemOutcome>,
}

impl BatchReport {
    fn from_outcomes(items: Vec<ItemOutcome>) -> Self {
        let failed = items.iter().filter(|i| i.error.is_some()).count();
        Self {
            succeeded: items.len() - failed,
            failed,
            items,
        }
    }
}

/// Parse a `NAME=HEX` per-file color override.
pub fn parse_color_override(arg: &str) -> Result<(String, Color), String> {
    let (name, hex) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=COLOR, got {arg:?}"))?;
    if name.is_empty() {
        return Err(format!("missing file name in {arg:?}"));
    }
    let color = Color::from_hex(hex).map_err(|e| e.to_string())?;
    Ok((name.to_string(), color))
}

/// Pair each input with its color and a collision-free `<stem>.png` output path.
///
/// An override matches on the full file name or on the stem.
pub fn plan_items(
    inputs: &[PathBuf],
    out_dir: &Path,
    default_color: Color,
    overrides: &[(String, Color)],
) -> Vec<BatchItem> {
    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let file_name = input.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("avatar");
            let color = overrides
                .iter()
                .rev()
                .find(|(name, _)| name == file_name || name == stem)
                .map(|(_, c)| *c)
                .unwrap_or(default_color);

            let mut name = format!("{stem}.png");
            let mut n = 1;
            while !taken.insert(name.clone()) {
                name = format!("{stem}-{n}.png");
                n += 1;
            }
            BatchItem {
                input: input.clone(),
                output: out_dir.join(name),
                color,
            }
        })
        .collect()
}

/// Read, segment, render, and write one item.
pub fn process_item<S: Segmenter + ?Sized>(
    pipeline: &AvatarPipeline,
    segmenter: &S,
    item: &BatchItem,
) -> Result<()> {
    let bytes = std::fs::read(&item.input)
        .with_context(|| format!("reading {}", item.input.display()))?;
    let avatar = pipeline
        .render_bytes(segmenter, &bytes, item.color)
        .with_context(|| format!("rendering {}", item.input.display()))?;
    avatar
        .save_with_format(&item.output, ImageFormat::Png)
        .with_context(|| format!("writing {}", item.output.display()))?;
    Ok(())
}

/// Render all items with at most `jobs` running at once.
pub async fn run_batch<S: Segmenter + 'static>(
    pipeline: Arc<AvatarPipeline>,
    segmenter: Arc<S>,
    items: Vec<BatchItem>,
    jobs: usize,
) -> BatchReport {
    let permits = Arc::new(Semaphore::new(jobs.max(1)));
    let mut tasks = JoinSet::new();

    for (index, item) in items.iter().cloned().enumerate() {
        let pipeline = Arc::clone(&pipeline);
        let segmenter = Arc::clone(&segmenter);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let result = tokio::task::spawn_blocking(move || {
                process_item(&pipeline, segmenter.as_ref(), &item)
            })
            .await;
            (index, result)
        });
    }

    let mut slots: Vec<Option<Result<(), String>>> = vec![None; items.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(Ok(())))) => {
                tracing::info!(input = %items[index].input.display(), "rendered");
                slots[index] = Some(Ok(()));
            }
            Ok((index, Ok(Err(e)))) => {
                let message = format!("{e:#}");
                tracing::warn!(input = %items[index].input.display(), error = %message, "item failed");
                slots[index] = Some(Err(message));
            }
            Ok((index, Err(join_err))) => {
                tracing::error!(input = %items[index].input.display(), error = %join_err, "worker panicked");
                slots[index] = Some(Err(format!("worker panicked: {join_err}")));
            }
            Err(join_err) => {
                // Index is lost with the task; its slot is reported below.
                tracing::error!(error = %join_err, "batch task aborted");
            }
        }
    }

    collect_report(&items, slots)
}

/// Build the report; a slot with no recorded outcome counts as failed.
fn collect_report(items: &[BatchItem], slots: Vec<Option<Result<(), String>>>) -> BatchReport {
    let outcomes = items
        .iter()
        .zip(slots)
        .map(|(item, slot)| {
            let error = match slot {
                Some(Ok(())) => None,
                Some(Err(message)) => Some(message),
                None => Some("task aborted before reporting an outcome".to_string()),
            };
            ItemOutcome {
                input: item.input.display().to_string(),
                color: item.color.to_string(),
                output: error.is_none().then(|| item.output.display().to_string()),
                error,
            }
        })
        .collect();
    BatchReport::from_outcomes(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use roundel_core::{AlphaMatte, AvatarGeometry};

    #[test]
    fn test_parse_color_override() {
        let (name, color) = parse_color_override("alice.jpg=#112233").unwrap();
        assert_eq!(name, "alice.jpg");
        assert_eq!(color, Color::rgb(0x11, 0x22, 0x33));
        assert!(parse_color_override("alice.jpg").is_err());
        assert!(parse_color_override("=#fff").is_err());
        assert!(parse_color_override("bob=#ggg").is_err());
    }

    #[test]
    fn test_plan_items_colors_and_names() {
        let inputs = vec![
            PathBuf::from("in/alice.jpg"),
            PathBuf::from("in/bob.png"),
            PathBuf::from("other/alice.webp"),
        ];
        let default = Color::rgb(246, 246, 246);
        let overrides = vec![
            ("bob".to_string(), Color::rgb(0, 0, 0)),
            ("alice.webp".to_string(), Color::rgb(255, 0, 0)),
        ];
        let items = plan_items(&inputs, Path::new("out"), default, &overrides);

        assert_eq!(items[0].color, default);
        assert_eq!(items[0].output, PathBuf::from("out/alice.png"));
        assert_eq!(items[1].color, Color::rgb(0, 0, 0));
        assert_eq!(items[1].output, PathBuf::from("out/bob.png"));
        assert_eq!(items[2].color, Color::rgb(255, 0, 0));
        assert_eq!(items[2].output, PathBuf::from("out/alice-1.png"));
    }

    #[test]
    fn test_last_override_wins() {
        let inputs = vec![PathBuf::from("carol.png")];
        let overrides = vec![
            ("carol".to_string(), Color::rgb(1, 1, 1)),
            ("carol.png".to_string(), Color::rgb(2, 2, 2)),
        ];
        let items = plan_items(&inputs, Path::new("."), Color::rgb(0, 0, 0), &overrides);
        assert_eq!(items[0].color, Color::rgb(2, 2, 2));
    }

    #[test]
    fn test_unreported_slot_counts_as_failed() {
        let items = plan_items(
            &[PathBuf::from("a.png"), PathBuf::from("b.png"), PathBuf::from("c.png")],
            Path::new("out"),
            Color::rgb(0, 0, 0),
            &[],
        );
        let slots = vec![Some(Ok(())), None, Some(Err("boom".to_string()))];
        let report = collect_report(&items, slots);

        assert_eq!((report.succeeded, report.failed), (1, 2));
        assert!(report.items[0].output.is_some());
        assert!(report.items[1].output.is_none());
        assert!(report.items[1].error.as_deref().unwrap_or("").contains("aborted"));
        assert_eq!(report.items[2].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let dir = std::env::temp_dir().join(format!("roundel-batch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let cutout = RgbaImage::from_fn(120, 160, |x, y| {
            if (30..90).contains(&x) && (20..150).contains(&y) {
                Rgba([200, 150, 120, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        let good = dir.join("good.png");
        cutout.save(&good).unwrap();
        let empty = dir.join("empty.png");
        RgbaImage::new(40, 40).save(&empty).unwrap();
        let broken = dir.join("broken.png");
        std::fs::write(&broken, b"not a png").unwrap();
        let missing = dir.join("missing.png");

        let inputs = vec![good, broken, empty, missing];
        let items = plan_items(&inputs, &dir.join("out"), Color::rgb(246, 246, 246), &[]);
        std::fs::create_dir_all(dir.join("out")).unwrap();

        let pipeline = Arc::new(AvatarPipeline::new(AvatarGeometry::default()).unwrap());
        let report = run_batch(pipeline, Arc::new(AlphaMatte), items.clone(), 2).await;

        assert_eq!(report.succeeded, 2, "{report:?}");
        assert_eq!(report.failed, 2);
        assert!(report.items[0].error.is_none());
        assert!(report.items[1].error.is_some());
        assert!(report.items[2].error.is_none());
        assert!(report.items[3].error.as_deref().unwrap_or("").contains("reading"));

        let written = image::open(&items[0].output).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (689, 688));
        assert_eq!(written.get_pixel(0, 0).0[3], 0);

        std::fs::remove_dir_all(&dir).ok();
    }
}
