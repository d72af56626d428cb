use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use image::ImageFormat;
use roundel_core::{AlphaMatte, AvatarGeometry, AvatarPipeline, Color};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod batch;
mod cache;
mod config;

use cache::SegmentationCache;
use config::Config;

#[derive(Parser)]
#[command(name = "roundel", about = "Frame cut-out portraits as circular avatars")]
struct Cli {
    /// Geometry TOML file (overrides ROUNDEL_GEOMETRY)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one cut-out image into an avatar PNG
    Render {
        /// Pre-segmented input image (alpha marks the subject)
        input: PathBuf,
        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
        /// Background color, e.g. "#F6F6F6" or "#abc"
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Render many images, each with its own background color
    Batch {
        inputs: Vec<PathBuf>,
        /// Output directory (overrides ROUNDEL_OUT_DIR)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
        /// Default background color for every input
        #[arg(short, long)]
        color: Option<String>,
        /// Per-file color, matched on file name or stem (repeatable)
        #[arg(long = "color-for", value_name = "NAME=COLOR", value_parser = batch::parse_color_override)]
        color_for: Vec<(String, Color)>,
        /// Maximum concurrent renders (overrides ROUNDEL_JOBS)
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Write the JSON report here instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
        /// Disable segmentation memoization
        #[arg(long)]
        no_cache: bool,
    },
    /// Write the plain colored disc
    Disc {
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Print the resolved canvas geometry
    Geometry,
}

/// Geometry plus the values derived from it.
#[derive(Serialize)]
struct GeometrySummary<'a> {
    #[serde(flatten)]
    geometry: &'a AvatarGeometry,
    diameter: u32,
    margin: u32,
    target_span: u32,
    max_subject_extent: u32,
    circle_origin: (u32, u32),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let geometry = config.load_geometry(cli.config.as_deref())?;
    let pipeline = AvatarPipeline::new(geometry).context("invalid geometry")?;

    match cli.command {
        Commands::Render { input, output, color } => {
            let color = resolve_color(color.as_deref(), &config)?;
            let bytes = std::fs::read(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let avatar = pipeline.render_bytes(&AlphaMatte, &bytes, color)?;
            avatar
                .save_with_format(&output, ImageFormat::Png)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("{}", output.display());
        }
        Commands::Batch {
            inputs,
            out_dir,
            color,
            color_for,
            jobs,
            report,
            no_cache,
        } => {
            if inputs.is_empty() {
                bail!("no input images given");
            }
            let default_color = resolve_color(color.as_deref(), &config)?;
            let out_dir = out_dir.unwrap_or_else(|| config.out_dir.clone());
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;

            let items = batch::plan_items(&inputs, &out_dir, default_color, &color_for);
            let jobs = jobs.unwrap_or(config.jobs);
            let pipeline = Arc::new(pipeline);
            tracing::info!(count = items.len(), jobs, out_dir = %out_dir.display(), "starting batch");

            let summary = if no_cache || !config.cache_segmentation {
                batch::run_batch(pipeline, Arc::new(AlphaMatte), items, jobs).await
            } else {
                let cache = Arc::new(SegmentationCache::with_budget(
                    AlphaMatte,
                    config.cache_budget_bytes,
                ));
                let summary = batch::run_batch(pipeline, Arc::clone(&cache), items, jobs).await;
                tracing::info!(
                    hits = cache.hits(),
                    misses = cache.misses(),
                    entries = cache.len(),
                    retained_bytes = cache.retained_bytes(),
                    "segmentation cache"
                );
                summary
            };

            let json = serde_json::to_string_pretty(&summary)?;
            match report {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("writing report {}", path.display()))?,
                None => println!("{json}"),
            }

            tracing::info!(succeeded = summary.succeeded, failed = summary.failed, "batch finished");
            if summary.succeeded == 0 {
                bail!("all {} inputs failed", summary.failed);
            }
        }
        Commands::Disc { output, color } => {
            let color = resolve_color(color.as_deref(), &config)?;
            pipeline
                .plain_disc(color)
                .save_with_format(&output, ImageFormat::Png)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("{}", output.display());
        }
        Commands::Geometry => {
            let g = pipeline.geometry();
            let summary = GeometrySummary {
                geometry: g,
                diameter: g.diameter(),
                margin: g.margin(),
                target_span: g.target_span(),
                max_subject_extent: g.max_subject_extent(),
                circle_origin: g.circle_origin(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

/// Flag value if given, else the configured default. Never substitutes on parse failure.
fn resolve_color(flag: Option<&str>, config: &Config) -> Result<Color> {
    let value = flag.unwrap_or(&config.default_color);
    Color::from_hex(value).with_context(|| format!("background color {value:?}"))
}
