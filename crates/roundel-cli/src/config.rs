use crate::cache::DEFAULT_BUDGET_BYTES;
use anyhow::{Context, Result};
use roundel_core::AvatarGeometry;
use std::path::{Path, PathBuf};

const DEFAULT_COLOR: &str = "#F6F6F6";
const DEFAULT_OUT_DIR: &str = "avatars";

/// CLI configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Background color used when an input has no override (default: #F6F6F6).
    pub default_color: String,
    /// Directory batch outputs are written to.
    pub out_dir: PathBuf,
    /// Maximum number of images rendered concurrently.
    pub jobs: usize,
    /// Optional TOML file overriding the canvas geometry.
    pub geometry_path: Option<PathBuf>,
    /// Whether to memoize segmentation results by input content.
    pub cache_segmentation: bool,
    /// Upper bound on encoded bytes the segmentation cache retains.
    pub cache_budget_bytes: usize,
}

impl Config {
    /// Load configuration from `ROUNDEL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default_jobs = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            default_color: lookup("ROUNDEL_DEFAULT_COLOR").unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            out_dir: lookup("ROUNDEL_OUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR)),
            jobs: parse_or(lookup("ROUNDEL_JOBS"), default_jobs).max(1),
            geometry_path: lookup("ROUNDEL_GEOMETRY").map(PathBuf::from),
            cache_segmentation: lookup("ROUNDEL_CACHE")
                .map(|v| v != "0")
                .unwrap_or(true),
            cache_budget_bytes: parse_or(lookup("ROUNDEL_CACHE_BYTES"), DEFAULT_BUDGET_BYTES),
        }
    }

    /// Resolve the canvas geometry: the given file, else `ROUNDEL_GEOMETRY`, else defaults.
    pub fn load_geometry(&self, override_path: Option<&Path>) -> Result<AvatarGeometry> {
        match override_path.or(self.geometry_path.as_deref()) {
            Some(path) => {
                let src = std::fs::read_to_string(path)
                    .with_context(|| format!("reading geometry file {}", path.display()))?;
                let geometry = AvatarGeometry::from_toml_str(&src)
                    .with_context(|| format!("parsing geometry file {}", path.display()))?;
                tracing::info!(path = %path.display(), "loaded geometry");
                Ok(geometry)
            }
            None => Ok(AvatarGeometry::default()),
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config_with(&[]);
        assert_eq!(c.default_color, "#F6F6F6");
        assert_eq!(c.out_dir, PathBuf::from("avatars"));
        assert!(c.jobs >= 1);
        assert!(c.geometry_path.is_none());
        assert!(c.cache_segmentation);
        assert_eq!(c.cache_budget_bytes, DEFAULT_BUDGET_BYTES);
    }

    #[test]
    fn test_overrides() {
        let c = config_with(&[
            ("ROUNDEL_DEFAULT_COLOR", "#000"),
            ("ROUNDEL_OUT_DIR", "/tmp/out"),
            ("ROUNDEL_JOBS", "3"),
            ("ROUNDEL_GEOMETRY", "geo.toml"),
            ("ROUNDEL_CACHE", "0"),
            ("ROUNDEL_CACHE_BYTES", "1048576"),
        ]);
        assert_eq!(c.default_color, "#000");
        assert_eq!(c.out_dir, PathBuf::from("/tmp/out"));
        assert_eq!(c.jobs, 3);
        assert_eq!(c.geometry_path, Some(PathBuf::from("geo.toml")));
        assert!(!c.cache_segmentation);
        assert_eq!(c.cache_budget_bytes, 1_048_576);
    }

    #[test]
    fn test_bad_jobs_falls_back() {
        let c = config_with(&[("ROUNDEL_JOBS", "many")]);
        assert!(c.jobs >= 1);
        let zero = config_with(&[("ROUNDEL_JOBS", "0")]);
        assert_eq!(zero.jobs, 1);
    }

    #[test]
    fn test_default_geometry_without_file() {
        let g = config_with(&[]).load_geometry(None).unwrap();
        assert_eq!(g, AvatarGeometry::default());
    }

    #[test]
    fn test_missing_geometry_file_errors() {
        let c = config_with(&[("ROUNDEL_GEOMETRY", "/nonexistent/roundel-geometry.toml")]);
        assert!(c.load_geometry(None).is_err());
    }
}
