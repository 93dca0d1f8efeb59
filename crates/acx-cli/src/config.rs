//! Layered configuration: defaults, `acx.toml`, `ACX_*` environment, CLI flags.
//!
//! Relative paths resolve against the working directory first and fall back to
//! the project root (`ACX_PROJECT_ROOT`, default: the working directory), so
//! the defaults work from anywhere inside a checkout.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "acx.toml";
pub const DEFAULT_MIN_LANDMARK_CONFIDENCE: f64 = 0.75;
pub const DEFAULT_MODEL_CANDIDATES: [&str; 2] = ["models/face_landmark.onnx", "face_landmark.onnx"];

/// Landmark backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ONNX face mesh network.
    #[default]
    #[value(name = "facemesh")]
    FaceMesh,
    /// Precomputed `<stem>.landmarks.json` files beside each image.
    Sidecar,
}

/// `[analyze]` section of `acx.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzeConfig {
    pub in_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Face metadata report consumed by `--only-missing`.
    pub missing_report: PathBuf,
    /// Defaults to `<out_dir>/unusable-images-report.json`.
    pub unusable_report: Option<PathBuf>,
    pub backend: Backend,
    pub model_path: Option<PathBuf>,
    pub min_face_confidence: f32,
    pub min_landmark_confidence: f64,
    pub mirror: bool,
    pub limit: usize,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            in_dir: PathBuf::from("input-images"),
            out_dir: PathBuf::from("processed-images"),
            missing_report: PathBuf::from("build/generated/missing-pose-metadata.json"),
            unusable_report: None,
            backend: Backend::default(),
            model_path: None,
            min_face_confidence: acx_core::facemesh::DEFAULT_MIN_FACE_CONFIDENCE,
            min_landmark_confidence: DEFAULT_MIN_LANDMARK_CONFIDENCE,
            mirror: false,
            limit: 0,
        }
    }
}

/// `[fetch]` section of `acx.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub keywords: PathBuf,
    pub out_dir: PathBuf,
    pub min_width: u32,
    pub min_height: u32,
    pub count: usize,
    pub delay_secs: f64,
    pub region: String,
    pub safesearch: acx_fetch::SafeSearch,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            keywords: PathBuf::from("keywords.csv"),
            out_dir: PathBuf::from("input-images"),
            min_width: acx_fetch::fetcher::DEFAULT_MIN_WIDTH,
            min_height: acx_fetch::fetcher::DEFAULT_MIN_HEIGHT,
            count: acx_fetch::fetcher::DEFAULT_IMAGE_COUNT,
            delay_secs: acx_fetch::fetcher::DEFAULT_DELAY.as_secs_f64(),
            region: acx_fetch::ddg::DEFAULT_REGION.to_string(),
            safesearch: acx_fetch::SafeSearch::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analyze: AnalyzeConfig,
    pub fetch: FetchConfig,
    /// Base for relative paths that do not exist from the working directory.
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Config {
    /// Load defaults, the config file and environment overrides.
    ///
    /// The file is `explicit` if given, else `ACX_CONFIG`, else `acx.toml` in
    /// the project root when present. A named file that is missing is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let project_root = std::env::var("ACX_PROJECT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("ACX_CONFIG").ok().map(PathBuf::from));

        let mut config = match named {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default_path = project_root.join(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.project_root = project_root;
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self) {
        if let Ok(model) = std::env::var("ACX_LANDMARKER_MODEL") {
            if !model.trim().is_empty() {
                self.analyze.model_path = Some(PathBuf::from(model));
            }
        }
        self.analyze.min_landmark_confidence =
            env_f64("ACX_MIN_LANDMARK_CONFIDENCE", self.analyze.min_landmark_confidence);
        self.analyze.min_face_confidence =
            env_f32("ACX_MIN_FACE_CONFIDENCE", self.analyze.min_face_confidence);
    }

    /// Resolve a relative path: working directory first, then project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_path(&self.project_root, path)
    }

    /// Model file: the configured path if any, else the first default
    /// candidate under the project root that exists.
    pub fn model_path(&self) -> PathBuf {
        if let Some(path) = &self.analyze.model_path {
            return self.resolve(path);
        }
        let candidates: Vec<PathBuf> = DEFAULT_MODEL_CANDIDATES
            .iter()
            .map(|c| self.project_root.join(c))
            .collect();
        candidates
            .iter()
            .find(|c| c.exists())
            .unwrap_or(&candidates[0])
            .clone()
    }
}

pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }
    project_root.join(path)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.analyze.backend, Backend::FaceMesh);
        assert!((config.analyze.min_landmark_confidence - 0.75).abs() < 1e-12);
        assert_eq!(config.fetch.min_width, 1000);
        assert_eq!(config.fetch.count, 1);
        assert_eq!(config.fetch.region, "wt-wt");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [analyze]
            backend = "sidecar"
            mirror = true
            limit = 5

            [fetch]
            count = 3
            safesearch = "off"
            "#,
        )
        .unwrap();
        assert_eq!(config.analyze.backend, Backend::Sidecar);
        assert!(config.analyze.mirror);
        assert_eq!(config.analyze.limit, 5);
        assert_eq!(config.analyze.in_dir, PathBuf::from("input-images"));
        assert_eq!(config.fetch.count, 3);
        assert_eq!(config.fetch.safesearch, acx_fetch::SafeSearch::Off);
        assert_eq!(config.fetch.min_height, 1000);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(Config::from_toml("[analyze]\nlimit = \"many\"").is_err());
        assert!(Config::from_file(Path::new("/nonexistent/acx.toml")).is_err());
    }

    #[test]
    fn test_resolve_path_prefers_existing_cwd_path() {
        let root = tempfile::tempdir().unwrap();
        // Absolute paths pass through.
        let abs = root.path().join("x");
        assert_eq!(resolve_path(Path::new("/elsewhere"), &abs), abs);
        // Cargo runs tests from the crate dir, where `src` exists.
        assert_eq!(resolve_path(root.path(), Path::new("src")), PathBuf::from("src"));
        assert_eq!(
            resolve_path(root.path(), Path::new("no-such-dir/images")),
            root.path().join("no-such-dir/images")
        );
    }

    #[test]
    fn test_model_path_candidates() {
        let root = tempfile::tempdir().unwrap();
        let mut config = Config {
            project_root: root.path().to_path_buf(),
            ..Default::default()
        };
        assert_eq!(config.model_path(), root.path().join("models/face_landmark.onnx"));

        std::fs::write(root.path().join("face_landmark.onnx"), b"onnx").unwrap();
        assert_eq!(config.model_path(), root.path().join("face_landmark.onnx"));

        config.analyze.model_path = Some(root.path().join("custom.onnx"));
        assert_eq!(config.model_path(), root.path().join("custom.onnx"));
    }
}
