//! Landmark backends.
//!
//! A [`Landmarker`] turns a decoded image into at most one face [`Detection`].
//! Two backends exist: the ONNX [`FaceMesh`](crate::facemesh::FaceMesh) network,
//! and [`Sidecar`], which reads landmarks produced by an external tool.

use crate::types::{Detection, Landmark, TransformMatrix};
use image::DynamicImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LandmarkerError {
    #[error("model file not found: {0}; export a face mesh ONNX model and point --model-path at it")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("landmark sidecar not found: {0}")]
    SidecarMissing(String),
    #[error("landmark sidecar {path} is invalid: {source}")]
    SidecarInvalid {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

impl LandmarkerError {
    /// Short stable name used to tally failures in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            LandmarkerError::ModelNotFound(_) => "model_not_found",
            LandmarkerError::InferenceFailed(_) => "inference_failed",
            LandmarkerError::SidecarMissing(_) => "sidecar_missing",
            LandmarkerError::SidecarInvalid { .. } => "sidecar_invalid",
            LandmarkerError::Io(_) => "io",
            LandmarkerError::Ort(_) => "ort",
        }
    }
}

/// A face landmark backend.
pub trait Landmarker {
    fn name(&self) -> &str;

    /// Locate the most prominent face in `image`.
    ///
    /// `source` is the path the image was decoded from; backends that read
    /// precomputed results use it to find them. Returns `Ok(None)` when no face
    /// is present.
    fn detect(
        &mut self,
        image: &DynamicImage,
        source: &Path,
    ) -> Result<Option<Detection>, LandmarkerError>;

    /// Whether detection looks at `image` at all. Resampled second passes are
    /// skipped for backends that return `false`.
    fn needs_pixels(&self) -> bool {
        true
    }
}

/// JSON layout of a landmark sidecar file.
#[derive(Debug, Deserialize)]
struct SidecarFile {
    #[serde(default = "default_score")]
    score: f32,
    #[serde(default)]
    landmarks: Vec<Landmark>,
    #[serde(default)]
    transform: Option<[f32; 16]>,
}

fn default_score() -> f32 {
    1.0
}

/// Reads landmarks precomputed by an external tool.
///
/// For `photos/alice_1.jpg` the sidecar is `photos/alice_1.landmarks.json`:
///
/// ```json
/// { "score": 0.97,
///   "landmarks": [{ "x": 0.41, "y": 0.38, "z": -0.02, "visibility": 0.99, "presence": 0.99 }],
///   "transform": [1, 0, 0, 0,  0, 1, 0, 0,  0, 0, 1, 0,  0, 0, 0, 1] }
/// ```
///
/// An empty landmark list means no face was found.
#[derive(Debug, Default)]
pub struct Sidecar;

impl Sidecar {
    pub const SUFFIX: &'static str = ".landmarks.json";

    pub fn sidecar_path(source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        source.with_file_name(format!("{stem}{}", Self::SUFFIX))
    }
}

impl Landmarker for Sidecar {
    fn name(&self) -> &str {
        "sidecar"
    }

    fn needs_pixels(&self) -> bool {
        false
    }

    fn detect(
        &mut self,
        _image: &DynamicImage,
        source: &Path,
    ) -> Result<Option<Detection>, LandmarkerError> {
        let path = Self::sidecar_path(source);
        if !path.exists() {
            return Err(LandmarkerError::SidecarMissing(path.display().to_string()));
        }

        let raw = std::fs::read_to_string(&path)?;
        let file: SidecarFile =
            serde_json::from_str(&raw).map_err(|source| LandmarkerError::SidecarInvalid {
                path: path.display().to_string(),
                source,
            })?;

        if file.landmarks.is_empty() {
            return Ok(None);
        }

        tracing::trace!(
            path = %path.display(),
            landmarks = file.landmarks.len(),
            "loaded landmark sidecar"
        );

        Ok(Some(Detection {
            landmarks: file.landmarks,
            transform: file.transform.map(TransformMatrix),
            score: file.score,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> DynamicImage {
        DynamicImage::new_rgb8(4, 4)
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            Sidecar::sidecar_path(Path::new("/data/alice_1.jpg")),
            PathBuf::from("/data/alice_1.landmarks.json")
        );
        assert!(!Sidecar.needs_pixels());
    }

    #[test]
    fn test_sidecar_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Sidecar
            .detect(&blank(), &dir.path().join("bob.png"))
            .unwrap_err();
        assert_eq!(err.kind(), "sidecar_missing");
    }

    #[test]
    fn test_sidecar_reads_detection() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("carol_2.webp");
        std::fs::write(
            dir.path().join("carol_2.landmarks.json"),
            r#"{"score": 0.5,
                "landmarks": [{"x": 0.1, "y": 0.2}, {"x": 0.3, "y": 0.4, "z": 0.1, "visibility": 0.9}],
                "transform": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1]}"#,
        )
        .unwrap();

        let det = Sidecar.detect(&blank(), &image).unwrap().unwrap();
        assert_eq!(det.score, 0.5);
        assert_eq!(det.landmarks.len(), 2);
        assert_eq!(det.landmarks[1].visibility, Some(0.9));
        assert_eq!(det.transform, Some(TransformMatrix::IDENTITY));
    }

    #[test]
    fn test_sidecar_empty_means_no_face() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dave.landmarks.json"), r#"{"landmarks": []}"#).unwrap();
        let det = Sidecar.detect(&blank(), &dir.path().join("dave.jpg")).unwrap();
        assert!(det.is_none());
    }

    #[test]
    fn test_sidecar_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eve.landmarks.json"), "{not json").unwrap();
        let err = Sidecar
            .detect(&blank(), &dir.path().join("eve.jpg"))
            .unwrap_err();
        assert_eq!(err.kind(), "sidecar_invalid");
    }
}
