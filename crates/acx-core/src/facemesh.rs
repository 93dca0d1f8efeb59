//! Face Mesh landmark network via ONNX Runtime.
//!
//! Runs a 468-point face mesh model on a letterboxed copy of the whole image.
//! The network is trained on face crops, so it suits portrait photos where the
//! face fills most of the frame.

use crate::landmarker::{Landmarker, LandmarkerError};
use crate::mesh::MESH_LANDMARKS;
use crate::pose;
use crate::types::{Detection, Landmark};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

// --- Named constants (no magic numbers) ---
const FACEMESH_INPUT_SIZE: usize = 192;
const FACEMESH_MEAN: f32 = 127.5;
const FACEMESH_STD: f32 = 127.5;
const FACEMESH_COORDS: usize = MESH_LANDMARKS * 3;
pub const DEFAULT_MIN_FACE_CONFIDENCE: f32 = 0.01;

/// Metadata for coordinate de-mapping after letterbox resize.
#[derive(Debug, Clone, Copy)]
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// ONNX face mesh landmarker.
pub struct FaceMesh {
    session: Session,
    min_face_confidence: f32,
}

impl FaceMesh {
    /// Load the face mesh ONNX model from the given path.
    pub fn load(model_path: &Path, min_face_confidence: f32) -> Result<Self, LandmarkerError> {
        if !model_path.exists() {
            return Err(LandmarkerError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face mesh model"
        );

        Ok(Self {
            session,
            min_face_confidence,
        })
    }

    /// Letterbox `image` into a NCHW tensor normalized to [-1, 1].
    fn preprocess(image: &DynamicImage) -> (Array4<f32>, LetterboxInfo) {
        let size = FACEMESH_INPUT_SIZE;
        let (width, height) = image.dimensions();
        let scale = size as f32 / width.max(height).max(1) as f32;
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, size as u32);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, size as u32);
        let pad_x = (size as u32 - new_w) as f32 / 2.0;
        let pad_y = (size as u32 - new_h) as f32 / 2.0;

        let resized = image
            .resize_exact(new_w, new_h, FilterType::Triangle)
            .to_rgb8();

        let pad_x_start = pad_x.floor() as usize;
        let pad_y_start = pad_y.floor() as usize;

        // Padding stays at -1.0 (black).
        let mut tensor = Array4::<f32>::from_elem((1, 3, size, size), -1.0);
        for (x, y, pixel) in resized.enumerate_pixels() {
            let tx = pad_x_start + x as usize;
            let ty = pad_y_start + y as usize;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = (pixel[c] as f32 - FACEMESH_MEAN) / FACEMESH_STD;
            }
        }

        (tensor, LetterboxInfo { scale, pad_x, pad_y })
    }
}

impl Landmarker for FaceMesh {
    fn name(&self) -> &str {
        "facemesh"
    }

    fn detect(
        &mut self,
        image: &DynamicImage,
        _source: &Path,
    ) -> Result<Option<Detection>, LandmarkerError> {
        let (width, height) = image.dimensions();
        let (input, letterbox) = Self::preprocess(image);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut tensors = Vec::with_capacity(outputs.len());
        for (name, output) in outputs.iter() {
            let (_, data) = output
                .try_extract_tensor::<f32>()
                .map_err(|e| LandmarkerError::InferenceFailed(format!("output {name}: {e}")))?;
            tensors.push(data.to_vec());
        }

        let (coords, flag) = split_outputs(&tensors)?;
        let score = sigmoid(flag);
        if score < self.min_face_confidence {
            tracing::debug!(score, threshold = self.min_face_confidence, "face flag below threshold");
            return Ok(None);
        }

        let points = unletterbox(coords, &letterbox);
        let transform = pose::estimate_transform(&points);

        let w = width.max(1) as f64;
        let h = height.max(1) as f64;
        let landmarks = points
            .iter()
            .map(|p| Landmark::new(p[0] / w, p[1] / h, p[2] / w))
            .collect();

        Ok(Some(Detection {
            landmarks,
            transform,
            score,
        }))
    }
}

/// Pick the landmark tensor and face flag out of the model outputs.
///
/// Exports disagree on output names and order, so outputs are identified by
/// size: the mesh tensor holds 468×3 coordinates, the flag a single logit.
fn split_outputs(tensors: &[Vec<f32>]) -> Result<(&[f32], f32), LandmarkerError> {
    let coords = tensors
        .iter()
        .find(|t| t.len() >= FACEMESH_COORDS)
        .ok_or_else(|| {
            LandmarkerError::InferenceFailed(format!(
                "no output with {FACEMESH_COORDS} landmark coordinates"
            ))
        })?;
    let flag = tensors
        .iter()
        .find(|t| t.len() == 1)
        .and_then(|t| t.first().copied())
        .ok_or_else(|| LandmarkerError::InferenceFailed("no face flag output".into()))?;
    Ok((&coords[..FACEMESH_COORDS], flag))
}

/// Map network-space coordinates back to original image pixels.
fn unletterbox(coords: &[f32], letterbox: &LetterboxInfo) -> Vec<[f64; 3]> {
    coords
        .chunks_exact(3)
        .map(|c| {
            [
                ((c[0] - letterbox.pad_x) / letterbox.scale) as f64,
                ((c[1] - letterbox.pad_y) / letterbox.scale) as f64,
                (c[2] / letterbox.scale) as f64,
            ]
        })
        .collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
