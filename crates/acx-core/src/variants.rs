//! Derived landmark sets: two-pass averaging and horizontal mirroring.

use crate::mesh::MIRROR_PAIRS;
use crate::metrics::{self, FaceMetrics, MetricsError, ANGLE_DECIMALS};
use crate::types::{Landmark, TransformMatrix};

/// Average two landmark sets point by point.
///
/// Sets of different length are not comparable; the primary set is returned
/// unchanged in that case.
pub fn average_landmarks(primary: &[Landmark], secondary: &[Landmark]) -> Vec<Landmark> {
    if primary.len() != secondary.len() {
        tracing::debug!(
            primary = primary.len(),
            secondary = secondary.len(),
            "landmark count mismatch, keeping primary pass"
        );
        return primary.to_vec();
    }

    primary
        .iter()
        .zip(secondary)
        .map(|(p, s)| Landmark {
            x: (p.x + s.x) * 0.5,
            y: (p.y + s.y) * 0.5,
            z: (p.z + s.z) * 0.5,
            visibility: mean_opt(p.visibility, s.visibility),
            presence: mean_opt(p.presence, s.presence),
        })
        .collect()
}

fn mean_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a + b) * 0.5),
        (a, b) => a.or(b),
    }
}

/// Element-wise mean of two transforms.
pub fn average_transform(a: &TransformMatrix, b: &TransformMatrix) -> TransformMatrix {
    TransformMatrix(std::array::from_fn(|i| (a.0[i] + b.0[i]) * 0.5))
}

/// Flip landmarks horizontally and swap each left/right pair.
pub fn mirror_landmarks(landmarks: &[Landmark]) -> Vec<Landmark> {
    let mut mirrored: Vec<Landmark> = landmarks
        .iter()
        .map(|lm| Landmark {
            x: 1.0 - lm.x,
            ..*lm
        })
        .collect();

    for (left, right) in MIRROR_PAIRS {
        if left < mirrored.len() && right < mirrored.len() {
            mirrored.swap(left, right);
        }
    }
    mirrored
}

/// Metrics for the mirrored face.
///
/// Geometry is recomputed from the mirrored landmarks. The pose is derived from
/// the original: pitch is unchanged, yaw and roll flip sign.
pub fn mirror_metrics(
    original: &FaceMetrics,
    mirrored_landmarks: &[Landmark],
) -> Result<FaceMetrics, MetricsError> {
    let mirrored = metrics::compute_face_metrics(mirrored_landmarks, None, original.score)?;
    Ok(FaceMetrics {
        pitch: original.pitch,
        yaw: metrics::round_to(-original.yaw, ANGLE_DECIMALS),
        roll: metrics::round_to(-original.roll, ANGLE_DECIMALS),
        ..mirrored
    })
}
