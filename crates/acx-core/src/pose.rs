//! Head pose: Euler decomposition of the facial transform, and a landmark-based
//! transform estimate for backends that only emit mesh points.

use crate::mesh::{CHIN_TIP, EYE_L_OUTER, EYE_R_OUTER, FOREHEAD_TOP, MIN_LANDMARKS};
use crate::types::TransformMatrix;

/// Below this, the rotation is treated as gimbal-locked.
const SINGULAR_EPSILON: f64 = 1e-6;

/// Head orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// Decompose a 3×3 rotation matrix into pitch, yaw and roll (degrees).
pub fn euler_angles(r: &[[f64; 3]; 3]) -> EulerAngles {
    let sy = (r[0][0] * r[0][0] + r[1][0] * r[1][0]).sqrt();

    if sy >= SINGULAR_EPSILON {
        EulerAngles {
            pitch: r[2][1].atan2(r[2][2]).to_degrees(),
            yaw: (-r[2][0]).atan2(sy).to_degrees(),
            roll: r[1][0].atan2(r[0][0]).to_degrees(),
        }
    } else {
        EulerAngles {
            pitch: (-r[1][2]).atan2(r[1][1]).to_degrees(),
            yaw: (-r[2][0]).atan2(sy).to_degrees(),
            roll: 0.0,
        }
    }
}

/// Pose of an optional transform; no transform means a neutral pose.
pub fn pose_of(transform: Option<&TransformMatrix>) -> EulerAngles {
    transform
        .map(|t| euler_angles(&t.rotation()))
        .unwrap_or_default()
}

/// Estimate a head rotation from mesh points.
///
/// `points` are `[x, y, z]` in isotropic image units (y grows downward, z grows
/// away from the camera). The face frame is built from the outer eye corners
/// (x axis) and the chin-to-forehead line (y axis), then expressed in a camera
/// frame with y up and z toward the viewer, so an upright frontal face maps to
/// the identity. Returns `None` for degenerate geometry.
pub fn estimate_transform(points: &[[f64; 3]]) -> Option<TransformMatrix> {
    if points.len() < MIN_LANDMARKS {
        return None;
    }

    let camera = |p: [f64; 3]| [p[0], -p[1], -p[2]];
    let eye_l = camera(points[EYE_L_OUTER]);
    let eye_r = camera(points[EYE_R_OUTER]);
    let chin = camera(points[CHIN_TIP]);
    let forehead = camera(points[FOREHEAD_TOP]);

    let x_axis = normalize(sub(eye_r, eye_l))?;
    let up = sub(forehead, chin);
    let y_axis = normalize(sub(up, scale(x_axis, dot(up, x_axis))))?;
    let z_axis = cross(x_axis, y_axis);

    let r = std::array::from_fn(|row| [x_axis[row], y_axis[row], z_axis[row]]);
    Some(TransformMatrix::from_rotation(r))
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scale(a: [f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(a: [f64; 3]) -> Option<[f64; 3]> {
    let len = dot(a, a).sqrt();
    if !len.is_finite() || len < 1e-9 {
        return None;
    }
    Some(scale(a, 1.0 / len))
}
