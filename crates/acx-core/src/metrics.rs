//! Face geometry metrics derived from mesh landmarks and head pose.
//!
//! All outputs are rounded to a fixed precision per field. The rounded values
//! are the serialized contract consumed by downstream metadata extraction, so
//! the precision of each field must not change.

use crate::mesh::{
    CHIN_TIP, CONFIDENCE_POINTS, EYE_L_INNER, EYE_L_OUTER, EYE_R_INNER, EYE_R_OUTER,
    FOREHEAD_TOP, MIN_LANDMARKS, MOUTH_L_CORNER, MOUTH_R_CORNER, NOSE_TIP, OVAL_L, OVAL_R,
};
use crate::pose;
use crate::types::{Landmark, Point, TransformMatrix};
use thiserror::Error;

pub const ANGLE_DECIMALS: i32 = 2;
pub const COORD_DECIMALS: i32 = 4;
pub const DISTANCE_DECIMALS: i32 = 6;
pub const CONFIDENCE_DECIMALS: i32 = 3;

const IODIST_INNER_WEIGHT: f64 = 0.6;
const IODIST_OUTER_WEIGHT: f64 = 0.4;
const SCALE_IODIST_WEIGHT: f64 = 0.55;
const SCALE_OVAL_WEIGHT: f64 = 0.30;
const SCALE_HEIGHT_WEIGHT: f64 = 0.15;

#[derive(Error, Debug, PartialEq)]
pub enum MetricsError {
    #[error("face mesh has {actual} landmarks, need at least {required}")]
    TooFewLandmarks { required: usize, actual: usize },
}

/// Anatomical and pose metrics for one detected face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMetrics {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    pub center: Point,
    pub face_width: f64,
    /// 3D distance between the outer eye corners.
    pub face_scale: f64,
    /// Planar distance between the outer eye corners.
    pub interocular_dist: f64,
    pub nose: Point,
    pub eye_l: Point,
    pub eye_r: Point,
    pub mouth_l: Point,
    pub mouth_r: Point,
    pub eye_li: Point,
    pub eye_ri: Point,
    pub iodist_inner: f64,
    pub iodist_blend: f64,
    pub eye_mouth_dist: f64,
    pub chin: Point,
    pub oval_l: Point,
    pub oval_r: Point,
    pub oval_width: f64,
    pub forehead: Point,
    pub face_height: f64,
    /// Composite normalized face scale.
    pub src_scale_px: f64,
    pub nose_eye_dist: f64,
    pub landmark_confidence: f64,
    pub score: f64,
}

/// Clamp a confidence-like value into [0, 1]; non-finite values count as 1.
pub fn clamp_unit(value: f64) -> f64 {
    if !value.is_finite() {
        return 1.0;
    }
    value.clamp(0.0, 1.0)
}

/// Round to `decimals` places. Negative zero is normalized to zero.
///
/// Rounds the exact binary value through its decimal expansion (ties to even),
/// so `0.98705` (stored just below the tie) becomes `0.987` at four places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let places = decimals.max(0) as usize;
    let rounded = format!("{value:.places$}").parse::<f64>().unwrap_or(value);
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn round_point(p: Point) -> Point {
    Point {
        x: round_to(p.x, COORD_DECIMALS),
        y: round_to(p.y, COORD_DECIMALS),
    }
}

/// Mean per-landmark confidence over [`CONFIDENCE_POINTS`].
///
/// Points carrying neither visibility nor presence are skipped; a missing half
/// counts as fully confident. With no confidence data at all the detection
/// score is used instead.
pub fn landmark_confidence(landmarks: &[Landmark], score: f64) -> f64 {
    let values: Vec<f64> = CONFIDENCE_POINTS
        .iter()
        .filter_map(|&idx| landmarks.get(idx))
        .filter(|lm| lm.visibility.is_some() || lm.presence.is_some())
        .map(|lm| {
            let visibility = clamp_unit(lm.visibility.unwrap_or(1.0));
            let presence = clamp_unit(lm.presence.unwrap_or(1.0));
            (visibility + presence) * 0.5
        })
        .collect();

    if values.is_empty() {
        clamp_unit(score)
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Compute face metrics from a landmark mesh, an optional pose transform and the
/// detection score.
pub fn compute_face_metrics(
    landmarks: &[Landmark],
    transform: Option<&TransformMatrix>,
    score: f64,
) -> Result<FaceMetrics, MetricsError> {
    if landmarks.len() < MIN_LANDMARKS {
        return Err(MetricsError::TooFewLandmarks {
            required: MIN_LANDMARKS,
            actual: landmarks.len(),
        });
    }

    let pose = pose::pose_of(transform);

    let nose = &landmarks[NOSE_TIP];
    let eye_l = &landmarks[EYE_L_OUTER];
    let eye_r = &landmarks[EYE_R_OUTER];
    let mouth_l = &landmarks[MOUTH_L_CORNER];
    let mouth_r = &landmarks[MOUTH_R_CORNER];
    let eye_li = &landmarks[EYE_L_INNER];
    let eye_ri = &landmarks[EYE_R_INNER];
    let chin = &landmarks[CHIN_TIP];
    let oval_l = &landmarks[OVAL_L];
    let oval_r = &landmarks[OVAL_R];
    let forehead = &landmarks[FOREHEAD_TOP];

    let face_scale = eye_l.distance(eye_r);
    let iodist_outer = eye_l.planar_distance(eye_r);
    let iodist_inner = eye_li.planar_distance(eye_ri);
    let iodist_blend = IODIST_INNER_WEIGHT * iodist_inner + IODIST_OUTER_WEIGHT * iodist_outer;

    let mid_eye = midpoint(eye_l, eye_r);
    let mid_mouth = midpoint(mouth_l, mouth_r);
    let eye_mouth_dist = ((mid_mouth.x - mid_eye.x).powi(2) + (mid_mouth.y - mid_eye.y).powi(2))
        .sqrt();

    let oval_width = oval_l.planar_distance(oval_r);
    let nose_eye_dist = nose.planar_distance(eye_l);
    let face_height = forehead.planar_distance(chin);

    let src_scale_px = SCALE_IODIST_WEIGHT * iodist_blend
        + SCALE_OVAL_WEIGHT * oval_width
        + SCALE_HEIGHT_WEIGHT * face_height;

    let (min_x, max_x) = landmarks
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), lm| {
            (lo.min(lm.x), hi.max(lm.x))
        });

    let confidence = landmark_confidence(landmarks, score);

    Ok(FaceMetrics {
        pitch: round_to(pose.pitch, ANGLE_DECIMALS),
        yaw: round_to(pose.yaw, ANGLE_DECIMALS),
        roll: round_to(pose.roll, ANGLE_DECIMALS),
        center: round_point(eye_l.point()),
        face_width: round_to(max_x - min_x, COORD_DECIMALS),
        face_scale: round_to(face_scale, DISTANCE_DECIMALS),
        interocular_dist: round_to(iodist_outer, DISTANCE_DECIMALS),
        nose: round_point(nose.point()),
        eye_l: round_point(eye_l.point()),
        eye_r: round_point(eye_r.point()),
        mouth_l: round_point(mouth_l.point()),
        mouth_r: round_point(mouth_r.point()),
        eye_li: round_point(eye_li.point()),
        eye_ri: round_point(eye_ri.point()),
        iodist_inner: round_to(iodist_inner, DISTANCE_DECIMALS),
        iodist_blend: round_to(iodist_blend, DISTANCE_DECIMALS),
        eye_mouth_dist: round_to(eye_mouth_dist, DISTANCE_DECIMALS),
        chin: round_point(chin.point()),
        oval_l: round_point(oval_l.point()),
        oval_r: round_point(oval_r.point()),
        oval_width: round_to(oval_width, DISTANCE_DECIMALS),
        forehead: round_point(forehead.point()),
        face_height: round_to(face_height, DISTANCE_DECIMALS),
        src_scale_px: round_to(src_scale_px, DISTANCE_DECIMALS),
        nose_eye_dist: round_to(nose_eye_dist, DISTANCE_DECIMALS),
        landmark_confidence: round_to(confidence, CONFIDENCE_DECIMALS),
        score: round_to(score, CONFIDENCE_DECIMALS),
    })
}

fn midpoint(a: &Landmark, b: &Landmark) -> Point {
    Point {
        x: (a.x + b.x) * 0.5,
        y: (a.y + b.y) * 0.5,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mesh::MESH_LANDMARKS;

    /// A 468-point mesh with every metric landmark at a hand-picked position.
    pub(crate) fn synthetic_mesh() -> Vec<Landmark> {
        let mut mesh = vec![Landmark::new(0.5, 0.5, 0.0); MESH_LANDMARKS];
        mesh[NOSE_TIP] = Landmark::new(0.5, 0.55, -0.05);
        mesh[EYE_L_OUTER] = Landmark::new(0.35, 0.45, 0.0);
        mesh[EYE_R_OUTER] = Landmark::new(0.65, 0.45, 0.0);
        mesh[EYE_L_INNER] = Landmark::new(0.45, 0.45, 0.0);
        mesh[EYE_R_INNER] = Landmark::new(0.55, 0.45, 0.0);
        mesh[MOUTH_L_CORNER] = Landmark::new(0.42, 0.70, 0.0);
        mesh[MOUTH_R_CORNER] = Landmark::new(0.58, 0.70, 0.0);
        mesh[CHIN_TIP] = Landmark::new(0.5, 0.85, 0.0);
        mesh[FOREHEAD_TOP] = Landmark::new(0.5, 0.25, 0.0);
        mesh[OVAL_L] = Landmark::new(0.30, 0.50, 0.0);
        mesh[OVAL_R] = Landmark::new(0.70, 0.50, 0.0);
        mesh
    }

    #[test]
    fn test_composite_scale_matches_hand_computation() {
        let m = compute_face_metrics(&synthetic_mesh(), None, 0.9).unwrap();

        // outer = 0.30, inner = 0.10 → blend = 0.06 + 0.12 = 0.18
        assert!((m.interocular_dist - 0.30).abs() < 1e-9);
        assert!((m.iodist_inner - 0.10).abs() < 1e-9);
        assert!((m.iodist_blend - 0.18).abs() < 1e-9);
        // oval width 0.40, face height 0.60
        assert!((m.oval_width - 0.40).abs() < 1e-9);
        assert!((m.face_height - 0.60).abs() < 1e-9);
        // 0.55*0.18 + 0.30*0.40 + 0.15*0.60 = 0.099 + 0.12 + 0.09
        assert!((m.src_scale_px - 0.309).abs() < 1e-9);
        // eye midpoint (0.5, 0.45) → mouth midpoint (0.5, 0.70)
        assert!((m.eye_mouth_dist - 0.25).abs() < 1e-9);
        // nose (0.5, 0.55) → left eye (0.35, 0.45)
        let expected_ne = (0.15f64 * 0.15 + 0.10 * 0.10).sqrt();
        assert!((m.nose_eye_dist - round_to(expected_ne, 6)).abs() < 1e-12);
        assert!((m.face_width - 0.40).abs() < 1e-9);
        assert_eq!(m.center, m.eye_l);
    }

    #[test]
    fn test_no_transform_means_neutral_pose() {
        let m = compute_face_metrics(&synthetic_mesh(), None, 1.0).unwrap();
        assert_eq!((m.pitch, m.yaw, m.roll), (0.0, 0.0, 0.0));

        let m = compute_face_metrics(&synthetic_mesh(), Some(&TransformMatrix::IDENTITY), 1.0)
            .unwrap();
        assert_eq!((m.pitch, m.yaw, m.roll), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_distances_are_non_negative() {
        let mut mesh = synthetic_mesh();
        // Swap sides so coordinate differences are negative.
        mesh.swap(EYE_L_OUTER, EYE_R_OUTER);
        mesh.swap(OVAL_L, OVAL_R);
        let m = compute_face_metrics(&mesh, None, 1.0).unwrap();
        assert!(m.interocular_dist > 0.0);
        assert!(m.oval_width > 0.0);
        assert!(m.src_scale_px > 0.0);
    }

    #[test]
    fn test_rounding_stays_within_precision() {
        let mut mesh = synthetic_mesh();
        mesh[NOSE_TIP] = Landmark::new(0.123456789, 0.987654321, 0.0);
        mesh[EYE_R_OUTER] = Landmark::new(0.6543219876, 0.4567891234, 0.01);
        let m = compute_face_metrics(&mesh, None, 0.87654).unwrap();

        assert!((m.nose.x - 0.123456789).abs() <= 0.5e-4 + 1e-12);
        assert!((m.nose.y - 0.987654321).abs() <= 0.5e-4 + 1e-12);
        assert!((m.eye_r.x - 0.6543219876).abs() <= 0.5e-4 + 1e-12);
        let outer = mesh[EYE_L_OUTER].planar_distance(&mesh[EYE_R_OUTER]);
        assert!((m.interocular_dist - outer).abs() <= 0.5e-6 + 1e-12);
        assert!((m.score - 0.87654).abs() <= 0.5e-3 + 1e-12);
        assert_eq!(m.nose.x, 0.1235);
        assert_eq!(m.score, 0.877);
    }

    #[test]
    fn test_confidence_falls_back_to_score() {
        let mesh = synthetic_mesh();
        assert!((landmark_confidence(&mesh, 0.42) - 0.42).abs() < 1e-12);
        assert_eq!(landmark_confidence(&mesh, 3.0), 1.0);
        assert_eq!(landmark_confidence(&mesh, f64::NAN), 1.0);
    }

    #[test]
    fn test_confidence_averages_and_clamps() {
        let mut mesh = synthetic_mesh();
        for &idx in &CONFIDENCE_POINTS {
            mesh[idx] = mesh[idx].with_confidence(0.8, 0.6);
        }
        assert!((landmark_confidence(&mesh, 0.0) - 0.7).abs() < 1e-12);

        // Out-of-range values clamp before averaging.
        mesh[NOSE_TIP] = mesh[NOSE_TIP].with_confidence(4.0, -2.0);
        let expected = (6.0 * 0.7 + 0.5) / 7.0;
        assert!((landmark_confidence(&mesh, 0.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_partial_confidence_defaults_missing_half() {
        let mut mesh = synthetic_mesh();
        mesh[NOSE_TIP].visibility = Some(0.5);
        // Only the nose carries data: (0.5 + 1.0) / 2
        assert!((landmark_confidence(&mesh, 0.1) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_landmarks() {
        let mesh = vec![Landmark::new(0.5, 0.5, 0.0); 100];
        assert_eq!(
            compute_face_metrics(&mesh, None, 1.0),
            Err(MetricsError::TooFewLandmarks {
                required: MIN_LANDMARKS,
                actual: 100
            })
        );
    }

    #[test]
    fn test_round_to_normalizes_negative_zero() {
        let r = round_to(-0.0001, 2);
        assert_eq!(r, 0.0);
        assert!(r.is_sign_positive());
        assert_eq!(round_to(-12.345678, 2), -12.35);
    }

    #[test]
    fn test_round_to_near_ties_uses_exact_value() {
        // Each literal is stored just below the decimal tie.
        assert_eq!(round_to(0.98705, 4), 0.987);
        assert_eq!(round_to(0.34385, 4), 0.3438);
        assert_eq!(round_to(0.29555, 4), 0.2955);
        // Exact binary ties go to even.
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(0.123456789, 6), 0.123457);
    }
}
