//! acx-core: Face mesh landmarks, head pose and face metrics.
//!
//! Landmarks come from an ONNX face mesh network or from sidecar files written
//! by an external tool. Metrics are plain arithmetic over eleven named mesh
//! points plus an Euler decomposition of the head-pose transform.

pub mod facemesh;
pub mod landmarker;
pub mod mesh;
pub mod metrics;
pub mod pose;
pub mod types;
pub mod variants;

pub use facemesh::FaceMesh;
pub use landmarker::{Landmarker, LandmarkerError, Sidecar};
pub use metrics::{compute_face_metrics, FaceMetrics, MetricsError};
pub use types::{Detection, Landmark, Point, TransformMatrix};
