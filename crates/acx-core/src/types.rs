use serde::{Deserialize, Serialize};

/// A single face mesh landmark in normalized image coordinates.
///
/// `x` and `y` are in [0, 1] relative to the image width and height. `z` is a
/// relative depth on the same scale as `x`. Backends that do not report
/// per-landmark confidence leave `visibility` and `presence` unset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
            presence: None,
        }
    }

    pub fn with_confidence(mut self, visibility: f64, presence: f64) -> Self {
        self.visibility = Some(visibility);
        self.presence = Some(presence);
        self
    }

    /// Planar (x/y) distance to another landmark.
    pub fn planar_distance(&self, other: &Landmark) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    /// Full 3D distance to another landmark.
    pub fn distance(&self, other: &Landmark) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2) + (other.z - self.z).powi(2))
            .sqrt()
    }

    pub fn point(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

/// A 2D position in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Row-major 4×4 homogeneous head-pose transform (16 single-precision floats).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformMatrix(pub [f32; 16]);

impl TransformMatrix {
    pub const IDENTITY: TransformMatrix = TransformMatrix([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Build a transform with the given rotation and no translation.
    pub fn from_rotation(r: [[f64; 3]; 3]) -> Self {
        let mut m = Self::IDENTITY.0;
        for (row, values) in r.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                m[row * 4 + col] = *value as f32;
            }
        }
        TransformMatrix(m)
    }

    /// Top-left 3×3 rotation submatrix, widened to f64.
    pub fn rotation(&self) -> [[f64; 3]; 3] {
        let m = &self.0;
        std::array::from_fn(|row| std::array::from_fn(|col| m[row * 4 + col] as f64))
    }

    /// Parse the 64-byte little-endian float blob emitted by landmark runtimes.
    ///
    /// Returns `None` unless `bytes` is exactly 64 bytes long.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 64 {
            return None;
        }
        let mut m = [0.0f32; 16];
        for (value, chunk) in m.iter_mut().zip(bytes.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Some(TransformMatrix(m))
    }

    pub fn to_le_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        for (chunk, value) in out.chunks_exact_mut(4).zip(self.0.iter()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        out
    }
}

/// Output of a single landmarker pass over one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub landmarks: Vec<Landmark>,
    /// Head-pose transform; `None` when the backend could not produce one.
    pub transform: Option<TransformMatrix>,
    /// Face detection confidence in [0, 1].
    pub score: f32,
}
