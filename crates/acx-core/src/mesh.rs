//! Named indices into the 468-point face mesh topology.

pub const NOSE_TIP: usize = 1;
pub const FOREHEAD_TOP: usize = 10;
pub const EYE_L_OUTER: usize = 33;
pub const MOUTH_L_CORNER: usize = 61;
pub const EYE_L_INNER: usize = 133;
pub const CHIN_TIP: usize = 152;
pub const OVAL_L: usize = 234;
pub const EYE_R_OUTER: usize = 263;
pub const MOUTH_R_CORNER: usize = 291;
pub const EYE_R_INNER: usize = 362;
pub const OVAL_R: usize = 454;

/// Number of points in a full face mesh.
pub const MESH_LANDMARKS: usize = 468;

/// Smallest landmark count that covers every index used for metrics.
pub const MIN_LANDMARKS: usize = OVAL_R + 1;

/// Left/right landmark pairs that trade places under a horizontal flip.
pub const MIRROR_PAIRS: [(usize, usize); 4] = [
    (EYE_L_OUTER, EYE_R_OUTER),
    (EYE_L_INNER, EYE_R_INNER),
    (MOUTH_L_CORNER, MOUTH_R_CORNER),
    (OVAL_L, OVAL_R),
];

/// Landmarks whose visibility/presence feed the landmark confidence.
pub const CONFIDENCE_POINTS: [usize; 7] = [
    EYE_L_OUTER,
    EYE_R_OUTER,
    EYE_L_INNER,
    EYE_R_INNER,
    NOSE_TIP,
    MOUTH_L_CORNER,
    MOUTH_R_CORNER,
];
