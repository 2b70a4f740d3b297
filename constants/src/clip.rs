/// How close to the roof (world units) the camera must be before it counts as outside.
pub const CEILING_MARGIN: f32 = 0.1;

/// Height above the camera at which the ceiling cutaway slices the structure.
pub const CLIP_OFFSET: f32 = 0.35;

/// Clip plane normal. Fragments with `dot(normal, p) + constant < 0` are discarded,
/// which for a downward normal keeps everything at or below `constant`.
pub const CLIP_NORMAL: [f32; 3] = [0.0, -1.0, 0.0];
