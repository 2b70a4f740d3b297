/// Name tokens (lowercase, singular) that mark a surface as glass. Glass renders
/// double sided so both faces stay visible from inside the cutaway.
pub const GLASS_PATTERNS: &[&str] = &["glass", "window", "pane", "transparent"];

/// Opacity applied to glass surfaces whose source material is fully opaque.
pub const GLASS_ALPHA: f32 = 0.35;
