//! Ceiling cutaway.
//!
//! Once the camera rises to the roof line a horizontal plane slices away the
//! structure above it so the interior stays visible.

/// Clip plane value and the controller that derives it from the camera height.
pub mod ceiling_clip;

/// `StandardMaterial` extension that discards fragments above the plane.
pub mod clip_material;
