//! Initial framing and the interactive orbit camera.

/// Fits the camera distance to the lab bounds.
pub mod bounds_fitter;

/// Orbit rig math: rotate, zoom, pan, retarget and damping.
pub mod camera_rig;

/// Mouse, touch and keyboard input mapped onto the rig.
pub mod controller;
