//! Shared tuning constants for the lab viewer.

pub mod camera;
pub mod clip;
pub mod render_settings;
pub mod surface;
