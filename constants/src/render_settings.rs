/// Background colour (sRGB) behind the lab.
pub const CLEAR_COLOUR: [f32; 3] = [0.11, 0.12, 0.14];

/// Ambient light brightness.
pub const AMBIENT_BRIGHTNESS: f32 = 400.0;

/// Directional light illuminance.
pub const SUN_ILLUMINANCE: f32 = 9_000.0;

/// Base colour for surfaces whose material carries no colour.
pub const DEFAULT_SURFACE_COLOUR: [f32; 4] = [0.8, 0.8, 0.8, 1.0];

/// Interval between FPS notifications sent to the host.
pub const FPS_NOTIFY_SECS: f32 = 0.5;
