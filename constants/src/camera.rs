use std::f32::consts::{FRAC_PI_2, PI};

/// Vertical field of view used for framing and projection.
pub const FOV_DEGREES: f32 = 45.0;

/// Extra space (world units) kept around the lab on every side of the initial framing.
pub const FIT_MARGIN: f32 = 1.0;

/// Lower bound for the fitted camera distance so degenerate bounds never collapse to zero.
pub const MIN_FIT_DISTANCE: f32 = 1.0;

/// Closest the orbit camera may get to its target.
pub const MIN_DISTANCE: f32 = 0.25;

/// Maximum orbit distance as a multiple of the fitted distance.
pub const MAX_DISTANCE_FACTOR: f32 = 4.0;

/// Polar angle limit (radians from +Y). Kept just under the horizon so the
/// camera never crosses below the floor plane.
pub const POLAR_ANGLE_MAX: f32 = FRAC_PI_2 - 0.02;

/// Polar angle floor, keeps the view direction from becoming parallel to the up axis.
pub const POLAR_ANGLE_MIN: f32 = 0.01;

/// Direction from target to camera for the initial framing.
pub const INITIAL_VIEW_DIRECTION: [f32; 3] = [1.0, 1.0, 1.0];

/// Radians of rotation per viewport height of drag.
pub const ROTATE_SPEED: f32 = 2.0 * PI;

/// Zoom scale applied per wheel line.
pub const ZOOM_STEP: f32 = 0.95;

/// Pixel wheel events are divided by this to approximate lines.
pub const PIXELS_PER_LINE: f32 = 16.0;

/// Pan speed multiplier (1.0 keeps the grabbed point under the pointer).
pub const PAN_SPEED: f32 = 1.0;

/// Fraction of pending rotate/pan applied per frame when damping is on.
pub const DAMPING_FACTOR: f32 = 0.2;

/// Maximum delay between clicks/taps that still counts as a double-click.
pub const DOUBLE_CLICK_SECS: f32 = 0.35;

/// Maximum pointer travel (pixels) between the two clicks of a double-click.
pub const DOUBLE_CLICK_SLOP_PX: f32 = 6.0;
