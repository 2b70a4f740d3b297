//! Runtime systems for diagnostics and user-facing feedback.

/// Terminal progress bar for lab loads.
pub mod console_progress;

/// FPS tracking and notification systems for performance monitoring.
///
/// Sends frame rate updates to the host via RPC and updates the native overlay.
pub mod fps_tracking;

/// Retry and unload shortcuts.
pub mod keyboard;

/// Native text overlay with lab name, progress and errors.
pub mod status_overlay;
