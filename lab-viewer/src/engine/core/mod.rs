//! Core application setup and state management.
//!
//! Handles application lifecycle, window configuration, state transitions,
//! and plugin initialisation.

/// Application setup and plugin configuration for the Bevy engine.
///
/// Creates the main app with the clip material, catalogue loading, lab
/// loading and host RPC layers.
pub mod app_setup;

/// Viewer state machine mirrored from the lab session, plus the published status.
pub mod app_state;

/// Window configuration with vsync settings.
pub mod window_config;
