//! JSON-RPC 2.0 communication layer for an embedding host process.
//!
//! The host drives the viewer over newline-delimited JSON on stdin and reads
//! responses and notifications from stdout. Logs go to stderr so they never
//! interleave with the message stream.
//!
//! ## Message Flow
//!
//! ```text
//! Host process  <──stdin / stdout──>  Viewer
//!      │                                 │
//!      ├─ Request (with ID) ───────────> │
//!      │                                 ├─ Dispatch viewer event
//!      │ <────────── Response (with ID) ─┤
//!      │                                 │
//!      │ <───────── Notification (no ID) ┤
//! ```
//!
//! ## Methods
//!
//! - `select_lab {lab_id}`: open a lab; unknown ids end in the not-found state
//! - `focus_item {item_id}`: move the orbit target to an item, deferred until it is placed
//! - `retry`: reload a lab whose model failed
//! - `unload`: leave the lab view
//! - `preload {model_path}`: warm the model cache without showing anything
//! - `list_labs`: every lab in the catalogue
//! - `get_status`: current [`ViewerStatus`](crate::engine::core::app_state::ViewerStatus)
//! - `get_fps`: smoothed frame rate
//!
//! ## Notifications
//!
//! - `viewer_status {loading, error, error_kind, progress, state, lab_id}` on every change
//! - `placement_warning {item_id, reason}` for each skipped placement
//! - `fps_update {fps}` twice a second
//!
//! ## Error Handling
//!
//! Standard JSON-RPC 2.0 error codes:
//! - `-32700`: Parse error
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error

/// JSON-RPC 2.0 bidirectional communication over stdio.
///
/// Handles request-response patterns, notifications, and the stdin reader thread.
pub mod host_rpc;
