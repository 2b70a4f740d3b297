//! Model fetching and the per-lab loading lifecycle.
//!
//! Loads run on the IO task pool and are merged into the scene from the frame
//! loop. Every load carries the lab generation it was started under so results
//! for a lab that is no longer shown are discarded.

/// Path-deduplicating glTF loader with a shared-future cache.
pub mod asset_loader;

/// Lab session state machine, load tags and viewer errors.
pub mod lab_session;

/// Bevy systems that start, poll and cancel lab and item loads.
///
/// Also owns the selection, focus, retry and unload events.
pub mod load_tasks;

/// Filesystem and HTTP model source.
pub mod model_source;

/// Settled-over-requested progress for the active lab.
pub mod progress;
