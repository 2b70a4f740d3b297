//! Scene composition: lab structure plus placed equipment, turned into
//! Bevy entities and queried by the CPU raycaster.

/// Builds the composite scene for one lab generation.
pub mod composer;

/// Ray-box and ray-triangle intersection.
pub mod raycast;

/// Entity spawning, GPU handle sharing and disposal of stale nodes.
pub mod spawner;

/// Glass versus opaque classification from surface names.
pub mod surface_class;
