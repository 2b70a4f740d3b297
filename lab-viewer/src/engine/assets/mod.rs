//! Plain data the viewer works with: records from the repositories, decoded
//! model geometry and axis-aligned bounds.

/// Axis-aligned bounding boxes and their transforms.
pub mod bounds;

/// Lab and item records plus placement validation.
///
/// Invalid placements become warnings instead of failing the lab.
pub mod records;

/// Decoded glTF geometry shared by every placement of a model.
pub mod scene_asset;
