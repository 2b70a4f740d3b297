//! Lab and equipment records.

/// JSON catalogue asset and the repository built from it.
pub mod catalogue;

/// Repository traits the viewer reads records through.
pub mod repository;
