use std::sync::Arc;

use bevy::prelude::*;
use thiserror::Error;

use crate::engine::assets::records::{ItemPlacement, LabAsset};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    #[error("lab {0} not found")]
    NotFound(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

pub trait LabRepository: Send + Sync + 'static {
    fn get_lab(&self, id: &str) -> Result<LabAsset, RepositoryError>;

    fn list_labs(&self) -> Vec<LabAsset>;
}

pub trait ItemRepository: Send + Sync + 'static {
    /// Raw placements for a lab, unvalidated.
    fn items_for_lab(&self, lab_id: &str) -> Vec<ItemPlacement>;
}

/// Record sources the viewer reads from. Inserted once the backing data is available.
#[derive(Resource, Clone)]
pub struct Repositories {
    pub labs: Arc<dyn LabRepository>,
    pub items: Arc<dyn ItemRepository>,
}
