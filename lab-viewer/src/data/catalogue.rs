use std::sync::Arc;

use bevy::asset::LoadState;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ViewerConfig;
use crate::data::repository::{ItemRepository, LabRepository, Repositories, RepositoryError};
use crate::engine::assets::records::{ItemPlacement, LabAsset, PlacementPosition};
use crate::engine::loading::lab_session::LabSession;

/// `labs` table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub blurb: String,
    pub model_path: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// `equipment` table row. Every spatial column is nullable in the source data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRow {
    pub qr_code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lab_id: Option<String>,
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub z: Option<f32>,
    #[serde(default)]
    pub rotation: Option<[f32; 3]>,
    #[serde(default)]
    pub scale: Option<f32>,
}

/// Lab and equipment export, loaded as a JSON asset.
#[derive(Asset, TypePath, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabCatalogue {
    pub labs: Vec<LabRow>,
    #[serde(default)]
    pub equipment: Vec<EquipmentRow>,
}

impl From<&LabRow> for LabAsset {
    fn from(row: &LabRow) -> Self {
        LabAsset {
            id: row.id.clone(),
            name: row.name.clone(),
            blurb: row.blurb.clone(),
            model_path: row.model_path.clone(),
            thumbnail_url: row.thumbnail_url.clone(),
        }
    }
}

impl EquipmentRow {
    /// Item identity is the QR code. Rows without a lab are not placed anywhere.
    pub fn to_placement(&self) -> Option<ItemPlacement> {
        Some(ItemPlacement {
            item_id: self.qr_code.clone(),
            model_path: self.model_path.clone(),
            position: PlacementPosition {
                x: self.x,
                y: self.y,
                z: self.z,
            },
            rotation: self.rotation,
            scale: self.scale,
            lab_id: self.lab_id.clone()?,
        })
    }
}

/// In-memory repository over a loaded catalogue.
#[derive(Debug, Clone, Default)]
pub struct CatalogueRepository {
    labs: Vec<LabAsset>,
    items: Vec<ItemPlacement>,
}

impl CatalogueRepository {
    pub fn new(catalogue: &LabCatalogue) -> Self {
        Self {
            labs: catalogue.labs.iter().map(LabAsset::from).collect(),
            items: catalogue
                .equipment
                .iter()
                .filter_map(EquipmentRow::to_placement)
                .collect(),
        }
    }

    pub fn into_repositories(self) -> Repositories {
        let shared = Arc::new(self);
        Repositories {
            labs: shared.clone(),
            items: shared,
        }
    }
}

impl LabRepository for CatalogueRepository {
    fn get_lab(&self, id: &str) -> Result<LabAsset, RepositoryError> {
        self.labs
            .iter()
            .find(|lab| lab.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    fn list_labs(&self) -> Vec<LabAsset> {
        self.labs.clone()
    }
}

impl ItemRepository for CatalogueRepository {
    fn items_for_lab(&self, lab_id: &str) -> Vec<ItemPlacement> {
        self.items
            .iter()
            .filter(|item| item.lab_id == lab_id)
            .cloned()
            .collect()
    }
}

#[derive(Resource, Default)]
pub struct CatalogueLoader {
    handle: Option<Handle<LabCatalogue>>,
    settled: bool,
}

// Start loading the catalogue
pub fn start_catalogue_load(
    mut loader: ResMut<CatalogueLoader>,
    asset_server: Res<AssetServer>,
    config: Res<ViewerConfig>,
) {
    info!("Loading catalogue from {}", config.catalogue_path);
    loader.handle = Some(asset_server.load(config.catalogue_path.clone()));
}

// Install repositories once the catalogue asset is available
pub fn install_catalogue(
    mut loader: ResMut<CatalogueLoader>,
    mut commands: Commands,
    mut session: ResMut<LabSession>,
    asset_server: Res<AssetServer>,
    catalogues: Res<Assets<LabCatalogue>>,
) {
    if loader.settled {
        return;
    }
    let Some(handle) = loader.handle.clone() else {
        return;
    };

    if let Some(catalogue) = catalogues.get(&handle) {
        info!(
            "✓ Catalogue loaded: {} labs, {} equipment rows",
            catalogue.labs.len(),
            catalogue.equipment.len()
        );
        commands.insert_resource(CatalogueRepository::new(catalogue).into_repositories());
        loader.settled = true;
    } else if let Some(LoadState::Failed(err)) = asset_server.get_load_state(&handle) {
        let reason = format!("catalogue failed to load: {err}");
        error!("{}", RepositoryError::Unavailable(reason.clone()));
        // Selections stay queued; the host sees the failure in the status.
        session.unavailable(&reason);
        loader.settled = true;
    }
}
