use std::sync::Arc;

use bevy::prelude::*;
use thiserror::Error;

use crate::data::repository::RepositoryError;
use crate::engine::assets::records::{
    ItemPlacement, LabAsset, PlacementSet, ValidPlacement, partition_placements,
};
use crate::engine::assets::scene_asset::SceneAsset;
use crate::engine::loading::asset_loader::{AssetLoadError, LoadResult};
use crate::engine::loading::progress::LoadingProgress;

/// What a load is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LoadTarget {
    Lab,
    Item(String),
}

/// Attached to every in-flight load. Outcomes from an older generation are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTag {
    pub generation: u64,
    pub target: LoadTarget,
}

/// Fatal, page-level viewer errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewerError {
    #[error("lab {0} not found")]
    LabNotFound(String),
    #[error(transparent)]
    AssetLoad(#[from] AssetLoadError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ViewerError {
    /// Stable identifier for hosts that route on error type.
    pub fn kind(&self) -> &'static str {
        match self {
            ViewerError::LabNotFound(_) => "lab_not_found",
            ViewerError::AssetLoad(_) => "asset_load",
            ViewerError::Repository(_) => "repository_unavailable",
        }
    }
}

/// Loading state machine: `Idle -> Loading -> Ready | Error`, plus `NotFound`.
/// `Unavailable` means no lab can be opened because the records could not be read.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ViewerPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Error(AssetLoadError),
    NotFound(String),
    Unavailable(String),
}

impl ViewerPhase {
    pub fn error(&self) -> Option<ViewerError> {
        match self {
            ViewerPhase::Error(e) => Some(ViewerError::AssetLoad(e.clone())),
            ViewerPhase::NotFound(id) => Some(ViewerError::LabNotFound(id.clone())),
            ViewerPhase::Unavailable(reason) => Some(ViewerError::Repository(
                RepositoryError::Unavailable(reason.clone()),
            )),
            _ => None,
        }
    }
}

/// Resolved fetch/decode result together with the tag it was started under.
#[derive(Debug)]
pub struct LoadOutcome {
    pub tag: LoadTag,
    pub result: LoadResult,
}

/// Loads to start for a freshly selected lab.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub generation: u64,
    pub lab_path: String,
    pub items: Vec<ValidPlacement>,
}

impl LoadPlan {
    pub fn targets(&self) -> impl Iterator<Item = LoadTarget> + '_ {
        std::iter::once(LoadTarget::Lab).chain(
            self.items
                .iter()
                .map(|p| LoadTarget::Item(p.item_id.clone())),
        )
    }
}

/// What the scene should do with an accepted outcome.
#[derive(Debug)]
pub enum SessionEvent {
    LabReady(Arc<SceneAsset>),
    LabFailed(AssetLoadError),
    ItemReady(ValidPlacement, Arc<SceneAsset>),
    ItemFailed(String, AssetLoadError),
    /// Item arrived before the lab; held until the lab is composed.
    Deferred,
    /// Outcome belongs to a lab that is no longer active.
    Stale,
}

/// Per-lab view lifecycle. Owns the generation counter that invalidates old loads.
#[derive(Resource, Debug, Default)]
pub struct LabSession {
    generation: u64,
    phase: ViewerPhase,
    lab: Option<LabAsset>,
    placements: PlacementSet,
    deferred: Vec<(ValidPlacement, Arc<SceneAsset>)>,
    pending_focus: Option<String>,
    progress: LoadingProgress,
}

impl LabSession {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> &ViewerPhase {
        &self.phase
    }

    pub fn lab(&self) -> Option<&LabAsset> {
        self.lab.as_ref()
    }

    pub fn placements(&self) -> &PlacementSet {
        &self.placements
    }

    pub fn progress(&self) -> &LoadingProgress {
        &self.progress
    }

    /// Start viewing `lab`. Placements are validated here, once, and every load
    /// from the previous lab becomes stale.
    pub fn begin(&mut self, lab: LabAsset, placements: &[ItemPlacement]) -> LoadPlan {
        self.start(lab, partition_placements(placements))
    }

    fn start(&mut self, lab: LabAsset, placements: PlacementSet) -> LoadPlan {
        self.generation += 1;

        let plan = LoadPlan {
            generation: self.generation,
            lab_path: lab.model_path.clone(),
            items: placements.items.clone(),
        };
        self.progress.reset(plan.targets());

        self.phase = ViewerPhase::Loading;
        self.lab = Some(lab);
        self.placements = placements;
        self.deferred.clear();
        plan
    }

    /// Reload the current lab after a failed lab asset.
    pub fn retry(&mut self) -> Option<LoadPlan> {
        if !matches!(self.phase, ViewerPhase::Error(_)) {
            return None;
        }
        let lab = self.lab.clone()?;
        let placements = std::mem::take(&mut self.placements);
        Some(self.start(lab, placements))
    }

    /// The records cannot be read, so no lab can be opened.
    pub fn unavailable(&mut self, reason: &str) {
        self.clear();
        self.phase = ViewerPhase::Unavailable(reason.to_string());
    }

    pub fn is_unavailable_for(&self, reason: &str) -> bool {
        matches!(&self.phase, ViewerPhase::Unavailable(r) if r == reason)
    }

    pub fn not_found(&mut self, lab_id: &str) {
        self.clear();
        self.phase = ViewerPhase::NotFound(lab_id.to_string());
    }

    /// Leave the lab view entirely.
    pub fn unload(&mut self) {
        self.clear();
        self.phase = ViewerPhase::Idle;
    }

    fn clear(&mut self) {
        self.generation += 1;
        self.lab = None;
        self.placements = PlacementSet::default();
        self.deferred.clear();
        self.pending_focus = None;
        self.progress.clear();
    }

    pub fn tag(&self, target: LoadTarget) -> LoadTag {
        LoadTag {
            generation: self.generation,
            target,
        }
    }

    pub fn is_current(&self, tag: &LoadTag) -> bool {
        tag.generation == self.generation && self.lab.is_some()
    }

    /// Apply a resolved load. Outcomes from an older generation are rejected.
    pub fn accept(&mut self, outcome: LoadOutcome) -> SessionEvent {
        let LoadOutcome { tag, result } = outcome;
        if !self.is_current(&tag) {
            return SessionEvent::Stale;
        }
        self.progress.settle(&tag.target);

        match tag.target {
            LoadTarget::Lab => match result {
                Ok(asset) => {
                    self.phase = ViewerPhase::Ready;
                    SessionEvent::LabReady(asset)
                }
                Err(e) => {
                    self.phase = ViewerPhase::Error(e.clone());
                    SessionEvent::LabFailed(e)
                }
            },
            LoadTarget::Item(item_id) => {
                let Some(placement) = self
                    .placements
                    .items
                    .iter()
                    .find(|p| p.item_id == item_id)
                    .cloned()
                else {
                    return SessionEvent::Stale;
                };
                match result {
                    Ok(asset) if self.phase == ViewerPhase::Ready => {
                        SessionEvent::ItemReady(placement, asset)
                    }
                    Ok(asset) => {
                        self.deferred.push((placement, asset));
                        SessionEvent::Deferred
                    }
                    Err(e) => SessionEvent::ItemFailed(item_id, e),
                }
            }
        }
    }

    /// Items that resolved before the lab, in arrival order.
    pub fn take_deferred(&mut self) -> Vec<(ValidPlacement, Arc<SceneAsset>)> {
        std::mem::take(&mut self.deferred)
    }

    /// Remember an item to focus once it is composed. Survives a lab switch so a
    /// deep link can name the item before its lab is selected.
    pub fn request_focus(&mut self, item_id: &str) {
        self.pending_focus = Some(item_id.to_string());
    }

    /// Consume the pending focus if it names `item_id`.
    pub fn take_focus_for(&mut self, item_id: &str) -> bool {
        if self.pending_focus.as_deref() == Some(item_id) {
            self.pending_focus = None;
            true
        } else {
            false
        }
    }

    pub fn pending_focus(&self) -> Option<&str> {
        self.pending_focus.as_deref()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn lab(id: &str) -> LabAsset {
        LabAsset {
            id: id.to_string(),
            name: format!("Lab {id}"),
            blurb: String::new(),
            model_path: format!("models/{id}.glb"),
            thumbnail_url: None,
        }
    }
}
