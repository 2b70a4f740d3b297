use std::sync::Arc;

use bevy::prelude::*;

use crate::engine::assets::bounds::SceneBounds;
use crate::engine::assets::records::{InvalidPlacementWarning, PlacementSet, ValidPlacement};
use crate::engine::assets::scene_asset::SceneAsset;
use crate::engine::clip::ceiling_clip::ClipPlane;
use crate::engine::scene::raycast::{RayHit, ray_aabb_hit_t, ray_triangle_hit_t};
use crate::engine::scene::surface_class::{SurfaceClass, classify};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Lab,
    Item(String),
}

/// Loaded geometry placed in the world. Item nodes share their `asset` with
/// every other placement of the same model.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub kind: NodeKind,
    pub generation: u64,
    pub model_path: String,
    pub asset: Arc<SceneAsset>,
    pub transform: Transform,
    /// One entry per surface of `asset`, in order. Empty for items.
    pub surface_classes: Vec<SurfaceClass>,
    pub world_bounds: Option<SceneBounds>,
    /// Root entity once spawned.
    pub entity: Option<Entity>,
}

impl SceneNode {
    fn new(
        kind: NodeKind,
        generation: u64,
        model_path: String,
        asset: Arc<SceneAsset>,
        transform: Transform,
    ) -> Self {
        let world_bounds = asset.bounds(&transform.compute_matrix());
        Self {
            kind,
            generation,
            model_path,
            asset,
            transform,
            surface_classes: Vec::new(),
            world_bounds,
            entity: None,
        }
    }

    /// Nearest hit on this node. Lab geometry above an enabled clip plane is invisible
    /// and therefore not hittable.
    fn raycast(&self, origin: Vec3, direction: Vec3, clip: Option<&ClipPlane>) -> Option<RayHit> {
        let bounds = self.world_bounds?;
        ray_aabb_hit_t(origin, direction, bounds.min, bounds.max)?;

        let world = self.transform.compute_matrix();
        let clip = clip.filter(|_| self.kind == NodeKind::Lab);
        let mut best: Option<RayHit> = None;

        for surface in &self.asset.surfaces {
            let surface_bounds = surface.local_bounds().map(|b| b.transformed(&world));
            if let Some(b) = surface_bounds {
                if ray_aabb_hit_t(origin, direction, b.min, b.max).is_none() {
                    continue;
                }
            }

            for tri in surface.triangles() {
                let tri = tri.map(|p| world.transform_point3(p));
                let Some(t) = ray_triangle_hit_t(origin, direction, &tri) else {
                    continue;
                };
                if best.is_some_and(|b| b.distance <= t) {
                    continue;
                }
                let point = origin + direction * t;
                if clip.is_some_and(|c| c.clips(point)) {
                    continue;
                }
                best = Some(RayHit { point, distance: t });
            }
        }
        best
    }
}

/// Result of composing a lab: the base scene plus the placements left out of it.
#[derive(Debug)]
pub struct Composition {
    pub scene: CompositeScene,
    pub warnings: Vec<InvalidPlacementWarning>,
}

/// Lab structure plus every item composed so far, for one lab generation.
#[derive(Resource, Debug, Default)]
pub struct CompositeScene {
    generation: u64,
    nodes: Vec<SceneNode>,
}

impl CompositeScene {
    /// Build the base scene from the lab geometry.
    ///
    /// Lab surfaces are classified here, once. The valid placements of `placements`
    /// become item nodes as their models resolve through [`CompositeScene::add_item`];
    /// the rest are returned as warnings.
    pub fn compose(
        lab_path: &str,
        lab_asset: Arc<SceneAsset>,
        placements: &PlacementSet,
        generation: u64,
    ) -> Composition {
        let mut lab = SceneNode::new(
            NodeKind::Lab,
            generation,
            lab_path.to_string(),
            lab_asset,
            Transform::IDENTITY,
        );
        lab.surface_classes = lab
            .asset
            .surfaces
            .iter()
            .map(|s| classify(s.names()))
            .collect();

        Composition {
            scene: CompositeScene {
                generation,
                nodes: vec![lab],
            },
            warnings: placements.warnings.clone(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [SceneNode] {
        &mut self.nodes
    }

    pub fn lab(&self) -> Option<&SceneNode> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Lab)
    }

    pub fn item(&self, item_id: &str) -> Option<&SceneNode> {
        self.nodes
            .iter()
            .find(|n| matches!(&n.kind, NodeKind::Item(id) if id == item_id))
    }

    pub fn item_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Item(_)))
            .count()
    }

    /// Lab-only world bounds. Items never contribute.
    pub fn lab_bounds(&self) -> Option<SceneBounds> {
        self.lab()?.world_bounds
    }

    /// Insert a resolved item into the visible scene. Returns the node index, or
    /// `None` when the item is already present or belongs to another generation.
    pub fn add_item(
        &mut self,
        placement: &ValidPlacement,
        asset: Arc<SceneAsset>,
        generation: u64,
    ) -> Option<usize> {
        if generation != self.generation || self.item(&placement.item_id).is_some() {
            return None;
        }
        self.nodes.push(SceneNode::new(
            NodeKind::Item(placement.item_id.clone()),
            generation,
            placement.model_path.clone(),
            asset,
            placement.transform,
        ));
        Some(self.nodes.len() - 1)
    }

    /// Centre of the item's world bounds, falling back to its placement origin.
    pub fn item_focus_point(&self, item_id: &str) -> Option<Vec3> {
        let node = self.item(item_id)?;
        Some(
            node.world_bounds
                .map(|b| b.center())
                .unwrap_or(node.transform.translation),
        )
    }

    /// Nearest hit across lab and items. `direction` must be normalised for
    /// `distance` to be in world units.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, clip: Option<&ClipPlane>) -> Option<RayHit> {
        self.nodes
            .iter()
            .filter_map(|n| n.raycast(origin, direction, clip))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    pub fn nodes_for_generation(&self, generation: u64) -> usize {
        self.nodes.iter().filter(|n| n.generation == generation).count()
    }
}
