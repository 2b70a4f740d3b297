use std::collections::HashMap;

use bevy::{
    asset::RenderAssetUsages,
    prelude::*,
    render::mesh::{Indices, PrimitiveTopology},
    render::render_resource::{Extent3d, Face, TextureDimension, TextureFormat},
};

use crate::engine::assets::scene_asset::{SceneAsset, SurfaceGeometry, TextureData};
use crate::engine::clip::ceiling_clip::ClipPlane;
use crate::engine::clip::clip_material::{CeilingClipExtension, ClipMaterial};
use crate::engine::scene::composer::{CompositeScene, NodeKind, SceneNode};
use crate::engine::scene::surface_class::SurfaceClass;
use constants::surface::GLASS_ALPHA;

/// Marks the root entity of a composed node so it can be disposed with its lab.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct SceneNodeTag {
    pub generation: u64,
    pub kind: NodeKind,
}

/// Lab surfaces that look alike share one clip material.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LabMaterialKey {
    class: SurfaceClass,
    colour: [u32; 4],
    texture: Option<Handle<Image>>,
}

/// GPU handles per model path. Every placement of a model reuses the same
/// meshes, textures and item materials. Cleared on lab switch so the previous
/// lab's GPU resources are released once its entities are gone.
#[derive(Resource, Default)]
pub struct MeshLibrary {
    meshes: HashMap<String, Vec<Handle<Mesh>>>,
    item_materials: HashMap<String, Vec<Handle<StandardMaterial>>>,
    textures: HashMap<(String, usize), Handle<Image>>,
    lab_materials: HashMap<LabMaterialKey, Handle<ClipMaterial>>,
}

impl MeshLibrary {
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.item_materials.clear();
        self.textures.clear();
        self.lab_materials.clear();
    }

    pub fn cached_models(&self) -> usize {
        self.meshes.len()
    }

    /// Clip materials of the current lab. The only materials the clip plane is written to.
    pub fn lab_materials(&self) -> impl Iterator<Item = &Handle<ClipMaterial>> {
        self.lab_materials.values()
    }

    fn texture_for(
        &mut self,
        path: &str,
        asset: &SceneAsset,
        surface: &SurfaceGeometry,
        images: &mut Assets<Image>,
    ) -> Option<Handle<Image>> {
        let (index, texture) = asset.texture_of(surface)?;
        Some(
            self.textures
                .entry((path.to_string(), index))
                .or_insert_with(|| images.add(texture_image(texture)))
                .clone(),
        )
    }

    fn lab_material_for(
        &mut self,
        surface: &SurfaceGeometry,
        class: SurfaceClass,
        texture: Option<Handle<Image>>,
        plane: ClipPlane,
        materials: &mut Assets<ClipMaterial>,
    ) -> Handle<ClipMaterial> {
        let key = LabMaterialKey {
            class,
            colour: surface.base_colour.map(f32::to_bits),
            texture: texture.clone(),
        };
        self.lab_materials
            .entry(key)
            .or_insert_with(|| materials.add(lab_material(surface, class, texture, plane)))
            .clone()
    }

    fn meshes_for(
        &mut self,
        path: &str,
        asset: &SceneAsset,
        meshes: &mut Assets<Mesh>,
    ) -> Vec<Handle<Mesh>> {
        self.meshes
            .entry(path.to_string())
            .or_insert_with(|| {
                asset
                    .surfaces
                    .iter()
                    .map(|s| meshes.add(build_mesh(s)))
                    .collect()
            })
            .clone()
    }

    fn item_materials_for(
        &mut self,
        path: &str,
        asset: &SceneAsset,
        materials: &mut Assets<StandardMaterial>,
        images: &mut Assets<Image>,
    ) -> Vec<Handle<StandardMaterial>> {
        if let Some(cached) = self.item_materials.get(path) {
            return cached.clone();
        }
        let built: Vec<_> = asset
            .surfaces
            .iter()
            .map(|s| {
                let texture = self.texture_for(path, asset, s, images);
                materials.add(surface_material(s, texture))
            })
            .collect();
        self.item_materials.insert(path.to_string(), built.clone());
        built
    }
}

fn build_mesh(surface: &SurfaceGeometry) -> Mesh {
    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::RENDER_WORLD,
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, surface.positions.clone());
    if let Some(uvs) = surface.uvs.as_ref().filter(|uv| uv.len() == surface.positions.len()) {
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs.clone());
    }
    mesh.insert_indices(Indices::U32(surface.indices.clone()));
    match &surface.normals {
        Some(normals) if normals.len() == surface.positions.len() => {
            mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals.clone());
        }
        _ => mesh.compute_normals(),
    }
    mesh
}

fn texture_image(texture: &TextureData) -> Image {
    Image::new(
        Extent3d {
            width: texture.width,
            height: texture.height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        texture.rgba.clone(),
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::RENDER_WORLD,
    )
}

fn surface_material(surface: &SurfaceGeometry, texture: Option<Handle<Image>>) -> StandardMaterial {
    let [r, g, b, a] = surface.base_colour;
    StandardMaterial {
        base_color: Color::linear_rgba(r, g, b, a),
        base_color_texture: texture,
        alpha_mode: if a < 1.0 {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        ..default()
    }
}

fn lab_material(
    surface: &SurfaceGeometry,
    class: SurfaceClass,
    texture: Option<Handle<Image>>,
    plane: ClipPlane,
) -> ClipMaterial {
    let mut base = surface_material(surface, texture);
    if class == SurfaceClass::Glass {
        let [r, g, b, a] = surface.base_colour;
        base.base_color = Color::linear_rgba(r, g, b, a.min(GLASS_ALPHA));
        base.alpha_mode = AlphaMode::Blend;
    }
    base.double_sided = class.double_sided();
    base.cull_mode = if class.double_sided() {
        None
    } else {
        Some(Face::Back)
    };

    ClipMaterial {
        base,
        extension: CeilingClipExtension::new(plane),
    }
}

/// Spawn entities for nodes composed since the last frame.
pub fn spawn_scene_nodes(
    mut commands: Commands,
    mut scene: ResMut<CompositeScene>,
    mut library: ResMut<MeshLibrary>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut clip_materials: ResMut<Assets<ClipMaterial>>,
    mut item_materials: ResMut<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
    plane: Res<ClipPlane>,
) {
    if scene.nodes().iter().all(|n| n.entity.is_some()) {
        return;
    }

    for node in scene.nodes_mut().iter_mut().filter(|n| n.entity.is_none()) {
        let surface_meshes = library.meshes_for(&node.model_path, &node.asset, &mut meshes);
        let root = commands
            .spawn((
                SceneNodeTag {
                    generation: node.generation,
                    kind: node.kind.clone(),
                },
                node.transform,
                Visibility::default(),
            ))
            .id();

        match &node.kind {
            NodeKind::Lab => spawn_lab_surfaces(
                &mut commands,
                root,
                node,
                surface_meshes,
                &mut library,
                &mut clip_materials,
                &mut images,
                *plane,
            ),
            NodeKind::Item(id) => {
                let materials = library.item_materials_for(
                    &node.model_path,
                    &node.asset,
                    &mut item_materials,
                    &mut images,
                );
                for ((surface, mesh), material) in
                    node.asset.surfaces.iter().zip(surface_meshes).zip(materials)
                {
                    commands.entity(root).with_child((
                        Mesh3d(mesh),
                        MeshMaterial3d(material),
                        Transform::from_matrix(surface.transform),
                    ));
                }
                debug!("Spawned item {id} from {}", node.model_path);
            }
        }
        node.entity = Some(root);
    }
}

fn spawn_lab_surfaces(
    commands: &mut Commands,
    root: Entity,
    node: &SceneNode,
    surface_meshes: Vec<Handle<Mesh>>,
    library: &mut MeshLibrary,
    materials: &mut Assets<ClipMaterial>,
    images: &mut Assets<Image>,
    plane: ClipPlane,
) {
    let mut glass = 0;
    for ((surface, mesh), class) in node
        .asset
        .surfaces
        .iter()
        .zip(surface_meshes)
        .zip(node.surface_classes.iter().copied())
    {
        if class == SurfaceClass::Glass {
            glass += 1;
        }
        let texture = library.texture_for(&node.model_path, &node.asset, surface, images);
        let material = library.lab_material_for(surface, class, texture, plane, materials);
        commands.entity(root).with_child((
            Mesh3d(mesh),
            MeshMaterial3d(material),
            Transform::from_matrix(surface.transform),
        ));
    }
    info!(
        "Spawned lab {} ({} surfaces, {} glass, {} materials)",
        node.model_path,
        node.asset.surfaces.len(),
        glass,
        library.lab_materials.len()
    );
}

/// Despawn every node root that does not belong to the current scene generation.
pub fn despawn_stale_nodes(
    mut commands: Commands,
    scene: Res<CompositeScene>,
    nodes: Query<(Entity, &SceneNodeTag)>,
) {
    let current = scene.generation();
    let mut removed = 0;
    for (entity, tag) in &nodes {
        if tag.generation != current || scene.nodes().is_empty() {
            commands.entity(entity).despawn();
            removed += 1;
        }
    }
    if removed > 0 {
        debug!("Disposed {removed} scene nodes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::records::fixtures::at;
    use crate::engine::assets::records::partition_placements;
    use crate::engine::assets::records::PlacementSet;
    use crate::engine::assets::scene_asset::fixtures::{box_asset, box_surface, png, textured_triangle};
    use crate::engine::assets::scene_asset::ExternalFiles;
    use crate::engine::clip::clip_material::apply_clip_plane;
    use std::sync::Arc;

    fn app() -> App {
        let mut app = App::new();
        app.init_resource::<Assets<Mesh>>()
            .init_resource::<Assets<ClipMaterial>>()
            .init_resource::<Assets<StandardMaterial>>()
            .init_resource::<Assets<Image>>()
            .init_resource::<MeshLibrary>()
            .init_resource::<ClipPlane>()
            .init_resource::<CompositeScene>()
            .add_systems(Update, (despawn_stale_nodes, spawn_scene_nodes).chain());
        app
    }

    fn tagged(app: &mut App, generation: u64) -> usize {
        let mut query = app.world_mut().query::<&SceneNodeTag>();
        query
            .iter(app.world())
            .filter(|t| t.generation == generation)
            .count()
    }

    fn compose(app: &mut App, generation: u64, items: usize) {
        let lab = Arc::new(SceneAsset {
            surfaces: vec![
                box_surface("Wall", Vec3::ZERO, Vec3::new(10.0, 3.0, 10.0)),
                box_surface("Window", Vec3::ZERO, Vec3::new(1.0, 1.0, 0.1)),
            ],
            ..default()
        });
        let placements: Vec<_> = (0..items)
            .map(|i| at(&format!("item{i}"), "crate.glb", i as f32, 0.0, 1.0))
            .collect();
        let set = partition_placements(&placements);
        let mut composition = CompositeScene::compose("lab.glb", lab, &set, generation);
        let model = Arc::new(box_asset(Vec3::ZERO, Vec3::ONE));
        for p in &set.items {
            composition.scene.add_item(p, model.clone(), generation);
        }
        app.insert_resource(composition.scene);
    }

    #[test]
    fn spawns_lab_and_shares_item_meshes() {
        let mut app = app();
        compose(&mut app, 1, 3);
        app.update();

        assert_eq!(tagged(&mut app, 1), 4);
        // Lab and crate model each built once.
        assert_eq!(app.world().resource::<MeshLibrary>().cached_models(), 2);
        assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 3);
        assert_eq!(app.world().resource::<Assets<ClipMaterial>>().len(), 2);
        assert_eq!(app.world().resource::<Assets<StandardMaterial>>().len(), 1);
    }

    #[test]
    fn switching_generation_disposes_previous_nodes() {
        let mut app = app();
        compose(&mut app, 1, 2);
        app.update();
        assert_eq!(tagged(&mut app, 1), 3);

        app.world_mut().resource_mut::<MeshLibrary>().clear();
        compose(&mut app, 2, 1);
        app.update();

        assert_eq!(tagged(&mut app, 1), 0);
        assert_eq!(tagged(&mut app, 2), 2);
    }

    #[test]
    fn glass_is_double_sided_and_translucent() {
        let surface = box_surface("Window", Vec3::ZERO, Vec3::ONE);
        let glass = lab_material(&surface, SurfaceClass::Glass, None, ClipPlane::disabled());
        assert!(glass.base.double_sided);
        assert_eq!(glass.base.cull_mode, None);
        assert_eq!(glass.base.alpha_mode, AlphaMode::Blend);

        let wall = lab_material(&surface, SurfaceClass::Opaque, None, ClipPlane::disabled());
        assert_eq!(wall.base.cull_mode, Some(Face::Back));
        assert!(!wall.base.double_sided);
    }

    #[derive(Resource, Default)]
    struct MaterialWrites(usize);

    fn count_material_writes(
        mut events: EventReader<AssetEvent<ClipMaterial>>,
        mut writes: ResMut<MaterialWrites>,
    ) {
        writes.0 += events
            .read()
            .filter(|e| matches!(e, AssetEvent::Modified { .. }))
            .count();
    }

    fn asset_app(lab: SceneAsset) -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, AssetPlugin::default()))
            .init_asset::<Mesh>()
            .init_asset::<Image>()
            .init_asset::<StandardMaterial>()
            .init_asset::<ClipMaterial>()
            .init_resource::<MeshLibrary>()
            .init_resource::<ClipPlane>()
            .init_resource::<MaterialWrites>()
            .add_systems(Update, (spawn_scene_nodes, apply_clip_plane).chain())
            .add_systems(Last, count_material_writes);
        let composition = CompositeScene::compose("lab.gltf", Arc::new(lab), &PlacementSet::default(), 1);
        app.insert_resource(composition.scene);
        app
    }

    fn set_plane(app: &mut App, plane: ClipPlane) {
        *app.world_mut().resource_mut::<ClipPlane>() = plane;
        app.update();
    }

    #[test]
    fn plane_changes_write_each_shared_material_once() {
        let mut app = asset_app(SceneAsset {
            surfaces: vec![
                box_surface("Wall_North", Vec3::ZERO, Vec3::ONE),
                box_surface("Wall_South", Vec3::ZERO, Vec3::ONE),
                box_surface("Floor", Vec3::ZERO, Vec3::ONE),
                box_surface("Window_East", Vec3::ZERO, Vec3::ONE),
                box_surface("Window_West", Vec3::ZERO, Vec3::ONE),
            ],
            ..default()
        });
        app.update();
        assert_eq!(app.world().resource::<Assets<ClipMaterial>>().len(), 2);
        assert_eq!(app.world().resource::<MaterialWrites>().0, 0);

        let cut = ClipPlane {
            normal: Vec3::NEG_Y,
            constant: 2.5,
            enabled: true,
        };
        set_plane(&mut app, cut);
        assert_eq!(app.world().resource::<MaterialWrites>().0, 2);

        // Same value again and idle frames upload nothing.
        set_plane(&mut app, cut);
        app.update();
        assert_eq!(app.world().resource::<MaterialWrites>().0, 2);

        set_plane(&mut app, ClipPlane::disabled());
        assert_eq!(app.world().resource::<MaterialWrites>().0, 4);

        let materials = app.world().resource::<Assets<ClipMaterial>>();
        assert!(materials.iter().all(|(_, m)| m.extension.plane.enabled == 0));
    }

    #[test]
    fn textured_surfaces_get_uvs_and_image() {
        let (json, bin) = textured_triangle("lab.bin", "wall.png");
        let files = ExternalFiles::from([
            ("lab.bin".to_string(), bin),
            ("wall.png".to_string(), png(4, 4, [90, 90, 200, 255])),
        ]);
        let lab = SceneAsset::from_gltf(gltf::Gltf::from_slice(&json).unwrap(), &files).unwrap();
        let mut app = asset_app(lab);
        app.update();

        assert_eq!(app.world().resource::<Assets<Image>>().len(), 1);

        let meshes = app.world().resource::<Assets<Mesh>>();
        let (_, mesh) = meshes.iter().next().unwrap();
        assert!(mesh.attribute(Mesh::ATTRIBUTE_UV_0).is_some());

        let materials = app.world().resource::<Assets<ClipMaterial>>();
        let (_, material) = materials.iter().next().unwrap();
        assert!(material.base.base_color_texture.is_some());
    }
}
