use bevy::{
    pbr::{ExtendedMaterial, MaterialExtension},
    prelude::*,
    render::render_resource::{AsBindGroup, ShaderRef, ShaderType},
};

use crate::engine::clip::ceiling_clip::ClipPlane;
use crate::engine::scene::spawner::MeshLibrary;

const SHADER_ASSET_PATH: &str = "shaders/ceiling_clip.wgsl";

/// Lab surface material: standard PBR plus the ceiling cutaway.
pub type ClipMaterial = ExtendedMaterial<StandardMaterial, CeilingClipExtension>;

/// GPU layout of [`ClipPlane`].
#[derive(Debug, Clone, Copy, PartialEq, ShaderType, Reflect)]
pub struct ClipPlaneUniform {
    pub normal: Vec3,
    pub constant: f32,
    pub enabled: u32,
}

impl From<ClipPlane> for ClipPlaneUniform {
    fn from(plane: ClipPlane) -> Self {
        Self {
            normal: plane.normal,
            constant: plane.constant,
            enabled: plane.enabled as u32,
        }
    }
}

#[derive(Asset, AsBindGroup, Reflect, Debug, Clone)]
pub struct CeilingClipExtension {
    #[uniform(100)]
    pub plane: ClipPlaneUniform,
}

impl CeilingClipExtension {
    pub fn new(plane: ClipPlane) -> Self {
        Self {
            plane: plane.into(),
        }
    }
}

impl MaterialExtension for CeilingClipExtension {
    fn fragment_shader() -> ShaderRef {
        SHADER_ASSET_PATH.into()
    }
}

/// Push the current plane into the current lab's shared clip materials.
///
/// Lab surfaces share one material per look, so a plane change touches a
/// handful of materials rather than one per surface. Materials already holding
/// the plane are left alone so they are not re-uploaded.
pub fn apply_clip_plane(
    plane: Res<ClipPlane>,
    library: Res<MeshLibrary>,
    mut materials: ResMut<Assets<ClipMaterial>>,
) {
    if !plane.is_changed() {
        return;
    }
    let uniform = ClipPlaneUniform::from(*plane);
    for handle in library.lab_materials() {
        if materials.get(handle).is_some_and(|m| m.extension.plane != uniform) {
            if let Some(material) = materials.get_mut(handle) {
                material.extension.plane = uniform;
            }
        }
    }
}
