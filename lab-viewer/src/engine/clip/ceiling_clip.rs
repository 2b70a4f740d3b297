use bevy::prelude::*;

use crate::engine::assets::bounds::SceneBounds;
use crate::engine::camera::controller::ViewerCamera;
use crate::engine::scene::composer::CompositeScene;
use constants::clip::{CEILING_MARGIN, CLIP_NORMAL, CLIP_OFFSET};

/// Cutaway plane shared by every lab surface material.
///
/// A point `p` is clipped when `enabled` and `normal·p + constant < 0`.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct ClipPlane {
    pub normal: Vec3,
    pub constant: f32,
    pub enabled: bool,
}

impl Default for ClipPlane {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ClipPlane {
    pub fn disabled() -> Self {
        Self {
            normal: Vec3::from_array(CLIP_NORMAL),
            constant: 0.0,
            enabled: false,
        }
    }

    pub fn clips(&self, point: Vec3) -> bool {
        self.enabled && self.normal.dot(point) + self.constant < 0.0
    }
}

/// Derives the ceiling cutaway from the camera height each frame.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct CeilingClipController {
    pub ceiling_margin: f32,
    pub clip_offset: f32,
}

impl Default for CeilingClipController {
    fn default() -> Self {
        Self {
            ceiling_margin: CEILING_MARGIN,
            clip_offset: CLIP_OFFSET,
        }
    }
}

impl CeilingClipController {
    /// Enabled once the camera reaches the roof line; the cut then follows the
    /// camera up so the interior stays visible from above.
    pub fn update(&self, camera_y: f32, bounds: &SceneBounds) -> ClipPlane {
        if camera_y >= bounds.max_y() - self.ceiling_margin {
            ClipPlane {
                normal: Vec3::from_array(CLIP_NORMAL),
                constant: camera_y + self.clip_offset,
                enabled: true,
            }
        } else {
            ClipPlane::disabled()
        }
    }
}

/// Recompute the cutaway from the camera height. The resource only registers a
/// change when the plane value differs, which keeps material uploads rare.
pub fn update_clip_plane(
    controller: Res<CeilingClipController>,
    scene: Res<CompositeScene>,
    camera: Query<&Transform, With<ViewerCamera>>,
    mut plane: ResMut<ClipPlane>,
) {
    let Some(bounds) = scene.lab_bounds() else {
        return;
    };
    let Ok(transform) = camera.single() else {
        return;
    };
    plane.set_if_neq(controller.update(transform.translation.y, &bounds));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::records::PlacementSet;
    use crate::engine::assets::scene_asset::fixtures::box_asset;
    use std::sync::Arc;

    fn room() -> SceneBounds {
        SceneBounds::new(Vec3::new(-4.0, 0.0, -4.0), Vec3::new(4.0, 3.0, 4.0))
    }

    #[test]
    fn threshold_at_roof_minus_margin() {
        let controller = CeilingClipController::default();

        let inside = controller.update(2.85, &room());
        assert!(!inside.enabled);
        assert!(!inside.clips(Vec3::new(0.0, 100.0, 0.0)));

        let above = controller.update(3.0, &room());
        assert!(above.enabled);
        assert!((above.constant - 3.35).abs() < 1e-6);
        assert_eq!(above.normal, Vec3::NEG_Y);
    }

    #[test]
    fn near_roof_enables_within_margin() {
        let controller = CeilingClipController::default();
        // 2.95 >= 3.0 - 0.1
        assert!(controller.update(2.95, &room()).enabled);
        assert!(!controller.update(2.89, &room()).enabled);
    }

    #[test]
    fn clips_only_above_constant() {
        let plane = CeilingClipController::default().update(5.0, &room());
        assert!(plane.clips(Vec3::new(0.0, 5.5, 0.0)));
        assert!(!plane.clips(Vec3::new(0.0, 5.3, 0.0)));
        assert!(!plane.clips(Vec3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn constant_non_decreasing_in_camera_height() {
        let controller = CeilingClipController::default();
        let mut last = f32::NEG_INFINITY;
        for step in 0..100 {
            let plane = controller.update(2.9 + step as f32 * 0.05, &room());
            if plane.enabled {
                assert!(plane.constant >= last);
                last = plane.constant;
            }
        }
        assert!(last > 3.35);
    }

    #[test]
    fn system_tracks_camera_height() {
        let mut app = App::new();
        let composition = CompositeScene::compose(
            "lab.glb",
            Arc::new(box_asset(Vec3::new(-4.0, 0.0, -4.0), Vec3::new(4.0, 3.0, 4.0))),
            &PlacementSet::default(),
            1,
        );
        app.insert_resource(composition.scene)
            .init_resource::<CeilingClipController>()
            .init_resource::<ClipPlane>()
            .add_systems(Update, update_clip_plane);
        let camera = app
            .world_mut()
            .spawn((ViewerCamera, Transform::from_xyz(0.0, 5.0, 0.0)))
            .id();

        app.update();
        let plane = *app.world().resource::<ClipPlane>();
        assert!(plane.enabled);
        assert!((plane.constant - 5.35).abs() < 1e-5);

        app.world_mut()
            .entity_mut(camera)
            .insert(Transform::from_xyz(0.0, 1.5, 0.0));
        app.update();
        assert!(!app.world().resource::<ClipPlane>().enabled);
    }
}
