use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::input::touch::Touches;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::engine::camera::bounds_fitter::FitResult;
use crate::engine::camera::camera_rig::CameraRig;
use crate::engine::clip::ceiling_clip::ClipPlane;
use crate::engine::scene::composer::CompositeScene;
use constants::camera::{DOUBLE_CLICK_SECS, DOUBLE_CLICK_SLOP_PX, PIXELS_PER_LINE, ZOOM_STEP};

/// The single 3D camera driven by the [`CameraRig`].
#[derive(Component)]
pub struct ViewerCamera;

/// Two presses close in time and space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleClickDetector {
    window_secs: f32,
    slop_px: f32,
    last: Option<(f32, Vec2)>,
}

impl Default for DoubleClickDetector {
    fn default() -> Self {
        Self::new(DOUBLE_CLICK_SECS, DOUBLE_CLICK_SLOP_PX)
    }
}

impl DoubleClickDetector {
    pub fn new(window_secs: f32, slop_px: f32) -> Self {
        Self {
            window_secs,
            slop_px,
            last: None,
        }
    }

    /// Record a press. True when it completes a double press; the pair is then consumed.
    pub fn register(&mut self, time: f32, position: Vec2) -> bool {
        if let Some((t, p)) = self.last.take() {
            if time - t <= self.window_secs && position.distance(p) <= self.slop_px {
                return true;
            }
        }
        self.last = Some((time, position));
        false
    }
}

/// Pointer bookkeeping carried between frames.
#[derive(Resource, Debug)]
pub struct PointerInput {
    pub double_click: DoubleClickDetector,
    pub double_tap: DoubleClickDetector,
    /// Distance scale per wheel line.
    pub zoom_step: f32,
    /// Finger span and midpoint of the previous two-finger frame.
    last_pinch: Option<(f32, Vec2)>,
}

impl Default for PointerInput {
    fn default() -> Self {
        Self::new(DOUBLE_CLICK_SECS, DOUBLE_CLICK_SLOP_PX, ZOOM_STEP)
    }
}

impl PointerInput {
    pub fn new(window_secs: f32, slop_px: f32, zoom_step: f32) -> Self {
        Self {
            double_click: DoubleClickDetector::new(window_secs, slop_px),
            double_tap: DoubleClickDetector::new(window_secs, slop_px),
            zoom_step,
            last_pinch: None,
        }
    }
}

/// Raycast the composed scene and move the orbit target to the hit.
/// Clipped lab geometry is skipped so the pick matches what is on screen.
pub fn refocus(
    rig: &mut CameraRig,
    scene: &CompositeScene,
    plane: &ClipPlane,
    ray: Ray3d,
) -> Option<Vec3> {
    let hit = scene.raycast(ray.origin, *ray.direction, Some(plane))?;
    rig.retarget(hit.point);
    Some(hit.point)
}

/// Left drag rotates, right or middle drag pans, the wheel zooms.
pub fn mouse_orbit_controls(
    rig: Option<ResMut<CameraRig>>,
    input: Res<PointerInput>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: EventReader<MouseMotion>,
    mut scroll_events: EventReader<MouseWheel>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    let mouse_delta: Vec2 = mouse_motion.read().map(|m| m.delta).sum();
    let lines: f32 = scroll_events
        .read()
        .map(|ev| match ev.unit {
            MouseScrollUnit::Line => ev.y,
            MouseScrollUnit::Pixel => ev.y / PIXELS_PER_LINE,
        })
        .sum();

    let Some(mut rig) = rig else {
        return;
    };
    let Ok(window) = windows.single() else {
        return;
    };
    let height = window.height();

    if mouse_delta != Vec2::ZERO {
        if mouse_button.pressed(MouseButton::Left) {
            rig.rotate(mouse_delta, height);
        } else if mouse_button.any_pressed([MouseButton::Right, MouseButton::Middle]) {
            rig.pan(mouse_delta, height);
        }
    }

    if lines.abs() > f32::EPSILON {
        rig.zoom(input.zoom_step.powf(lines));
    }
}

/// One finger rotates; two fingers pinch to zoom and drag to pan.
pub fn touch_orbit_controls(
    rig: Option<ResMut<CameraRig>>,
    mut input: ResMut<PointerInput>,
    touches: Res<Touches>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    let Some(mut rig) = rig else {
        return;
    };
    let Ok(window) = windows.single() else {
        return;
    };
    let height = window.height();
    let active: Vec<_> = touches.iter().collect();

    match active.as_slice() {
        [one] => {
            input.last_pinch = None;
            let delta = one.delta();
            if delta != Vec2::ZERO {
                rig.rotate(delta, height);
            }
        }
        [a, b, ..] => {
            let span = a.position().distance(b.position());
            let mid = (a.position() + b.position()) * 0.5;
            if let Some((last_span, last_mid)) = input.last_pinch {
                if span > f32::EPSILON && last_span > f32::EPSILON {
                    rig.zoom(last_span / span);
                }
                rig.pan(mid - last_mid, height);
            }
            input.last_pinch = Some((span, mid));
        }
        [] => input.last_pinch = None,
    }
}

/// Double-click or double-tap re-centres the orbit on the picked surface point.
pub fn double_click_refocus(
    rig: Option<ResMut<CameraRig>>,
    mut input: ResMut<PointerInput>,
    scene: Res<CompositeScene>,
    plane: Res<ClipPlane>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    touches: Res<Touches>,
    windows: Query<&Window, With<PrimaryWindow>>,
    camera: Query<(&Camera, &GlobalTransform), With<ViewerCamera>>,
    time: Res<Time>,
) {
    let Some(mut rig) = rig else {
        return;
    };
    let now = time.elapsed_secs();

    let mut pressed_at = None;
    if mouse_button.just_pressed(MouseButton::Left) {
        if let Some(cursor) = windows.single().ok().and_then(|w| w.cursor_position()) {
            if input.double_click.register(now, cursor) {
                pressed_at = Some(cursor);
            }
        }
    }
    for touch in touches.iter_just_pressed() {
        if touches.iter().count() == 1 && input.double_tap.register(now, touch.position()) {
            pressed_at = Some(touch.position());
        }
    }

    let Some(screen_pos) = pressed_at else {
        return;
    };
    let Ok((camera, camera_transform)) = camera.single() else {
        return;
    };
    let Ok(ray) = camera.viewport_to_world(camera_transform, screen_pos) else {
        return;
    };

    match refocus(&mut rig, &scene, &plane, ray) {
        Some(point) => debug!("Refocused on {point:?}"),
        None => debug!("Double-click hit nothing"),
    }
}

/// `F` returns to the initial framing of the current lab.
pub fn reframe_shortcut(
    keyboard: Res<ButtonInput<KeyCode>>,
    rig: Option<ResMut<CameraRig>>,
    fit: Option<Res<FitResult>>,
) {
    if !keyboard.just_pressed(KeyCode::KeyF) {
        return;
    }
    if let (Some(mut rig), Some(fit)) = (rig, fit) {
        rig.reset(&fit);
        info!("Camera reframed");
    }
}

/// Advance damping and write the rig pose to the camera.
pub fn apply_camera_rig(
    rig: Option<ResMut<CameraRig>>,
    mut camera: Query<&mut Transform, With<ViewerCamera>>,
) {
    let Some(mut rig) = rig else {
        return;
    };
    rig.update();
    if let Ok(mut transform) = camera.single_mut() {
        transform.set_if_neq(rig.transform());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::records::PlacementSet;
    use crate::engine::assets::bounds::SceneBounds;
    use crate::engine::assets::scene_asset::fixtures::box_asset;
    use crate::engine::camera::bounds_fitter::BoundsFitter;
    use crate::engine::camera::camera_rig::RigTuning;
    use std::sync::Arc;

    #[test]
    fn double_click_needs_time_and_proximity() {
        let mut detector = DoubleClickDetector::new(0.35, 6.0);
        assert!(!detector.register(1.0, Vec2::new(100.0, 100.0)));
        assert!(detector.register(1.2, Vec2::new(103.0, 101.0)));

        // A third press starts a new pair.
        assert!(!detector.register(1.3, Vec2::new(103.0, 101.0)));
        assert!(!detector.register(2.0, Vec2::new(103.0, 101.0)));
        assert!(!detector.register(2.1, Vec2::new(200.0, 101.0)));
    }

    #[test]
    fn refocus_moves_target_to_hit_point() {
        let room = SceneBounds::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 3.0, 5.0));
        let scene = CompositeScene::compose(
            "lab.glb",
            Arc::new(box_asset(room.min, room.max)),
            &PlacementSet::default(),
            1,
        )
        .scene;
        let fit = BoundsFitter::default().fit(room);
        let mut rig = CameraRig::from_fit(
            &fit,
            RigTuning {
                damping: None,
                ..default()
            },
        );
        let distance = rig.state().distance();

        // Straight down through the roof, which the plane cuts away: lands on the floor.
        let plane = ClipPlane {
            normal: Vec3::NEG_Y,
            constant: 2.5,
            enabled: true,
        };
        let ray = Ray3d::new(Vec3::new(1.0, 8.0, 2.0), Dir3::NEG_Y);
        let point = refocus(&mut rig, &scene, &plane, ray).unwrap();

        assert!(point.distance(Vec3::new(1.0, 0.0, 2.0)) < 1e-4);
        assert!(rig.state().target.distance(point) < 1e-4);
        assert!((rig.state().distance() - distance).abs() < 1e-4);
    }

    #[test]
    fn refocus_miss_leaves_rig_untouched() {
        let scene = CompositeScene::compose(
            "lab.glb",
            Arc::new(box_asset(Vec3::ZERO, Vec3::ONE)),
            &PlacementSet::default(),
            1,
        )
        .scene;
        let fit = BoundsFitter::default().fit(SceneBounds::new(Vec3::ZERO, Vec3::ONE));
        let mut rig = CameraRig::from_fit(&fit, RigTuning::default());
        let before = rig.clone();

        let ray = Ray3d::new(Vec3::new(10.0, 10.0, 10.0), Dir3::Y);
        assert!(refocus(&mut rig, &scene, &ClipPlane::disabled(), ray).is_none());
        assert_eq!(rig, before);
    }
}
