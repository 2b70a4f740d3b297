use bevy::prelude::*;

use crate::engine::camera::bounds_fitter::FitResult;
use constants::camera::{
    DAMPING_FACTOR, FOV_DEGREES, MAX_DISTANCE_FACTOR, MIN_DISTANCE, PAN_SPEED, POLAR_ANGLE_MAX,
    POLAR_ANGLE_MIN, ROTATE_SPEED,
};

/// Interactive camera state for one lab view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    pub target: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub polar_angle_max: f32,
}

impl CameraState {
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }
}

/// Input sensitivities, fixed for the lifetime of the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigTuning {
    /// Vertical field of view in radians, used to scale panning.
    pub fov: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance_factor: f32,
    pub polar_angle_min: f32,
    pub polar_angle_max: f32,
    /// Fraction of pending rotate/pan applied per frame. `None` applies input immediately.
    pub damping: Option<f32>,
}

impl Default for RigTuning {
    fn default() -> Self {
        Self {
            fov: FOV_DEGREES.to_radians(),
            rotate_speed: ROTATE_SPEED,
            pan_speed: PAN_SPEED,
            min_distance: MIN_DISTANCE,
            max_distance_factor: MAX_DISTANCE_FACTOR,
            polar_angle_min: POLAR_ANGLE_MIN,
            polar_angle_max: POLAR_ANGLE_MAX,
            damping: Some(DAMPING_FACTOR),
        }
    }
}

/// Camera offset from the target: radius, polar angle from +Y, azimuth about +Y.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Spherical {
    radius: f32,
    polar: f32,
    azimuth: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return Self {
                radius: 0.0,
                polar: 0.0,
                azimuth: 0.0,
            };
        }
        Self {
            radius,
            polar: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            azimuth: offset.x.atan2(offset.z),
        }
    }

    fn to_offset(self) -> Vec3 {
        let (sin_p, cos_p) = self.polar.sin_cos();
        let (sin_a, cos_a) = self.azimuth.sin_cos();
        Vec3::new(
            self.radius * sin_p * sin_a,
            self.radius * cos_p,
            self.radius * sin_p * cos_a,
        )
    }
}

/// Orbit controller: rotate about the target, zoom along the view ray, pan in
/// screen space and jump the target to a picked point.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct CameraRig {
    state: CameraState,
    tuning: RigTuning,
    /// Pending (azimuth, polar) rotation in radians.
    rotate_delta: Vec2,
    pan_delta: Vec3,
}

impl CameraRig {
    pub fn from_fit(fit: &FitResult, tuning: RigTuning) -> Self {
        let mut rig = Self {
            state: CameraState {
                position: fit.initial_camera_position,
                target: fit.initial_target,
                min_distance: tuning.min_distance,
                max_distance: (fit.distance * tuning.max_distance_factor)
                    .max(tuning.min_distance),
                polar_angle_max: tuning.polar_angle_max,
            },
            tuning,
            rotate_delta: Vec2::ZERO,
            pan_delta: Vec3::ZERO,
        };
        rig.apply_limits();
        rig
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn tuning(&self) -> &RigTuning {
        &self.tuning
    }

    /// Back to the fitted framing, dropping any pending motion.
    pub fn reset(&mut self, fit: &FitResult) {
        *self = Self::from_fit(fit, self.tuning);
    }

    /// Queue a rotation from a pointer drag of `delta_px` in a viewport `viewport_height` tall.
    pub fn rotate(&mut self, delta_px: Vec2, viewport_height: f32) {
        if viewport_height <= 0.0 {
            return;
        }
        let scale = self.tuning.rotate_speed / viewport_height;
        self.rotate_delta -= delta_px * scale;
    }

    /// Multiply the orbit distance by `factor` (< 1 moves closer), clamped to the limits.
    pub fn zoom(&mut self, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let mut spherical = Spherical::from_offset(self.state.position - self.state.target);
        spherical.radius =
            (spherical.radius * factor).clamp(self.state.min_distance, self.state.max_distance);
        self.state.position = self.state.target + spherical.to_offset();
    }

    /// Queue a screen-space pan. The grabbed point follows the pointer at the target depth.
    pub fn pan(&mut self, delta_px: Vec2, viewport_height: f32) {
        if viewport_height <= 0.0 {
            return;
        }
        let offset = self.state.position - self.state.target;
        let target_distance = offset.length() * (self.tuning.fov * 0.5).tan();
        let world_per_px = 2.0 * target_distance / viewport_height * self.tuning.pan_speed;

        let forward = (-offset).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward);
        self.pan_delta += -right * delta_px.x * world_per_px + up * delta_px.y * world_per_px;
    }

    /// Move the target to `point` keeping the current distance and orientation.
    pub fn retarget(&mut self, point: Vec3) {
        let offset = self.state.position - self.state.target;
        self.state.target = point;
        self.state.position = point + offset;
        self.pan_delta = Vec3::ZERO;
    }

    /// Apply pending motion. Call once per frame. Returns true while the camera is moving.
    pub fn update(&mut self) -> bool {
        if self.rotate_delta == Vec2::ZERO && self.pan_delta == Vec3::ZERO {
            return false;
        }
        let step = self.tuning.damping.map_or(1.0, |d| d.clamp(0.01, 1.0));
        let mut spherical = Spherical::from_offset(self.state.position - self.state.target);
        spherical.azimuth += self.rotate_delta.x * step;
        spherical.polar += self.rotate_delta.y * step;
        self.state.target += self.pan_delta * step;
        self.state.position = self.state.target + spherical.to_offset();
        self.apply_limits();

        if self.tuning.damping.is_some() {
            self.rotate_delta *= 1.0 - step;
            self.pan_delta *= 1.0 - step;
            if self.rotate_delta.length_squared() < 1e-10 {
                self.rotate_delta = Vec2::ZERO;
            }
            if self.pan_delta.length_squared() < 1e-10 {
                self.pan_delta = Vec3::ZERO;
            }
        } else {
            self.rotate_delta = Vec2::ZERO;
            self.pan_delta = Vec3::ZERO;
        }
        true
    }

    fn apply_limits(&mut self) {
        let mut spherical = Spherical::from_offset(self.state.position - self.state.target);
        spherical.polar = spherical
            .polar
            .clamp(self.tuning.polar_angle_min, self.state.polar_angle_max);
        spherical.radius = spherical
            .radius
            .clamp(self.state.min_distance, self.state.max_distance);
        self.state.position = self.state.target + spherical.to_offset();
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.state.position).looking_at(self.state.target, Vec3::Y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::bounds::SceneBounds;
    use crate::engine::camera::bounds_fitter::BoundsFitter;

    fn rig(damping: Option<f32>) -> CameraRig {
        let fit = BoundsFitter::default().fit(SceneBounds::new(
            Vec3::new(-5.0, 0.0, -5.0),
            Vec3::new(5.0, 3.0, 5.0),
        ));
        CameraRig::from_fit(
            &fit,
            RigTuning {
                damping,
                ..default()
            },
        )
    }

    #[test]
    fn retarget_keeps_distance_and_direction() {
        let mut rig = rig(None);
        let before = *rig.state();
        let hit = Vec3::new(2.0, 0.5, -1.0);

        rig.retarget(hit);
        rig.update();

        let after = rig.state();
        assert!(after.target.distance(hit) < 1e-4);
        assert!((after.distance() - before.distance()).abs() < 1e-4);
        let dir_before = (before.position - before.target).normalize();
        let dir_after = (after.position - after.target).normalize();
        assert!((dir_before - dir_after).length() < 1e-4);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut rig = rig(None);
        for _ in 0..500 {
            rig.zoom(0.5);
        }
        assert!((rig.state().distance() - rig.state().min_distance).abs() < 1e-4);

        for _ in 0..500 {
            rig.zoom(2.0);
        }
        assert!((rig.state().distance() - rig.state().max_distance).abs() < 1e-3);
    }

    #[test]
    fn polar_angle_never_crosses_the_floor() {
        let mut rig = rig(None);
        // Dragging up lowers the camera towards the horizon.
        rig.rotate(Vec2::new(0.0, -5_000.0), 600.0);
        rig.update();

        let state = rig.state();
        let offset = state.position - state.target;
        let polar = (offset.y / offset.length()).acos();
        assert!(polar <= state.polar_angle_max + 1e-4);
        assert!(offset.y > 0.0);
    }

    #[test]
    fn rotate_orbits_at_constant_distance() {
        let mut rig = rig(None);
        let distance = rig.state().distance();
        let target = rig.state().target;

        rig.rotate(Vec2::new(150.0, 0.0), 600.0);
        assert!(rig.update());
        assert!((rig.state().distance() - distance).abs() < 1e-4);
        assert_eq!(rig.state().target, target);
    }

    #[test]
    fn pan_moves_target_and_camera_together() {
        let mut rig = rig(None);
        let offset = rig.state().position - rig.state().target;
        let target = rig.state().target;

        rig.pan(Vec2::new(100.0, 0.0), 600.0);
        rig.update();

        let moved = rig.state().position - rig.state().target;
        assert!((moved - offset).length() < 1e-4);
        // A horizontal drag keeps the target level.
        assert!(rig.state().target.distance(target) > 0.1);
        assert!((rig.state().target.y - target.y).abs() < 1e-4);
    }

    #[test]
    fn damping_spreads_motion_over_frames() {
        let mut damped = rig(Some(0.2));
        let start = damped.state().position;
        damped.rotate(Vec2::new(100.0, 0.0), 600.0);

        damped.update();
        let first = damped.state().position;
        let mut frames = 1;
        while damped.update() {
            frames += 1;
            assert!(frames < 1_000);
        }
        assert!(frames > 1);
        assert_ne!(start, first);

        let mut direct = rig(None);
        direct.rotate(Vec2::new(100.0, 0.0), 600.0);
        direct.update();
        assert!(direct.state().position.distance(damped.state().position) < 1e-2);
    }
}
