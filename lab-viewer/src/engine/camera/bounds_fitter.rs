use bevy::prelude::*;

use crate::engine::assets::bounds::SceneBounds;
use constants::camera::{FIT_MARGIN, FOV_DEGREES, INITIAL_VIEW_DIRECTION, MIN_FIT_DISTANCE};

/// Initial framing for a lab, computed once per lab load from lab geometry only.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    pub aabb: SceneBounds,
    pub initial_camera_position: Vec3,
    pub initial_target: Vec3,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsFitter {
    /// Vertical field of view in radians.
    pub fov: f32,
    pub margin: f32,
    pub view_direction: Vec3,
}

impl Default for BoundsFitter {
    fn default() -> Self {
        Self {
            fov: FOV_DEGREES.to_radians(),
            margin: FIT_MARGIN,
            view_direction: Vec3::from_array(INITIAL_VIEW_DIRECTION),
        }
    }
}

impl BoundsFitter {
    /// Distance at which an extent of `size + 2 * margin` fills the vertical field of view.
    pub fn fit_distance(&self, size: f32) -> f32 {
        let visible = size + 2.0 * self.margin;
        (visible / (2.0 * (self.fov * 0.5).tan())).max(MIN_FIT_DISTANCE)
    }

    pub fn fit(&self, aabb: SceneBounds) -> FitResult {
        let distance = self.fit_distance(aabb.max_extent());
        let target = aabb.center();
        let direction = self.view_direction.try_normalize().unwrap_or(Vec3::ONE.normalize());

        FitResult {
            aabb,
            initial_camera_position: target + direction * distance,
            initial_target: target,
            distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_distance_matches_fov_formula() {
        let fitter = BoundsFitter {
            fov: 45f32.to_radians(),
            margin: 1.0,
            ..default()
        };
        let side = 6.0;
        let fit = fitter.fit(SceneBounds::new(Vec3::splat(-3.0), Vec3::splat(3.0)));

        let expected = (side + 2.0) / (2.0 * (22.5f32.to_radians()).tan());
        assert!((fit.distance - expected).abs() < 1e-4);
        assert_eq!(fit.initial_target, Vec3::ZERO);
        assert!((fit.initial_camera_position.distance(fit.initial_target) - expected).abs() < 1e-4);
    }

    #[test]
    fn camera_sits_on_the_diagonal() {
        let fit = BoundsFitter::default().fit(SceneBounds::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 3.0, 8.0),
        ));
        let offset = (fit.initial_camera_position - fit.initial_target).normalize();
        assert!((offset - Vec3::ONE.normalize()).length() < 1e-5);
        assert_eq!(fit.initial_target, Vec3::new(5.0, 1.5, 4.0));
    }

    #[test]
    fn degenerate_bounds_keep_minimum_distance() {
        let fitter = BoundsFitter {
            margin: 0.0,
            ..default()
        };
        let fit = fitter.fit(SceneBounds::new(Vec3::ONE, Vec3::ONE));
        assert_eq!(fit.distance, MIN_FIT_DISTANCE);
    }
}
