use std::fs;
use std::path::{Path, PathBuf};

use bevy::prelude::*;
use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::camera::bounds_fitter::BoundsFitter;
use crate::engine::camera::camera_rig::RigTuning;
use crate::engine::camera::controller::PointerInput;
use crate::engine::clip::ceiling_clip::CeilingClipController;
use constants::camera::{
    DAMPING_FACTOR, DOUBLE_CLICK_SECS, DOUBLE_CLICK_SLOP_PX, FIT_MARGIN, FOV_DEGREES,
    INITIAL_VIEW_DIRECTION, MAX_DISTANCE_FACTOR, MIN_DISTANCE, PAN_SPEED, POLAR_ANGLE_MAX,
    POLAR_ANGLE_MIN, ROTATE_SPEED, ZOOM_STEP,
};
use constants::clip::{CEILING_MARGIN, CLIP_OFFSET};

/// Command line for the native viewer.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "lab-viewer", version, about = "Interactive 3D viewer for lab layouts")]
pub struct Cli {
    /// JSON config file. Missing fields fall back to built-in defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Lab to open on startup.
    #[arg(long)]
    pub lab: Option<String>,

    /// Item to focus once it is placed.
    #[arg(long)]
    pub item: Option<String>,

    /// Catalogue path, relative to the asset root.
    #[arg(long)]
    pub catalogue: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub fit_margin: f32,
    pub min_distance: f32,
    pub max_distance_factor: f32,
    /// Radians from +Y.
    pub polar_angle_max: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_step: f32,
    /// `null` disables inertia.
    pub damping: Option<f32>,
    pub double_click_secs: f32,
    pub double_click_slop_px: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: FOV_DEGREES,
            fit_margin: FIT_MARGIN,
            min_distance: MIN_DISTANCE,
            max_distance_factor: MAX_DISTANCE_FACTOR,
            polar_angle_max: POLAR_ANGLE_MAX,
            rotate_speed: ROTATE_SPEED,
            pan_speed: PAN_SPEED,
            zoom_step: ZOOM_STEP,
            damping: Some(DAMPING_FACTOR),
            double_click_secs: DOUBLE_CLICK_SECS,
            double_click_slop_px: DOUBLE_CLICK_SLOP_PX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    pub ceiling_margin: f32,
    pub clip_offset: f32,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            ceiling_margin: CEILING_MARGIN,
            clip_offset: CLIP_OFFSET,
        }
    }
}

/// Runtime settings for the viewer.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Directory (or URL prefix handled by the model source) that relative paths resolve against.
    pub asset_root: String,
    pub catalogue_path: String,
    pub initial_lab: Option<String>,
    pub initial_item: Option<String>,
    pub camera: CameraConfig,
    pub clip: ClipConfig,
    pub log_filter: String,
    /// Serve JSON-RPC over stdin/stdout.
    pub rpc_stdio: bool,
    /// Mirror load progress as a terminal bar on stderr.
    pub console_progress: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_root: "assets".to_string(),
            catalogue_path: "labs.catalogue.json".to_string(),
            initial_lab: None,
            initial_item: None,
            camera: CameraConfig::default(),
            clip: ClipConfig::default(),
            log_filter: "info,wgpu=error,naga=warn".to_string(),
            rpc_stdio: true,
            console_progress: true,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Config file (if any) with command line overrides applied, validated.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(lab) = &cli.lab {
            config.initial_lab = Some(lab.clone());
        }
        if let Some(item) = &cli.item {
            config.initial_item = Some(item.clone());
        }
        if let Some(catalogue) = &cli.catalogue {
            config.catalogue_path = catalogue.clone();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if !(camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0) {
            return invalid("camera.fov_degrees", "must be between 0 and 180");
        }
        if !(camera.fit_margin >= 0.0) {
            return invalid("camera.fit_margin", "must not be negative");
        }
        if !(camera.min_distance > 0.0) {
            return invalid("camera.min_distance", "must be positive");
        }
        if !(camera.max_distance_factor >= 1.0) {
            return invalid("camera.max_distance_factor", "must be at least 1");
        }
        if !(camera.polar_angle_max > POLAR_ANGLE_MIN
            && camera.polar_angle_max <= std::f32::consts::FRAC_PI_2)
        {
            return invalid("camera.polar_angle_max", "must be within (0, pi/2]");
        }
        if !(camera.zoom_step > 0.0 && camera.zoom_step < 1.0) {
            return invalid("camera.zoom_step", "must be between 0 and 1");
        }
        if let Some(damping) = camera.damping {
            if !(damping > 0.0 && damping <= 1.0) {
                return invalid("camera.damping", "must be within (0, 1]");
            }
        }
        if !(self.clip.ceiling_margin >= 0.0) {
            return invalid("clip.ceiling_margin", "must not be negative");
        }
        Ok(())
    }

    pub fn rig_tuning(&self) -> RigTuning {
        RigTuning {
            fov: self.camera.fov_degrees.to_radians(),
            rotate_speed: self.camera.rotate_speed,
            pan_speed: self.camera.pan_speed,
            min_distance: self.camera.min_distance,
            max_distance_factor: self.camera.max_distance_factor,
            polar_angle_min: POLAR_ANGLE_MIN,
            polar_angle_max: self.camera.polar_angle_max,
            damping: self.camera.damping,
        }
    }

    pub fn bounds_fitter(&self) -> BoundsFitter {
        BoundsFitter {
            fov: self.camera.fov_degrees.to_radians(),
            margin: self.camera.fit_margin,
            view_direction: Vec3::from_array(INITIAL_VIEW_DIRECTION),
        }
    }

    pub fn clip_controller(&self) -> CeilingClipController {
        CeilingClipController {
            ceiling_margin: self.clip.ceiling_margin,
            clip_offset: self.clip.clip_offset,
        }
    }

    pub fn pointer_input(&self) -> PointerInput {
        PointerInput::new(
            self.camera.double_click_secs,
            self.camera.double_click_slop_px,
            self.camera.zoom_step,
        )
    }
}
