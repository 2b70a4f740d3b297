use std::sync::Arc;

use bevy::asset::AssetMetaCheck;
use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::log::{Level, LogPlugin};
use bevy::prelude::*;
use bevy_common_assets::json::JsonAssetPlugin;

use crate::config::ViewerConfig;
use crate::data::catalogue::{CatalogueLoader, LabCatalogue, install_catalogue, start_catalogue_load};
use crate::engine::camera::controller::{
    ViewerCamera, apply_camera_rig, double_click_refocus, mouse_orbit_controls, reframe_shortcut,
    touch_orbit_controls,
};
use crate::engine::clip::ceiling_clip::{ClipPlane, update_clip_plane};
use crate::engine::clip::clip_material::{ClipMaterial, apply_clip_plane};
use crate::engine::core::app_state::{ViewerState, ViewerStatus, sync_viewer_state};
use crate::engine::core::window_config::create_window_config;
use crate::engine::loading::asset_loader::AssetLoader;
use crate::engine::loading::load_tasks::{LabLoadingPlugin, LabLoadingSet};
use crate::engine::loading::model_source::DefaultModelSource;
use crate::engine::scene::spawner::{despawn_stale_nodes, spawn_scene_nodes};
use crate::engine::systems::console_progress::{ConsoleProgress, update_console_progress};
use crate::engine::systems::fps_tracking::{fps_notification_system, fps_text_update_system};
use crate::engine::systems::keyboard::handle_viewer_shortcuts;
use crate::engine::systems::status_overlay::{create_native_overlays, status_text_update_system};
use crate::rpc::host_rpc::HostRpcPlugin;
use constants::render_settings::{AMBIENT_BRIGHTNESS, CLEAR_COLOUR, SUN_ILLUMINANCE};

pub fn create_app(config: ViewerConfig) -> App {
    let mut app = App::new();
    let source = DefaultModelSource::new(&config.asset_root);

    app.add_plugins(create_default_plugins(&config))
        .init_state::<ViewerState>()
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        // Registers LabCatalogue as a loadable asset type from `*.catalogue.json` files.
        .add_plugins(JsonAssetPlugin::<LabCatalogue>::new(&["catalogue.json"]))
        .add_plugins(MaterialPlugin::<ClipMaterial>::default())
        .add_plugins(HostRpcPlugin {
            stdio: config.rpc_stdio,
        })
        .add_plugins(LabLoadingPlugin);

    // Initialise resources early
    app.insert_resource(AssetLoader::new(Arc::new(source)))
        .insert_resource(config.clip_controller())
        .insert_resource(config.pointer_input())
        .insert_resource(ClearColor(Color::srgb(
            CLEAR_COLOUR[0],
            CLEAR_COLOUR[1],
            CLEAR_COLOUR[2],
        )))
        .insert_resource(AmbientLight {
            brightness: AMBIENT_BRIGHTNESS,
            ..default()
        })
        .init_resource::<ClipPlane>()
        .init_resource::<ViewerStatus>()
        .init_resource::<CatalogueLoader>();

    if config.console_progress {
        app.init_resource::<ConsoleProgress>().add_systems(
            Update,
            update_console_progress.after(LabLoadingSet),
        );
    }

    app.insert_resource(config);

    app.add_systems(Startup, (setup, start_catalogue_load))
        .add_systems(Update, install_catalogue.before(LabLoadingSet))
        .add_systems(
            Update,
            (sync_viewer_state, despawn_stale_nodes, spawn_scene_nodes)
                .chain()
                .after(LabLoadingSet),
        );

    // Camera input only once the lab is framed
    app.add_systems(
        Update,
        (
            mouse_orbit_controls,
            touch_orbit_controls,
            double_click_refocus,
            reframe_shortcut,
        )
            .run_if(in_state(ViewerState::Ready))
            .after(LabLoadingSet)
            .before(apply_camera_rig),
    )
    .add_systems(
        Update,
        (apply_camera_rig, update_clip_plane, apply_clip_plane)
            .chain()
            .after(LabLoadingSet),
    );

    app.add_systems(
        Update,
        (
            handle_viewer_shortcuts.before(LabLoadingSet),
            fps_notification_system,
            fps_text_update_system,
            status_text_update_system.after(sync_viewer_state),
        ),
    );

    app.add_systems(OnEnter(ViewerState::Error), || {
        warn!("Lab failed to load, press R to retry");
    });

    app
}

fn spawn_lighting(commands: &mut Commands) {
    commands.spawn((
        DirectionalLight {
            illuminance: SUN_ILLUMINANCE,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(
            EulerRot::ZYX,
            0.0,
            1.0,
            -std::f32::consts::FRAC_PI_4,
        )),
    ));
}

fn spawn_viewer_camera(commands: &mut Commands, config: &ViewerConfig) {
    commands.spawn((
        Camera3d::default(),
        Projection::from(PerspectiveProjection {
            fov: config.camera.fov_degrees.to_radians(),
            ..default()
        }),
        Transform::from_xyz(6.0, 6.0, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
        ViewerCamera,
    ));
}

// Startup system that only handles basic initialisation
fn setup(mut commands: Commands, config: Res<ViewerConfig>) {
    spawn_lighting(&mut commands);
    spawn_viewer_camera(&mut commands, &config);
    create_native_overlays(&mut commands);
}

fn create_default_plugins(config: &ViewerConfig) -> impl PluginGroup {
    let window_config = WindowPlugin {
        primary_window: Some(create_window_config()),
        ..default()
    };

    let asset_config = AssetPlugin {
        file_path: config.asset_root.clone(),
        meta_check: AssetMetaCheck::Never,
        ..default()
    };

    // Logs go to stderr so stdout stays free for RPC.
    let log_config = LogPlugin {
        filter: config.log_filter.clone(),
        level: Level::INFO,
        ..default()
    };

    DefaultPlugins
        .set(window_config)
        .set(asset_config)
        .set(log_config)
}
