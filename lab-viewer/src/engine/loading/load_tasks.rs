use std::sync::Arc;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::tasks::{IoTaskPool, Task, TaskPool, block_on, futures_lite::future};

use crate::config::ViewerConfig;
use crate::data::repository::{Repositories, RepositoryError};
use crate::engine::assets::bounds::SceneBounds;
use crate::engine::assets::records::{InvalidPlacementWarning, ValidPlacement};
use crate::engine::assets::scene_asset::SceneAsset;
use crate::engine::camera::bounds_fitter::FitResult;
use crate::engine::camera::camera_rig::CameraRig;
use crate::engine::loading::asset_loader::{AssetLoader, LoadResult, SharedLoad};
use crate::engine::loading::lab_session::{
    LabSession, LoadOutcome, LoadPlan, LoadTag, LoadTarget, SessionEvent,
};
use crate::engine::scene::composer::{Composition, CompositeScene};
use crate::engine::scene::spawner::MeshLibrary;

/// Open a lab by id. The latest request wins when several arrive before the catalogue is ready.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct SelectLabEvent {
    pub lab_id: String,
}

/// Move the orbit target to an item, now or as soon as it is placed.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct FocusItemEvent {
    pub item_id: String,
}

/// Reload the current lab after its model failed.
#[derive(Event, Debug, Clone, Default)]
pub struct RetryEvent;

/// Leave the lab view and release everything it owns.
#[derive(Event, Debug, Clone, Default)]
pub struct UnloadEvent;

/// A placement left out of the composed scene.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct PlacementWarningEvent(pub InvalidPlacementWarning);

/// In-flight model loads for the active lab, each tagged with the generation it was started under.
#[derive(Resource, Default)]
pub struct PendingLoads {
    tasks: Vec<(LoadTag, Task<LoadResult>)>,
}

impl PendingLoads {
    fn spawn(&mut self, tag: LoadTag, load: SharedLoad) {
        let task = IoTaskPool::get_or_init(TaskPool::new).spawn(load);
        self.tasks.push((tag, task));
    }

    /// Drop every handle. Dropping a task cancels it.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Outcomes that finished since the last poll, in completion-check order.
    fn poll(&mut self) -> Vec<LoadOutcome> {
        let mut finished = Vec::new();
        self.tasks.retain_mut(|(tag, task)| {
            match block_on(future::poll_once(task)) {
                Some(result) => {
                    finished.push(LoadOutcome {
                        tag: tag.clone(),
                        result,
                    });
                    false
                }
                None => true,
            }
        });
        finished
    }
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabLoadingSet;

/// Session, loads and scene state touched when a lab starts or stops.
#[derive(SystemParam)]
pub struct LabLoadContext<'w, 's> {
    commands: Commands<'w, 's>,
    session: ResMut<'w, LabSession>,
    loader: ResMut<'w, AssetLoader>,
    pending: ResMut<'w, PendingLoads>,
    scene: ResMut<'w, CompositeScene>,
    library: ResMut<'w, MeshLibrary>,
}

impl LabLoadContext<'_, '_> {
    /// Forget the previous lab: cancel its loads, drop its nodes and GPU handles, reset the camera.
    fn reset_view(&mut self) {
        self.pending.clear();
        *self.scene = CompositeScene::default();
        self.library.clear();
        self.commands.remove_resource::<CameraRig>();
        self.commands.remove_resource::<FitResult>();
    }

    fn start(&mut self, plan: LoadPlan) {
        self.reset_view();

        // Item fetches start before the lab resolves; the tasks below join them.
        for item in &plan.items {
            self.loader.preload(&item.model_path);
        }

        let lab_tag = LoadTag {
            generation: plan.generation,
            target: LoadTarget::Lab,
        };
        let lab_load = self.loader.load(&plan.lab_path);
        self.pending.spawn(lab_tag, lab_load);

        for item in &plan.items {
            let tag = LoadTag {
                generation: plan.generation,
                target: LoadTarget::Item(item.item_id.clone()),
            };
            let load = self.loader.load(&item.model_path);
            self.pending.spawn(tag, load);
        }

        info!(
            "Loading lab {} (generation {}, {} items)",
            plan.lab_path,
            plan.generation,
            plan.items.len()
        );
    }
}

/// Queue `--lab` / `--item` from the config as if the host had asked for them.
pub fn queue_initial_selection(
    config: Res<ViewerConfig>,
    mut select: EventWriter<SelectLabEvent>,
    mut focus: EventWriter<FocusItemEvent>,
) {
    if let Some(item_id) = &config.initial_item {
        focus.write(FocusItemEvent {
            item_id: item_id.clone(),
        });
    }
    if let Some(lab_id) = &config.initial_lab {
        select.write(SelectLabEvent {
            lab_id: lab_id.clone(),
        });
    }
}

// Resolve the lab record, then kick off the lab and item loads
pub fn handle_lab_selection(
    mut events: EventReader<SelectLabEvent>,
    mut queued: Local<Option<String>>,
    repositories: Option<Res<Repositories>>,
    mut ctx: LabLoadContext,
) {
    if let Some(latest) = events.read().last() {
        *queued = Some(latest.lab_id.clone());
    }
    let Some(repositories) = repositories else {
        return;
    };
    let Some(lab_id) = queued.take() else {
        return;
    };

    match repositories.labs.get_lab(&lab_id) {
        Ok(lab) => {
            let placements = repositories.items.items_for_lab(&lab.id);
            info!("Selected lab {} ({} placements)", lab.name, placements.len());
            let plan = ctx.session.begin(lab, &placements);
            ctx.start(plan);
        }
        Err(RepositoryError::NotFound(id)) => {
            warn!("Lab {id} not found");
            ctx.session.not_found(&id);
            ctx.reset_view();
        }
        Err(RepositoryError::Unavailable(reason)) => {
            // Keep the request; it is retried every frame until the records answer.
            if !ctx.session.is_unavailable_for(&reason) {
                error!("Cannot open lab {lab_id}: repository unavailable: {reason}");
                ctx.session.unavailable(&reason);
                ctx.reset_view();
            }
            *queued = Some(lab_id);
        }
    }
}

pub fn handle_retry(mut events: EventReader<RetryEvent>, mut ctx: LabLoadContext) {
    if events.read().count() == 0 {
        return;
    }
    match ctx.session.retry() {
        Some(plan) => {
            info!("Retrying lab load");
            ctx.start(plan);
        }
        None => debug!("Retry ignored, no failed lab"),
    }
}

pub fn handle_unload(mut events: EventReader<UnloadEvent>, mut ctx: LabLoadContext) {
    if events.read().count() == 0 {
        return;
    }
    ctx.session.unload();
    ctx.reset_view();
    info!("Lab unloaded");
}

/// Release the scene before the app shuts down.
pub fn dispose_on_exit(mut exit: EventReader<AppExit>, mut ctx: LabLoadContext) {
    if exit.read().count() == 0 {
        return;
    }
    ctx.session.unload();
    ctx.reset_view();
    debug!("Disposed lab scene on exit");
}

/// Merge finished loads into the scene. Stale outcomes are dropped here.
pub fn poll_model_loads(
    mut commands: Commands,
    mut pending: ResMut<PendingLoads>,
    mut session: ResMut<LabSession>,
    mut scene: ResMut<CompositeScene>,
    mut rig: Option<ResMut<CameraRig>>,
    mut warnings: EventWriter<PlacementWarningEvent>,
    config: Res<ViewerConfig>,
) {
    if pending.is_empty() {
        return;
    }

    // Rig built this frame, not yet visible as a resource.
    let mut fresh_rig: Option<CameraRig> = None;

    for outcome in pending.poll() {
        match session.accept(outcome) {
            SessionEvent::LabReady(asset) => {
                let Some(lab) = session.lab().cloned() else {
                    continue;
                };
                let Composition {
                    scene: composed,
                    warnings: skipped,
                } = CompositeScene::compose(
                    &lab.model_path,
                    asset,
                    session.placements(),
                    session.generation(),
                );
                for warning in skipped {
                    warn!("{warning}");
                    warnings.write(PlacementWarningEvent(warning));
                }
                *scene = composed;

                let bounds = scene.lab_bounds().unwrap_or_else(|| {
                    warn!("Lab {} has no geometry, framing a unit box", lab.id);
                    SceneBounds::new(Vec3::NEG_ONE, Vec3::ONE)
                });
                let fit = config.bounds_fitter().fit(bounds);
                let mut new_rig = CameraRig::from_fit(&fit, config.rig_tuning());
                info!(
                    "✓ Lab {} ready, extent {:.2}, camera distance {:.2}",
                    lab.name,
                    bounds.max_extent(),
                    fit.distance
                );

                for (placement, asset) in session.take_deferred() {
                    place_item(&mut scene, &mut session, &placement, asset, Some(&mut new_rig));
                }
                commands.insert_resource(fit);
                fresh_rig = Some(new_rig);
            }
            SessionEvent::LabFailed(err) => {
                error!("Lab failed to load: {err}");
            }
            SessionEvent::ItemReady(placement, asset) => {
                let target = fresh_rig.as_mut().or(rig.as_deref_mut());
                place_item(&mut scene, &mut session, &placement, asset, target);
            }
            SessionEvent::ItemFailed(item_id, err) => {
                warn!("Item {item_id} skipped: {err}");
            }
            SessionEvent::Deferred | SessionEvent::Stale => {}
        }
    }

    if let Some(new_rig) = fresh_rig {
        commands.insert_resource(new_rig);
    }
    if session.progress().is_complete() && pending.is_empty() {
        debug!("All loads settled for generation {}", session.generation());
    }
}

fn place_item(
    scene: &mut CompositeScene,
    session: &mut LabSession,
    placement: &ValidPlacement,
    asset: Arc<SceneAsset>,
    rig: Option<&mut CameraRig>,
) {
    if scene
        .add_item(placement, asset, session.generation())
        .is_none()
    {
        return;
    }
    debug!("Placed item {} ({})", placement.item_id, placement.model_path);

    if session.take_focus_for(&placement.item_id) {
        if let (Some(point), Some(rig)) = (scene.item_focus_point(&placement.item_id), rig) {
            rig.retarget(point);
            info!("Focused item {}", placement.item_id);
        }
    }
}

/// Focus a placed item, or remember the request until it is placed.
pub fn handle_focus_requests(
    mut events: EventReader<FocusItemEvent>,
    mut session: ResMut<LabSession>,
    scene: Res<CompositeScene>,
    mut rig: Option<ResMut<CameraRig>>,
) {
    for event in events.read() {
        match (scene.item_focus_point(&event.item_id), rig.as_deref_mut()) {
            (Some(point), Some(rig)) => {
                rig.retarget(point);
                info!("Focused item {}", event.item_id);
            }
            _ => {
                debug!("Item {} not placed yet, focus deferred", event.item_id);
                session.request_focus(&event.item_id);
            }
        }
    }
}

/// Events, resources and systems that drive lab selection and model loading.
/// The [`AssetLoader`] is inserted by the caller since it owns the model source.
pub struct LabLoadingPlugin;

impl Plugin for LabLoadingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LabSession>()
            .init_resource::<PendingLoads>()
            .init_resource::<CompositeScene>()
            .init_resource::<MeshLibrary>()
            .add_event::<SelectLabEvent>()
            .add_event::<FocusItemEvent>()
            .add_event::<RetryEvent>()
            .add_event::<UnloadEvent>()
            .add_event::<PlacementWarningEvent>()
            .add_systems(Startup, queue_initial_selection)
            .add_systems(
                Update,
                (
                    handle_lab_selection,
                    handle_retry,
                    handle_unload,
                    poll_model_loads,
                    handle_focus_requests,
                )
                    .chain()
                    .in_set(LabLoadingSet),
            )
            .add_systems(Last, dispose_on_exit);
    }
}
