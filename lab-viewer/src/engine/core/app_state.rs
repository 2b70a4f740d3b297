use bevy::prelude::*;
use serde::Serialize;

use crate::engine::loading::lab_session::{LabSession, ViewerPhase};

/// Mirror of the session phase for state-gated systems.
#[derive(States, Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerState {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
    NotFound,
}

impl From<&ViewerPhase> for ViewerState {
    fn from(phase: &ViewerPhase) -> Self {
        match phase {
            ViewerPhase::Idle => ViewerState::Idle,
            ViewerPhase::Loading => ViewerState::Loading,
            ViewerPhase::Ready => ViewerState::Ready,
            ViewerPhase::Error(_) | ViewerPhase::Unavailable(_) => ViewerState::Error,
            ViewerPhase::NotFound(_) => ViewerState::NotFound,
        }
    }
}

/// What the host sees of the viewer.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewerStatus {
    pub loading: bool,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub progress: u8,
    pub state: ViewerState,
    pub lab_id: Option<String>,
}

impl ViewerStatus {
    pub fn from_session(session: &LabSession) -> Self {
        let error = session.phase().error();
        Self {
            loading: *session.phase() == ViewerPhase::Loading,
            error: error.as_ref().map(ToString::to_string),
            error_kind: error.as_ref().map(|e| e.kind().to_string()),
            progress: session.progress().progress(),
            state: session.phase().into(),
            lab_id: session.lab().map(|lab| lab.id.clone()),
        }
    }
}

#[derive(Component)]
pub struct FpsText;

/// Follow the session phase and refresh the published status.
pub fn sync_viewer_state(
    session: Res<LabSession>,
    state: Res<State<ViewerState>>,
    mut next_state: ResMut<NextState<ViewerState>>,
    mut status: ResMut<ViewerStatus>,
) {
    if !session.is_changed() {
        return;
    }
    let target = ViewerState::from(session.phase());
    if *state.get() != target {
        info!("→ Viewer state {:?} -> {:?}", state.get(), target);
        next_state.set(target);
    }
    status.set_if_neq(ViewerStatus::from_session(&session));
}
