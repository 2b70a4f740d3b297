use bevy::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::loading::lab_session::{LabSession, ViewerPhase};

/// Terminal progress bar mirroring the active lab batch.
#[derive(Resource, Default)]
pub struct ConsoleProgress {
    bar: Option<ProgressBar>,
    generation: u64,
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {pos}% {msg}")
        .map(|style| style.progress_chars("▉▊▋▌▍▎▏ "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

pub fn update_console_progress(session: Res<LabSession>, mut console: ResMut<ConsoleProgress>) {
    if !session.is_changed() {
        return;
    }

    if console.generation != session.generation() {
        if let Some(old) = console.bar.take() {
            old.abandon();
        }
        console.generation = session.generation();
        if session.progress().requested() > 0 {
            let bar = ProgressBar::new(100);
            bar.set_style(progress_style());
            if let Some(lab) = session.lab() {
                bar.set_message(format!("Loading {}", lab.name));
            }
            console.bar = Some(bar);
        }
    }

    let Some(bar) = console.bar.take() else {
        return;
    };
    bar.set_position(session.progress().progress() as u64);

    match session.phase() {
        ViewerPhase::Ready if session.progress().is_complete() => {
            let name = session.lab().map(|lab| lab.name.as_str()).unwrap_or("lab");
            bar.finish_with_message(format!("{name} ready"));
        }
        ViewerPhase::Error(err) => bar.abandon_with_message(err.to_string()),
        ViewerPhase::Loading | ViewerPhase::Ready => console.bar = Some(bar),
        ViewerPhase::Idle | ViewerPhase::NotFound(_) | ViewerPhase::Unavailable(_) => bar.abandon(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::scene_asset::fixtures::box_asset;
    use crate::engine::loading::lab_session::fixtures::lab;
    use crate::engine::loading::lab_session::{LoadOutcome, LoadTarget};
    use std::sync::Arc;

    #[test]
    fn bar_lives_for_one_batch() {
        let mut app = App::new();
        app.init_resource::<LabSession>()
            .init_resource::<ConsoleProgress>()
            .add_systems(Update, update_console_progress);

        app.world_mut()
            .resource_mut::<LabSession>()
            .begin(lab("a"), &Vec::new());
        app.update();
        assert!(app.world().resource::<ConsoleProgress>().bar.is_some());

        let mut session = app.world_mut().resource_mut::<LabSession>();
        let tag = session.tag(LoadTarget::Lab);
        session.accept(LoadOutcome {
            tag,
            result: Ok(Arc::new(box_asset(Vec3::ZERO, Vec3::ONE))),
        });
        app.update();
        assert!(app.world().resource::<ConsoleProgress>().bar.is_none());
    }
}
