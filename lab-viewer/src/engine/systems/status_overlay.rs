use bevy::prelude::*;

use crate::engine::core::app_state::{FpsText, ViewerStatus};
use crate::engine::loading::lab_session::{LabSession, ViewerPhase};

#[derive(Component)]
pub struct StatusText;

pub fn create_native_overlays(commands: &mut Commands) {
    commands
        .spawn(Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                Text::new("No lab selected"),
                TextFont {
                    font_size: 18.0,
                    ..default()
                },
                TextColor(Color::WHITE),
                Node {
                    position_type: PositionType::Absolute,
                    top: Val::Px(12.0),
                    left: Val::Px(12.0),
                    ..default()
                },
                StatusText,
            ));
            parent.spawn((
                Text::new("FPS: "),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(Color::srgb(1., 0., 0.)),
                Node {
                    position_type: PositionType::Absolute,
                    bottom: Val::Px(12.0),
                    right: Val::Px(12.0),
                    ..default()
                },
                FpsText,
            ));
        });
}

/// Overlay line for the current session.
pub fn status_line(session: &LabSession) -> String {
    let name = session.lab().map(|lab| lab.name.as_str()).unwrap_or("lab");
    let progress = session.progress();

    match session.phase() {
        ViewerPhase::Idle => "No lab selected".to_string(),
        ViewerPhase::Loading => format!("{name}: loading {}%", progress.progress()),
        ViewerPhase::Ready if !progress.is_complete() => {
            format!("{name}: placing equipment {}%", progress.progress())
        }
        ViewerPhase::Ready => match session.lab().map(|lab| lab.blurb.as_str()) {
            Some(blurb) if !blurb.is_empty() => format!("{name}\n{blurb}"),
            _ => name.to_string(),
        },
        ViewerPhase::Error(err) => format!("Failed to load {name}: {err}\nPress R to retry"),
        ViewerPhase::NotFound(id) => format!("Lab \"{id}\" not found"),
        ViewerPhase::Unavailable(reason) => format!("Lab records unavailable: {reason}"),
    }
}

pub fn status_text_update_system(
    status: Res<ViewerStatus>,
    session: Res<LabSession>,
    mut query: Query<&mut Text, With<StatusText>>,
) {
    if !status.is_changed() {
        return;
    }
    let line = status_line(&session);
    for mut text in &mut query {
        text.0.clone_from(&line);
    }
}
