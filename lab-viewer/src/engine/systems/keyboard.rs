use bevy::prelude::*;

use crate::engine::loading::load_tasks::{RetryEvent, UnloadEvent};

/// `R` retries a failed lab, `Escape` leaves the lab view.
pub fn handle_viewer_shortcuts(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut retry: EventWriter<RetryEvent>,
    mut unload: EventWriter<UnloadEvent>,
) {
    if keyboard.just_pressed(KeyCode::KeyR) {
        retry.write(RetryEvent);
    }
    if keyboard.just_pressed(KeyCode::Escape) {
        unload.write(UnloadEvent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_viewer_events() {
        let mut app = App::new();
        app.init_resource::<ButtonInput<KeyCode>>()
            .add_event::<RetryEvent>()
            .add_event::<UnloadEvent>()
            .add_systems(Update, handle_viewer_shortcuts);

        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::KeyR);
        app.update();

        assert_eq!(app.world().resource::<Events<RetryEvent>>().len(), 1);
        assert!(app.world().resource::<Events<UnloadEvent>>().is_empty());
    }
}
