use bevy::prelude::*;
use bevy::window::{CursorGrabMode, PrimaryWindow};

use crate::celestial::time::SimulationContext;
use crate::ui::command_prompt::{handle_command_input, CommandPromptState};
use crate::SandboxSet;

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (cursor_grab_system, simulation_keys, exit_system)
                .run_if(prompt_closed)
                // Escape that closes the prompt must not also grab the cursor
                .before(handle_command_input)
                .in_set(SandboxSet::Input),
        );
    }
}

/// Gameplay keys are ignored while the command prompt is taking text.
pub fn prompt_closed(state: Option<Res<CommandPromptState>>) -> bool {
    state.map_or(true, |state| !state.is_open)
}

pub fn cursor_locked(window: &Window) -> bool {
    window.cursor.grab_mode != CursorGrabMode::None
}

fn cursor_grab_system(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut window_query: Query<&mut Window, With<PrimaryWindow>>,
) {
    let Ok(mut window) = window_query.get_single_mut() else {
        return;
    };

    if keyboard.just_pressed(KeyCode::Escape) {
        if cursor_locked(&window) {
            window.cursor.grab_mode = CursorGrabMode::None;
            window.cursor.visible = true;
        } else {
            window.cursor.grab_mode = CursorGrabMode::Locked;
            window.cursor.visible = false;
        }
    }
}

/// P freezes, `,` halves and `.` doubles the simulation speed.
pub fn simulation_keys(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut context: ResMut<SimulationContext>,
) {
    if keyboard.just_pressed(KeyCode::KeyP) {
        let frozen = context.toggle_frozen();
        info!("Simulation {}", if frozen { "frozen" } else { "resumed" });
    }
    if keyboard.just_pressed(KeyCode::Comma) {
        context.slower();
        info!("Simulation speed x{}", context.speed_factor);
    }
    if keyboard.just_pressed(KeyCode::Period) {
        context.faster();
        info!("Simulation speed x{}", context.speed_factor);
    }
}

fn exit_system(keyboard: Res<ButtonInput<KeyCode>>, mut exit: EventWriter<AppExit>) {
    let ctrl = keyboard.pressed(KeyCode::ControlLeft) || keyboard.pressed(KeyCode::ControlRight);
    if ctrl && keyboard.just_pressed(KeyCode::KeyQ) {
        exit.send(AppExit::Success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .init_resource::<ButtonInput<KeyCode>>()
            .init_resource::<SimulationContext>()
            .init_resource::<CommandPromptState>()
            .add_systems(Update, simulation_keys.run_if(prompt_closed));
        app
    }

    fn tap(app: &mut App, key: KeyCode) {
        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(key);
        app.update();
        let mut input = app.world_mut().resource_mut::<ButtonInput<KeyCode>>();
        input.release(key);
        input.clear();
    }

    #[test]
    fn keys_freeze_and_scale_speed() {
        let mut app = app();
        tap(&mut app, KeyCode::KeyP);
        assert!(app.world().resource::<SimulationContext>().frozen);
        tap(&mut app, KeyCode::KeyP);
        assert!(!app.world().resource::<SimulationContext>().frozen);

        tap(&mut app, KeyCode::Period);
        assert_eq!(app.world().resource::<SimulationContext>().speed_factor, 2.0);
        tap(&mut app, KeyCode::Comma);
        tap(&mut app, KeyCode::Comma);
        assert_eq!(app.world().resource::<SimulationContext>().speed_factor, 0.5);
    }

    #[test]
    fn open_prompt_swallows_keys() {
        let mut app = app();
        app.world_mut().resource_mut::<CommandPromptState>().is_open = true;
        tap(&mut app, KeyCode::KeyP);
        assert!(!app.world().resource::<SimulationContext>().frozen);
    }
}
