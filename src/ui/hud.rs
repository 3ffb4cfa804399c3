use bevy::prelude::*;

use crate::camera::{CameraFocus, SandboxCamera};
use crate::celestial::time::SimulationContext;
use crate::scene::{SceneDocument, SolarSystem};

#[derive(Resource, Default)]
pub struct HudState {
    pub detailed: bool,
}

pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HudState>()
            .add_systems(Startup, setup_hud)
            .add_systems(Update, (toggle_hud_detail, update_hud_text));
    }
}

#[derive(Component)]
struct HudText;

fn setup_hud(mut commands: Commands) {
    commands.spawn((
        TextBundle::from_sections([
            TextSection::new(
                "",
                TextStyle {
                    font_size: 18.0,
                    color: Color::srgb(1.0, 1.0, 0.0),
                    ..default()
                },
            ),
            TextSection::new(
                "",
                TextStyle {
                    font_size: 15.0,
                    color: Color::srgb(1.0, 1.0, 1.0),
                    ..default()
                },
            ),
        ])
        .with_style(Style {
            position_type: PositionType::Absolute,
            bottom: Val::Px(10.0),
            left: Val::Px(10.0),
            ..default()
        }),
        HudText,
    ));
}

fn toggle_hud_detail(keyboard: Res<ButtonInput<KeyCode>>, mut state: ResMut<HudState>) {
    if keyboard.just_pressed(KeyCode::F3) {
        state.detailed = !state.detailed;
    }
}

/// One-line simulation status, e.g. `x2 running` or `x0.5 frozen`.
pub fn simulation_label(context: &SimulationContext) -> String {
    let state = if context.frozen {
        "frozen"
    } else if context.speed_factor == 0.0 {
        "stopped"
    } else {
        "running"
    };
    format!("x{} {}", context.speed_factor, state)
}

fn update_hud_text(
    state: Res<HudState>,
    context: Res<SimulationContext>,
    focus: Res<CameraFocus>,
    system: Res<SolarSystem>,
    document: Res<SceneDocument>,
    cameras: Query<&Transform, With<SandboxCamera>>,
    mut texts: Query<&mut Text, With<HudText>>,
) {
    let Ok(camera) = cameras.get_single() else {
        return;
    };
    let Ok(mut text) = texts.get_single_mut() else {
        return;
    };

    let position = camera.translation;
    let focused = focus
        .target
        .as_ref()
        .map_or("free-fly", |target| target.name.as_str());

    let mut body = format!(
        "Pos: X={:.1}, Y={:.1}, Z={:.1}\nSim: {}\nFocus: {}",
        position.x,
        position.y,
        position.z,
        simulation_label(&context),
        focused
    );

    if state.detailed {
        text.sections[0].value = "DETAIL (F3 to toggle)\n".to_string();
        body.push_str(&format!(
            "\nBodies: {} (generation {})\nScene revision: {}\nSimulated: {:.1}s\nLight: {:?}",
            system.len(),
            system.generation(),
            document.revision(),
            context.elapsed,
            context.light_anchor
        ));
    } else {
        text.sections[0].value.clear();
    }
    text.sections[1].value = body;
}
