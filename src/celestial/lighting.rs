use bevy::prelude::*;

use crate::celestial::time::{LightAnchor, SimulationContext};
use crate::config::SandboxConfig;
use crate::scene::{to_render_frame, SolarSystem};
use crate::SandboxSet;

/// The single point light of the system.
#[derive(Component)]
pub struct SystemLight;

pub struct LightingPlugin;

impl Plugin for LightingPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_system_light)
            .add_systems(Update, track_light_anchor.in_set(SandboxSet::Sync));
    }
}

/// Light position in the orbital frame for the given anchor policy. Falls back to the
/// origin when the scene has no star.
pub fn light_position(system: &SolarSystem, anchor: LightAnchor) -> Vec3 {
    match anchor {
        LightAnchor::Origin => Vec3::ZERO,
        LightAnchor::Star => system
            .first_star()
            .and_then(|star| system.world_position(star))
            .unwrap_or(Vec3::ZERO),
    }
}

fn spawn_system_light(
    mut commands: Commands,
    config: Option<Res<SandboxConfig>>,
    mut ambient_light: ResMut<AmbientLight>,
) {
    let config = config.map(|config| config.clone()).unwrap_or_default();

    commands.spawn((
        PointLightBundle {
            point_light: PointLight {
                intensity: config.light_intensity,
                range: config.skydome_radius,
                shadows_enabled: false,
                ..default()
            },
            ..default()
        },
        SystemLight,
        Name::new("System light"),
    ));

    ambient_light.color = Color::srgb(0.6, 0.65, 0.8);
    ambient_light.brightness = config.ambient_brightness;
}

fn track_light_anchor(
    system: Res<SolarSystem>,
    context: Res<SimulationContext>,
    mut lights: Query<&mut Transform, With<SystemLight>>,
) {
    let position = to_render_frame(light_position(&system, context.light_anchor));
    for mut transform in lights.iter_mut() {
        if transform.translation != position {
            transform.translation = position;
        }
    }
}
