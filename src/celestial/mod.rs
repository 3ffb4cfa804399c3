use bevy::prelude::*;

pub mod body;
pub mod lighting;
pub mod sky;
pub mod time;

use lighting::LightingPlugin;
use sky::SkyPlugin;
use time::SimulationTimePlugin;

pub use body::{BodyKind, BodySpec, CelestialBody, Decoration, DecorationKind};

pub struct CelestialPlugin;

impl Plugin for CelestialPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((SimulationTimePlugin, LightingPlugin, SkyPlugin))
            .add_systems(PostStartup, log_celestial_setup);
    }
}

fn log_celestial_setup(context: Res<time::SimulationContext>) {
    info!(
        "Celestial simulation ready: speed x{}, light anchored to {:?}",
        context.speed_factor, context.light_anchor
    );
}
