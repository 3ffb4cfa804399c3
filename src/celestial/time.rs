use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SandboxConfig;
use crate::scene::SolarSystem;

/// Smallest and largest speed factors reachable from the keyboard.
pub const MIN_SPEED_STEP: f32 = 1.0 / 64.0;
pub const MAX_SPEED_FACTOR: f32 = 1024.0;

/// Which point the scene light is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightAnchor {
    /// Light stays on the system origin.
    #[default]
    Origin,
    /// Light follows the first `star` body of the tree.
    Star,
}

/// Process-wide simulation state handed to every body's `advance`.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct SimulationContext {
    /// Multiplier applied to every tick's delta time.
    pub speed_factor: f32,
    /// While set, no body changes state.
    pub frozen: bool,
    pub light_anchor: LightAnchor,
    /// Simulated seconds since startup, after scaling.
    pub elapsed: f64,
}

impl Default for SimulationContext {
    fn default() -> Self {
        Self {
            speed_factor: 1.0,
            frozen: false,
            light_anchor: LightAnchor::Origin,
            elapsed: 0.0,
        }
    }
}

impl SimulationContext {
    /// Scaled delta for this tick; zero while frozen.
    pub fn effective_dt(&self, dt: f32) -> f32 {
        if self.frozen {
            0.0
        } else {
            dt * self.speed_factor
        }
    }

    pub fn is_paused(&self) -> bool {
        self.frozen || self.speed_factor == 0.0
    }

    pub fn toggle_frozen(&mut self) -> bool {
        self.frozen = !self.frozen;
        self.frozen
    }

    pub fn set_speed_factor(&mut self, factor: f32) {
        self.speed_factor = if factor.is_finite() {
            factor.clamp(0.0, MAX_SPEED_FACTOR)
        } else {
            1.0
        };
    }

    pub fn faster(&mut self) {
        let next = (self.speed_factor * 2.0).max(MIN_SPEED_STEP);
        self.set_speed_factor(next);
    }

    pub fn slower(&mut self) {
        let next = self.speed_factor * 0.5;
        self.set_speed_factor(if next < MIN_SPEED_STEP { 0.0 } else { next });
    }

    pub fn tick(&mut self, dt: f32) {
        self.elapsed += self.effective_dt(dt) as f64;
    }
}

#[derive(Resource)]
struct SimulationLogTimer(Timer);

impl Default for SimulationLogTimer {
    fn default() -> Self {
        Self(Timer::from_seconds(10.0, TimerMode::Repeating))
    }
}

pub struct SimulationTimePlugin;

impl Plugin for SimulationTimePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimulationContext>()
            .init_resource::<SimulationLogTimer>()
            .add_systems(Startup, apply_configured_anchor)
            .add_systems(Update, log_simulation_status);
    }
}

fn apply_configured_anchor(
    config: Option<Res<SandboxConfig>>,
    mut context: ResMut<SimulationContext>,
) {
    if let Some(config) = config {
        context.light_anchor = config.light_anchor;
    }
}

fn log_simulation_status(
    time: Res<Time>,
    context: Res<SimulationContext>,
    system: Option<Res<SolarSystem>>,
    mut timer: ResMut<SimulationLogTimer>,
) {
    timer.0.tick(time.delta());
    if timer.0.just_finished() {
        debug!(
            "Simulation: {:.1}s simulated, speed x{}, {}, {} bodies",
            context.elapsed,
            context.speed_factor,
            if context.frozen { "frozen" } else { "running" },
            system.map_or(0, |system| system.len())
        );
    }
}
