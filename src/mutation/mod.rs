//! Live edits of the scene tree arriving from outside the simulation loop.
//!
//! The listener thread and the command prompt only parse and enqueue [`SceneCommand`]s.
//! The simulation thread drains the queue between ticks, applies the commands to a copy
//! of the document, persists it and swaps it in, which triggers a full rebuild.

pub mod listener;

use bevy::prelude::*;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SandboxConfig;
use crate::scene::node::SceneNode;
use crate::scene::persistence::{dispatch_saves, SaveRequest};
use crate::scene::SceneDocument;
use crate::SandboxSet;

pub const QUEUE_CAPACITY: usize = 64;

// Elements of a synthesized moon. Only the orbit radius and phase vary per moon.
pub const MOON_RADIUS: f32 = 0.27;
/// Smallest orbit radius. The actual radius is the larger of this and
/// `MOON_ORBIT_PLANET_RADII` times the planet's radius, so moons clear big planets.
pub const MOON_ORBIT_RADIUS: f32 = 3.0;
pub const MOON_ORBIT_PLANET_RADII: f32 = 2.5;
pub const MOON_ORBIT_SPEED: f32 = 40.0;
pub const MOON_ROTATION_SPEED: f32 = 10.0;
pub const MOON_INCLINATION: f32 = 5.0;
pub const MOON_TEXTURE: &str = "textures/moon.jpg";
/// Moon `n` starts at `n * MOON_PHASE_STEP` degrees mod 360, the golden angle.
const MOON_PHASE_STEP: f32 = 137.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SceneCommand {
    AddMoon { planet: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    MoonAdded { planet: String, moon: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MutationError {
    #[error("no planet named `{0}` orbits the root")]
    PlanetNotFound(String),
    #[error("no scene is loaded")]
    NoScene,
    #[error("malformed command: {0}")]
    Malformed(String),
    #[error("command queue is full")]
    QueueFull,
    #[error("command queue is closed")]
    QueueClosed,
}

pub fn parse_command(text: &str) -> Result<SceneCommand, MutationError> {
    serde_json::from_str(text).map_err(|error| MutationError::Malformed(error.to_string()))
}

/// Hands a command to the simulation thread without blocking.
pub fn enqueue(sender: &Sender<SceneCommand>, command: SceneCommand) -> Result<(), MutationError> {
    sender.try_send(command).map_err(|error| match error {
        TrySendError::Full(_) => MutationError::QueueFull,
        TrySendError::Disconnected(_) => MutationError::QueueClosed,
    })
}

/// Applies one command to the tree. On error the tree is left untouched.
pub fn apply_command(
    root: &mut SceneNode,
    command: &SceneCommand,
) -> Result<CommandOutcome, MutationError> {
    match command {
        SceneCommand::AddMoon { planet } => {
            let parent = root
                .child_mut(planet)
                .ok_or_else(|| MutationError::PlanetNotFound(planet.clone()))?;
            let moon = synthesize_moon(parent);
            let name = moon.label().to_string();
            parent.children.push(moon);
            Ok(CommandOutcome::MoonAdded {
                planet: planet.clone(),
                moon: name,
            })
        }
    }
}

fn synthesize_moon(planet: &SceneNode) -> SceneNode {
    let planet_name = planet.label();
    let mut ordinal = planet.children.len() + 1;
    let name = loop {
        let candidate = format!("{planet_name} Moon {ordinal}");
        if !planet.has_child(&candidate) {
            break candidate;
        }
        ordinal += 1;
    };

    let orbit_radius = planet.radius.map_or(MOON_ORBIT_RADIUS, |radius| {
        MOON_ORBIT_RADIUS.max(radius * MOON_ORBIT_PLANET_RADII)
    });

    SceneNode {
        name: Some(name),
        kind: Some("moon".to_string()),
        radius: Some(MOON_RADIUS),
        orbit_radius: Some(orbit_radius),
        eccentricity: Some(0.0),
        orbit_speed: Some(MOON_ORBIT_SPEED),
        rotation_speed: Some(MOON_ROTATION_SPEED),
        inclination: Some(MOON_INCLINATION),
        phase: Some((ordinal as f32 * MOON_PHASE_STEP) % 360.0),
        texture: Some(MOON_TEXTURE.to_string()),
        ..Default::default()
    }
}

/// Bounded hand-off queue between producers on other threads and the simulation thread.
#[derive(Resource, Clone)]
pub struct MutationQueue {
    sender: Sender<SceneCommand>,
    receiver: Receiver<SceneCommand>,
}

impl Default for MutationQueue {
    fn default() -> Self {
        Self::new(QUEUE_CAPACITY)
    }
}

impl MutationQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    pub fn sender(&self) -> Sender<SceneCommand> {
        self.sender.clone()
    }

    pub fn drain(&self) -> Vec<SceneCommand> {
        self.receiver.try_iter().collect()
    }
}

pub fn apply_queued_commands(
    queue: Res<MutationQueue>,
    mut document: ResMut<SceneDocument>,
    mut save: ResMut<SaveRequest>,
) {
    let commands = queue.drain();
    if commands.is_empty() {
        return;
    }

    let Some(mut root) = document.root().cloned() else {
        for command in &commands {
            warn!("Ignoring {:?}: {}", command, MutationError::NoScene);
        }
        return;
    };

    let mut changed = false;
    for command in &commands {
        match apply_command(&mut root, command) {
            Ok(CommandOutcome::MoonAdded { planet, moon }) => {
                info!("Added moon '{}' to '{}'", moon, planet);
                changed = true;
            }
            Err(error) => warn!("Ignoring {:?}: {}", command, error),
        }
    }

    if changed {
        save.0 = Some(root.clone());
        document.replace(Some(root));
    }
}

fn start_listener(config: Res<SandboxConfig>, queue: Res<MutationQueue>) {
    if !config.listener_enabled {
        info!("Mutation listener disabled");
        return;
    }
    if let Err(error) = listener::spawn_listener(&config.listener_addr, queue.sender()) {
        error!("{}; continuing without live edits", error);
    }
}

pub struct MutationPlugin;

impl Plugin for MutationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MutationQueue>()
            .add_systems(Startup, start_listener)
            .add_systems(
                Update,
                apply_queued_commands
                    .before(dispatch_saves)
                    .in_set(SandboxSet::Mutation),
            );
    }
}
