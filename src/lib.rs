use bevy::prelude::*;

pub mod camera;
pub mod celestial;
pub mod config;
pub mod geometry;
pub mod input;
pub mod interaction;
pub mod mutation;
pub mod orbit;
pub mod scene;
pub mod texture;
pub mod ui;

use camera::CameraPlugin;
use celestial::CelestialPlugin;
use input::InputPlugin;
use interaction::InteractionPlugin;
use mutation::MutationPlugin;
use scene::ScenePlugin;
use texture::TexturePlugin;
use ui::UIPlugin;

/// Frame phases, run in declaration order.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SandboxSet {
    /// Keyboard, mouse and prompt handling.
    Input,
    /// Queued commands, hot reload and saves. May replace the scene document.
    Mutation,
    /// Tears down and respawns the scene after the document changed.
    Rebuild,
    Simulate,
    /// Copies simulation state onto transforms.
    Sync,
}

pub struct SandboxPlugin;

impl Plugin for SandboxPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (
                SandboxSet::Input,
                SandboxSet::Mutation,
                SandboxSet::Rebuild,
                SandboxSet::Simulate,
                SandboxSet::Sync,
            )
                .chain(),
        )
        .add_plugins((
            ScenePlugin,
            CelestialPlugin,
            CameraPlugin,
            InputPlugin,
            InteractionPlugin,
            MutationPlugin,
            TexturePlugin,
            UIPlugin,
        ));
    }
}
