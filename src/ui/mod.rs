pub mod command_prompt;
pub mod hud;

use bevy::prelude::*;

use command_prompt::CommandPromptPlugin;
use hud::HudPlugin;

pub struct UIPlugin;

impl Plugin for UIPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((HudPlugin, CommandPromptPlugin));
    }
}
