use bevy::prelude::*;
use bevy::window::PresentMode;

use solar_sandbox::config::{ConfigLoadError, SandboxConfig, CONFIG_FILE};
use solar_sandbox::SandboxPlugin;

fn main() {
    let (config, error) = SandboxConfig::load_or_default(CONFIG_FILE);
    let asset_root = config.asset_root.to_string_lossy().into_owned();

    App::new()
        .insert_resource(config)
        .insert_resource(ConfigLoadError(error))
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "Solar Sandbox".into(),
                        resolution: (1280., 720.).into(),
                        present_mode: PresentMode::AutoVsync,
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    file_path: asset_root,
                    ..default()
                }),
        )
        .add_plugins(SandboxPlugin)
        .run();
}
