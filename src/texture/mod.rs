pub mod starfield;

use std::path::PathBuf;

use bevy::asset::LoadState;
use bevy::prelude::*;
use thiserror::Error;

use crate::config::SandboxConfig;

pub use starfield::{generate_starfield, starfield_image};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssetError {
    #[error("texture {} not found", .0.display())]
    Missing(PathBuf),
    #[error("texture {0} failed to load")]
    Failed(String),
}

/// Starts loading a scene texture if the file exists under the asset root.
pub fn load_texture(
    config: &SandboxConfig,
    asset_server: &AssetServer,
    relative: &str,
) -> Result<Handle<Image>, AssetError> {
    let path = config.asset_path(relative);
    if !path.is_file() {
        return Err(AssetError::Missing(path));
    }
    Ok(asset_server.load(relative.to_string()))
}

struct PendingTexture {
    path: String,
    image: Handle<Image>,
    material: Handle<StandardMaterial>,
}

/// Materials whose texture is still loading. A texture that fails is stripped from its
/// material so the body renders with its base color.
#[derive(Resource, Default)]
pub struct PendingTextures {
    entries: Vec<PendingTexture>,
}

impl PendingTextures {
    pub fn track(&mut self, path: &str, image: Handle<Image>, material: Handle<StandardMaterial>) {
        self.entries.push(PendingTexture {
            path: path.to_string(),
            image,
            material,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

pub fn watch_pending_textures(
    asset_server: Res<AssetServer>,
    mut pending: ResMut<PendingTextures>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if pending.is_empty() {
        return;
    }

    pending.entries.retain(|entry| {
        match asset_server.get_load_state(&entry.image) {
            Some(LoadState::Loaded) => false,
            Some(LoadState::Failed(_)) => {
                warn!("{}; rendering untextured", AssetError::Failed(entry.path.clone()));
                if let Some(material) = materials.get_mut(&entry.material) {
                    material.base_color_texture = None;
                }
                false
            }
            _ => true,
        }
    });
}

pub struct TexturePlugin;

impl Plugin for TexturePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingTextures>()
            .add_systems(Update, watch_pending_textures);
    }
}
