use std::fs;
use std::path::{Path, PathBuf};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::celestial::time::LightAnchor;

pub const CONFIG_FILE: &str = "sandbox.json";

// Tessellation
pub const SPHERE_LAT_STEPS: u32 = 32;
pub const SPHERE_LONG_STEPS: u32 = 32;
pub const RING_SEGMENTS: u32 = 128;
pub const ORBIT_PATH_SEGMENTS: u32 = 128;

// Sky
pub const SKYDOME_RADIUS: f32 = 1500.0;
pub const SKYDOME_TEXTURE: &str = "textures/space.jpg";

// Camera, matching the original fly speed
pub const CAMERA_MOVE_SPEED: f32 = 22.0;
pub const CAMERA_LOOK_SENSITIVITY: f32 = 0.0026;
pub const CAMERA_ORBIT_DISTANCE: f32 = 4.0;

#[derive(Resource, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Declarative scene document, read at startup and watched for changes.
    pub scene_path: PathBuf,
    /// Root that texture paths in the scene are relative to.
    pub asset_root: PathBuf,
    pub listener_enabled: bool,
    pub listener_addr: String,
    pub hot_reload: bool,
    pub hot_reload_interval_secs: f32,
    pub sphere_lat_steps: u32,
    pub sphere_long_steps: u32,
    pub ring_segments: u32,
    pub debug_orbits: bool,
    pub orbit_path_segments: u32,
    pub skydome_radius: f32,
    pub skydome_texture: Option<String>,
    pub light_anchor: LightAnchor,
    pub light_intensity: f32,
    pub ambient_brightness: f32,
    pub camera_move_speed: f32,
    pub camera_look_sensitivity: f32,
    /// Orbit-follow distance in multiples of the focused body's radius.
    pub camera_orbit_distance: f32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            scene_path: PathBuf::from("assets/scene.json"),
            asset_root: PathBuf::from("assets"),
            listener_enabled: true,
            listener_addr: "127.0.0.1:8765".to_string(),
            hot_reload: true,
            hot_reload_interval_secs: 1.0,
            sphere_lat_steps: SPHERE_LAT_STEPS,
            sphere_long_steps: SPHERE_LONG_STEPS,
            ring_segments: RING_SEGMENTS,
            debug_orbits: true,
            orbit_path_segments: ORBIT_PATH_SEGMENTS,
            skydome_radius: SKYDOME_RADIUS,
            skydome_texture: Some(SKYDOME_TEXTURE.to_string()),
            light_anchor: LightAnchor::Origin,
            light_intensity: 4.0e8,
            ambient_brightness: 120.0,
            camera_move_speed: CAMERA_MOVE_SPEED,
            camera_look_sensitivity: CAMERA_LOOK_SENSITIVITY,
            camera_orbit_distance: CAMERA_ORBIT_DISTANCE,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A settings file that could not be used. Filled before the app exists and reported
/// at startup, once logging is up.
#[derive(Resource, Debug, Default)]
pub struct ConfigLoadError(pub Option<ConfigError>);

impl SandboxConfig {
    /// Reads `path`. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`SandboxConfig::load`], falling back to defaults and handing back the error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<ConfigError>) {
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(error) => (Self::default(), Some(error)),
        }
    }

    /// Resolves a scene-relative asset path against the asset root.
    pub fn asset_path(&self, relative: &str) -> PathBuf {
        self.asset_root.join(relative)
    }
}

pub fn report_config_error(mut error: ResMut<ConfigLoadError>) {
    if let Some(error) = error.0.take() {
        warn!("{}; using default settings", error);
    }
}
