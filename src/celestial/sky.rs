use bevy::asset::LoadState;
use bevy::math::Affine2;
use bevy::prelude::*;

use crate::camera::SandboxCamera;
use crate::config::SandboxConfig;
use crate::geometry::skydome;
use crate::scene::spawn::orrery_rotation;
use crate::texture::{load_texture, starfield_image, AssetError};

const STARFIELD_WIDTH: u32 = 2048;
const STARFIELD_HEIGHT: u32 = 1024;
const STARFIELD_STARS: u32 = 6000;
const STARFIELD_SEED: u64 = 0x5eed_57a7;

#[derive(Component)]
pub struct SkyDome;

/// Tracks the sky texture until it either loads or is replaced by the starfield.
#[derive(Resource, Default)]
pub struct SkyTexture {
    path: Option<String>,
    image: Option<Handle<Image>>,
    material: Option<Handle<StandardMaterial>>,
}

pub struct SkyPlugin;

impl Plugin for SkyPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SkyTexture>()
            .insert_resource(ClearColor(Color::BLACK))
            .add_systems(Startup, spawn_skydome)
            .add_systems(Update, (watch_sky_texture, follow_camera));
    }
}

fn spawn_skydome(
    mut commands: Commands,
    config: Option<Res<SandboxConfig>>,
    asset_server: Res<AssetServer>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
    mut sky: ResMut<SkyTexture>,
) {
    let config = config.map(|config| config.clone()).unwrap_or_default();

    let loaded = match config.skydome_texture.as_deref() {
        Some(path) => match load_texture(&config, &asset_server, path) {
            Ok(image) => {
                sky.path = Some(path.to_string());
                sky.image = Some(image.clone());
                Some(image)
            }
            Err(error) => {
                warn!("{}; using a generated starfield", error);
                None
            }
        },
        None => None,
    };
    let image = loaded.unwrap_or_else(|| images.add(generated_starfield()));

    let material = materials.add(StandardMaterial {
        base_color_texture: Some(image),
        unlit: true,
        cull_mode: None,
        fog_enabled: false,
        uv_transform: Affine2::from_scale_angle_translation(
            Vec2::new(1.0, -1.0),
            0.0,
            Vec2::new(0.0, 1.0),
        ),
        ..default()
    });
    sky.material = Some(material.clone());

    let mesh = skydome(
        config.skydome_radius,
        config.sphere_lat_steps,
        config.sphere_long_steps * 2,
    )
    .into_mesh();

    commands.spawn((
        PbrBundle {
            mesh: meshes.add(mesh),
            material,
            transform: Transform::from_rotation(orrery_rotation()),
            ..default()
        },
        SkyDome,
        Name::new("Skydome"),
    ));
}

fn generated_starfield() -> Image {
    starfield_image(STARFIELD_WIDTH, STARFIELD_HEIGHT, STARFIELD_STARS, STARFIELD_SEED)
}

fn watch_sky_texture(
    asset_server: Res<AssetServer>,
    mut sky: ResMut<SkyTexture>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
) {
    let Some(image) = sky.image.clone() else {
        return;
    };
    match asset_server.get_load_state(&image) {
        Some(LoadState::Loaded) => {
            sky.image = None;
        }
        Some(LoadState::Failed(_)) => {
            let path = sky.path.clone().unwrap_or_default();
            warn!("{}; using a generated starfield", AssetError::Failed(path));
            let fallback = images.add(generated_starfield());
            if let Some(material) = sky.material.as_ref().and_then(|m| materials.get_mut(m)) {
                material.base_color_texture = Some(fallback);
            }
            sky.image = None;
        }
        _ => {}
    }
}

/// Keeps the dome centered on the camera so it is never reached.
fn follow_camera(
    cameras: Query<&Transform, (With<SandboxCamera>, Without<SkyDome>)>,
    mut domes: Query<&mut Transform, With<SkyDome>>,
) {
    let Ok(camera) = cameras.get_single() else {
        return;
    };
    for mut dome in domes.iter_mut() {
        dome.translation = camera.translation;
    }
}
