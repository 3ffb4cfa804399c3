use std::f32::consts::FRAC_PI_2;

use bevy::ecs::system::SystemParam;
use bevy::math::Affine2;
use bevy::prelude::*;
use bevy::render::render_resource::Face;

use crate::celestial::body::{BodyKind, CelestialBody, Decoration, DecorationKind};
use crate::config::SandboxConfig;
use crate::geometry::{line_strip_mesh, ring, uv_sphere};
use crate::orbit::orbit_path;
use crate::scene::builder::{BodyId, SolarSystem};
use crate::scene::SceneDocument;
use crate::texture::{load_texture, PendingTextures};

/// Overlay shells sit just above the surface.
const OVERLAY_SCALE: f32 = 1.02;

/// Root of everything orbital. Rotates the Z-up orbital frame into the renderer's Y-up frame.
#[derive(Component)]
pub struct OrreryFrame;

/// Parent of every entity spawned by one build. Despawned wholesale on rebuild.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneInstance {
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartRole {
    /// Translation-only transform node that children attach to.
    Node,
    Mesh,
    Ring,
    Overlay,
    OrbitPath,
}

/// Links a renderer entity to the body that drives it within one build generation.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyPart {
    pub generation: u64,
    pub id: BodyId,
    pub role: PartRole,
}

pub fn orrery_rotation() -> Quat {
    Quat::from_rotation_x(-FRAC_PI_2)
}

/// Maps a point in the orbital frame into renderer space.
pub fn to_render_frame(position: Vec3) -> Vec3 {
    orrery_rotation() * position
}

#[derive(Resource, Default)]
pub struct GeometryCache {
    sphere: Option<(u32, u32, Handle<Mesh>)>,
}

impl GeometryCache {
    /// Unit sphere shared by every body; each body scales it by its radius.
    pub fn unit_sphere(&mut self, meshes: &mut Assets<Mesh>, lat: u32, long: u32) -> Handle<Mesh> {
        if let Some((cached_lat, cached_long, handle)) = &self.sphere {
            if *cached_lat == lat && *cached_long == long {
                return handle.clone();
            }
        }
        let handle = meshes.add(uv_sphere(1.0, lat, long).into_mesh());
        self.sphere = Some((lat, long, handle.clone()));
        handle
    }
}

#[derive(SystemParam)]
pub struct SceneAssets<'w> {
    config: Res<'w, SandboxConfig>,
    asset_server: Res<'w, AssetServer>,
    meshes: ResMut<'w, Assets<Mesh>>,
    materials: ResMut<'w, Assets<StandardMaterial>>,
    cache: ResMut<'w, GeometryCache>,
    pending: ResMut<'w, PendingTextures>,
}

impl SceneAssets<'_> {
    /// Textures are stored top-down; flip V so they map upright on the generated UVs.
    fn flipped_uv() -> Affine2 {
        Affine2::from_scale_angle_translation(Vec2::new(1.0, -1.0), 0.0, Vec2::new(0.0, 1.0))
    }

    fn textured_material(
        &mut self,
        owner: &str,
        texture: Option<&str>,
        mut material: StandardMaterial,
    ) -> Handle<StandardMaterial> {
        let image = texture.and_then(|path| {
            match load_texture(&self.config, &self.asset_server, path) {
                Ok(image) => Some((path, image)),
                Err(error) => {
                    warn!("{}: {}; rendering untextured", owner, error);
                    None
                }
            }
        });

        material.uv_transform = Self::flipped_uv();
        material.base_color_texture = image.as_ref().map(|(_, image)| image.clone());
        let handle = self.materials.add(material);
        if let Some((path, image)) = image {
            self.pending.track(path, image, handle.clone());
        }
        handle
    }

    fn body_material(&mut self, body: &CelestialBody) -> Handle<StandardMaterial> {
        let base = match body.kind() {
            BodyKind::Star => StandardMaterial {
                base_color: Color::srgb(1.0, 0.85, 0.45),
                unlit: true,
                ..default()
            },
            BodyKind::Planet => StandardMaterial {
                base_color: Color::srgb(0.62, 0.66, 0.74),
                perceptual_roughness: 0.9,
                ..default()
            },
            BodyKind::Moon => StandardMaterial {
                base_color: Color::srgb(0.55, 0.55, 0.55),
                perceptual_roughness: 1.0,
                ..default()
            },
        };
        let base = if body.texture().is_some() {
            StandardMaterial {
                base_color: Color::WHITE,
                ..base
            }
        } else {
            base
        };
        self.textured_material(body.name(), body.texture(), base)
    }

    fn decoration_material(
        &mut self,
        body: &CelestialBody,
        decoration: &Decoration,
    ) -> Handle<StandardMaterial> {
        let base = match decoration.kind() {
            DecorationKind::Ring => StandardMaterial {
                base_color: Color::srgba(0.85, 0.78, 0.62, 0.8),
                alpha_mode: AlphaMode::Blend,
                cull_mode: None,
                double_sided: true,
                ..default()
            },
            DecorationKind::Overlay => StandardMaterial {
                base_color: Color::srgba(1.0, 1.0, 1.0, 0.9),
                alpha_mode: AlphaMode::Blend,
                cull_mode: Some(Face::Back),
                ..default()
            },
        };
        self.textured_material(body.name(), decoration.texture(), base)
    }

    fn orbit_material(&mut self) -> Handle<StandardMaterial> {
        self.materials.add(StandardMaterial {
            base_color: Color::srgba(0.3, 0.9, 0.4, 0.6),
            alpha_mode: AlphaMode::Blend,
            unlit: true,
            ..default()
        })
    }
}

pub fn spawn_orrery_frame(mut commands: Commands) {
    commands.spawn((
        SpatialBundle::from_transform(Transform::from_rotation(orrery_rotation())),
        OrreryFrame,
        Name::new("Orrery"),
    ));
}

/// Throws away the previous build and spawns the new one. Runs whenever the document changes.
pub fn rebuild_scene(
    mut commands: Commands,
    document: Res<SceneDocument>,
    mut system: ResMut<SolarSystem>,
    frames: Query<Entity, With<OrreryFrame>>,
    instances: Query<Entity, With<SceneInstance>>,
    mut assets: SceneAssets,
) {
    for instance in &instances {
        commands.entity(instance).despawn_recursive();
    }
    assets.pending.clear();

    let report = system.rebuild(document.root());
    for diagnostic in &report.diagnostics {
        warn!(
            "Skipping {}: {} ({} descendants dropped)",
            diagnostic.path, diagnostic.error, diagnostic.dropped_descendants
        );
    }
    info!(
        "Built scene generation {}: {} bodies, {} skipped, {} disposed",
        report.generation,
        report.built,
        report.skipped(),
        report.disposed
    );

    let Ok(frame) = frames.get_single() else {
        warn!("No orrery frame to attach the scene to");
        return;
    };

    let generation = system.generation();
    let instance = commands
        .spawn((
            SpatialBundle::default(),
            SceneInstance { generation },
            Name::new(format!("Scene #{generation}")),
        ))
        .set_parent(frame)
        .id();

    let (lat, long) = (assets.config.sphere_lat_steps, assets.config.sphere_long_steps);
    let sphere = assets.cache.unit_sphere(&mut assets.meshes, lat, long);
    let orbit_material = if assets.config.debug_orbits {
        Some(assets.orbit_material())
    } else {
        None
    };

    let mut nodes: Vec<Entity> = Vec::with_capacity(system.len());
    for entry in system.iter() {
        let body = &entry.body;
        let parent = entry
            .parent
            .and_then(|parent| nodes.get(parent.index()).copied())
            .unwrap_or(instance);
        let tag = |role| BodyPart {
            generation,
            id: entry.id,
            role,
        };

        let node = commands
            .spawn((
                SpatialBundle::from_transform(Transform::from_translation(body.position())),
                tag(PartRole::Node),
                Name::new(body.name().to_string()),
            ))
            .set_parent(parent)
            .id();
        nodes.push(node);

        let material = assets.body_material(body);
        commands
            .spawn((
                PbrBundle {
                    mesh: sphere.clone(),
                    material,
                    transform: Transform::from_rotation(body.spin())
                        .with_scale(Vec3::splat(body.radius())),
                    ..default()
                },
                tag(PartRole::Mesh),
            ))
            .set_parent(node);

        for decoration in body.decorations() {
            let material = assets.decoration_material(body, decoration);
            let (mesh, transform, role) = match decoration {
                Decoration::Ring(ring_spec) => (
                    assets.meshes.add(
                        ring(
                            ring_spec.inner_radius,
                            ring_spec.outer_radius,
                            assets.config.ring_segments,
                        )
                        .into_mesh(),
                    ),
                    Transform::from_rotation(body.ring_rotation().unwrap_or_default()),
                    PartRole::Ring,
                ),
                Decoration::Overlay(_) => (
                    sphere.clone(),
                    Transform::from_rotation(body.overlay_rotation().unwrap_or_default())
                        .with_scale(Vec3::splat(body.radius() * OVERLAY_SCALE)),
                    PartRole::Overlay,
                ),
            };
            commands
                .spawn((
                    PbrBundle {
                        mesh,
                        material,
                        transform,
                        ..default()
                    },
                    tag(role),
                ))
                .set_parent(node);
        }

        if let Some(orbit_material) = &orbit_material {
            let path = orbit_path(body.elements(), assets.config.orbit_path_segments);
            if !path.is_empty() {
                commands
                    .spawn((
                        PbrBundle {
                            mesh: assets.meshes.add(line_strip_mesh(&path)),
                            material: orbit_material.clone(),
                            ..default()
                        },
                        tag(PartRole::OrbitPath),
                    ))
                    .set_parent(parent);
            }
        }
    }
}

/// Copies live body state onto the entities of the current generation.
pub fn sync_body_transforms(
    system: Res<SolarSystem>,
    mut parts: Query<(&BodyPart, &mut Transform)>,
) {
    let generation = system.generation();
    for (part, mut transform) in &mut parts {
        if part.generation != generation {
            continue;
        }
        let Some(body) = system.body(part.id).filter(|body| body.is_active()) else {
            continue;
        };
        match part.role {
            PartRole::Node => transform.translation = body.position(),
            PartRole::Mesh => transform.rotation = body.spin(),
            PartRole::Ring => {
                if let Some(rotation) = body.ring_rotation() {
                    transform.rotation = rotation;
                }
            }
            PartRole::Overlay => {
                if let Some(rotation) = body.overlay_rotation() {
                    transform.rotation = rotation;
                }
            }
            PartRole::OrbitPath => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::celestial::time::SimulationContext;
    use crate::scene::node::SceneNode;

    fn scene() -> SceneNode {
        serde_json::from_str(
            r#"{
                "name": "Sun", "type": "star", "radius": 5,
                "orbit_radius": 0, "orbit_speed": 0, "rotation_speed": 2,
                "children": [
                    { "name": "Saturn", "type": "planet", "radius": 1.2,
                      "orbit_radius": 30, "orbit_speed": 10, "rotation_speed": 40,
                      "rings": { "inner_radius": 1.6, "outer_radius": 2.8, "rotation_speed": 5 } }
                ]
            }"#,
        )
        .unwrap()
    }

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, AssetPlugin::default()))
            .init_asset::<Mesh>()
            .init_asset::<Image>()
            .init_asset::<StandardMaterial>()
            .insert_resource(SandboxConfig {
                asset_root: std::env::temp_dir().join("solar-sandbox-empty-assets"),
                ..Default::default()
            })
            .init_resource::<GeometryCache>()
            .init_resource::<PendingTextures>()
            .init_resource::<SolarSystem>()
            .init_resource::<SceneDocument>()
            .add_systems(Startup, spawn_orrery_frame)
            .add_systems(
                Update,
                (
                    rebuild_scene.run_if(resource_changed::<SceneDocument>),
                    sync_body_transforms,
                )
                    .chain(),
            );
        app
    }

    fn parts(app: &mut App, role: PartRole) -> Vec<BodyPart> {
        let mut query = app.world_mut().query::<&BodyPart>();
        query
            .iter(app.world())
            .filter(|part| part.role == role)
            .copied()
            .collect()
    }

    #[test]
    fn rebuild_spawns_tagged_parts_for_the_current_generation() {
        let mut app = app();
        app.world_mut()
            .resource_mut::<SceneDocument>()
            .replace(Some(scene()));
        app.update();

        let nodes = parts(&mut app, PartRole::Node);
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|part| part.generation == 1));
        assert_eq!(parts(&mut app, PartRole::Ring).len(), 1);
        // the star sits still, so only Saturn has an orbit line
        assert_eq!(parts(&mut app, PartRole::OrbitPath).len(), 1);

        app.world_mut()
            .resource_mut::<SceneDocument>()
            .replace(Some(scene()));
        app.update();

        let mut instances = app.world_mut().query::<&SceneInstance>();
        let generations: Vec<_> = instances.iter(app.world()).map(|i| i.generation).collect();
        assert_eq!(generations, [2]);
        let nodes = parts(&mut app, PartRole::Node);
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|part| part.generation == 2));
    }

    #[test]
    fn sync_copies_body_position_onto_its_node() {
        let mut app = app();
        app.world_mut()
            .resource_mut::<SceneDocument>()
            .replace(Some(scene()));
        app.update();

        let saturn = {
            let mut system = app.world_mut().resource_mut::<SolarSystem>();
            system.advance_all(2.0, &SimulationContext::default());
            let id = system.find_by_name("Saturn").unwrap();
            (id, system.body(id).unwrap().position())
        };
        app.update();

        let mut query = app.world_mut().query::<(&BodyPart, &Transform)>();
        let translation = query
            .iter(app.world())
            .find(|(part, _)| part.id == saturn.0 && part.role == PartRole::Node)
            .map(|(_, transform)| transform.translation)
            .unwrap();
        assert!(translation.distance(saturn.1) < 1e-5);
    }

    #[test]
    fn missing_texture_still_spawns_an_untextured_body() {
        let mut root = scene();
        root.child_mut("Saturn").unwrap().texture = Some("textures/missing.jpg".into());
        let mut app = app();
        app.world_mut()
            .resource_mut::<SceneDocument>()
            .replace(Some(root));
        app.update();

        let saturn = app
            .world()
            .resource::<SolarSystem>()
            .find_by_name("Saturn")
            .unwrap();
        let mut query = app
            .world_mut()
            .query::<(&BodyPart, &Handle<StandardMaterial>)>();
        let material = query
            .iter(app.world())
            .find(|(part, _)| part.id == saturn && part.role == PartRole::Mesh)
            .map(|(_, material)| material.clone())
            .unwrap();

        let materials = app.world().resource::<Assets<StandardMaterial>>();
        assert!(materials.get(&material).unwrap().base_color_texture.is_none());
        assert!(app.world().resource::<PendingTextures>().is_empty());
    }

    #[test]
    fn render_frame_turns_orbital_z_into_y() {
        let up = to_render_frame(Vec3::Z);
        assert!(up.distance(Vec3::Y) < 1e-6);
    }
}
