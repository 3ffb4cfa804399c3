use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::camera::{CameraFocus, SandboxCamera};
use crate::input::{cursor_locked, prompt_closed};
use crate::scene::{BodyId, BodyPart, PartRole, SolarSystem};
use crate::SandboxSet;

/// A body's bounding sphere in renderer space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickTarget {
    pub id: BodyId,
    pub center: Vec3,
    pub radius: f32,
}

/// Distance along a normalized ray to the first intersection with a sphere in front of it.
pub fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let offset = origin - center;
    let b = offset.dot(direction);
    let c = offset.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let root = discriminant.sqrt();
    let near = -b - root;
    let far = -b + root;
    if near >= 0.0 {
        Some(near)
    } else if far >= 0.0 {
        // origin is inside the sphere
        Some(0.0)
    } else {
        None
    }
}

/// Nearest body hit by the ray, with the hit distance.
pub fn pick_nearest(
    origin: Vec3,
    direction: Vec3,
    targets: impl IntoIterator<Item = PickTarget>,
) -> Option<(BodyId, f32)> {
    targets
        .into_iter()
        .filter_map(|target| {
            ray_sphere(origin, direction, target.center, target.radius)
                .map(|distance| (target.id, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

pub struct InteractionPlugin;

impl Plugin for InteractionPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            pick_body.run_if(prompt_closed).in_set(SandboxSet::Input),
        );
    }
}

fn pick_body(
    mouse: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<SandboxCamera>>,
    nodes: Query<(&BodyPart, &GlobalTransform)>,
    system: Res<SolarSystem>,
    mut focus: ResMut<CameraFocus>,
) {
    if !mouse.just_pressed(MouseButton::Left) {
        return;
    }
    let Ok(window) = windows.get_single() else {
        return;
    };
    // a locked cursor is steering the camera, not pointing
    if cursor_locked(window) {
        return;
    }
    let Some(cursor) = window.cursor_position() else {
        return;
    };
    let Ok((camera, camera_transform)) = cameras.get_single() else {
        return;
    };
    let Some(ray) = camera.viewport_to_world(camera_transform, cursor) else {
        return;
    };

    let generation = system.generation();
    let targets = nodes
        .iter()
        .filter(|(part, _)| part.role == PartRole::Node && part.generation == generation)
        .filter_map(|(part, global)| {
            let body = system.body(part.id)?;
            Some(PickTarget {
                id: part.id,
                center: global.translation(),
                radius: body.radius(),
            })
        });

    if let Some((id, distance)) = pick_nearest(ray.origin, *ray.direction, targets) {
        if let Some(name) = focus.focus(&system, id) {
            info!("Focused '{}' at distance {:.1}", name, distance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: u32, center: Vec3, radius: f32) -> PickTarget {
        PickTarget {
            id: BodyId(id),
            center,
            radius,
        }
    }

    #[test]
    fn ray_hits_sphere_front_surface() {
        let hit = ray_sphere(Vec3::ZERO, Vec3::NEG_Z, Vec3::new(0.0, 0.0, -10.0), 2.0);
        assert!((hit.unwrap() - 8.0).abs() < 1e-5);
        assert_eq!(ray_sphere(Vec3::ZERO, Vec3::Z, Vec3::new(0.0, 0.0, -10.0), 2.0), None);
        assert_eq!(ray_sphere(Vec3::ZERO, Vec3::NEG_Z, Vec3::new(5.0, 0.0, -10.0), 2.0), None);
        assert_eq!(ray_sphere(Vec3::ZERO, Vec3::X, Vec3::ZERO, 1.0), Some(0.0));
    }

    #[test]
    fn nearest_sphere_along_the_ray_wins() {
        let targets = [
            target(0, Vec3::new(0.0, 0.0, -50.0), 5.0),
            target(1, Vec3::new(0.0, 0.5, -20.0), 1.0),
            target(2, Vec3::new(3.0, 0.0, -5.0), 1.0),
        ];
        let (id, distance) = pick_nearest(Vec3::ZERO, Vec3::NEG_Z, targets).unwrap();
        assert_eq!(id, BodyId(1));
        assert!(distance < 20.0 && distance > 19.0);
        assert_eq!(pick_nearest(Vec3::ZERO, Vec3::Y, targets), None);
    }
}
