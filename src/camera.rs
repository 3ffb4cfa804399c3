use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::render::camera::PerspectiveProjection;
use bevy::window::PrimaryWindow;

use crate::config::SandboxConfig;
use crate::input::{cursor_locked, prompt_closed};
use crate::scene::{BodyId, BodyPart, PartRole, SolarSystem};
use crate::SandboxSet;

/// Where `R` puts the camera: above the plane, looking back at the star.
pub const HOME_POSITION: Vec3 = Vec3::new(0.0, 5.0, 30.0);
const MIN_ORBIT_DISTANCE: f32 = 1.5;
const MAX_ORBIT_DISTANCE: f32 = 200.0;

#[derive(Component)]
pub struct SandboxCamera;

#[derive(Component)]
pub struct CameraController {
    pub move_speed: f32,
    pub look_sensitivity: f32,
    pub pitch: f32,
    pub yaw: f32,
    /// Follow distance in multiples of the focused body's radius.
    pub orbit_distance: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            move_speed: crate::config::CAMERA_MOVE_SPEED,
            look_sensitivity: crate::config::CAMERA_LOOK_SENSITIVITY,
            pitch: 0.0,
            yaw: 0.0,
            orbit_distance: crate::config::CAMERA_ORBIT_DISTANCE,
        }
    }
}

impl CameraController {
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch)
    }
}

/// Body the camera orbits, if any. Survives rebuilds by name.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct CameraFocus {
    pub target: Option<FocusTarget>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FocusTarget {
    pub generation: u64,
    pub id: BodyId,
    pub name: String,
}

impl CameraFocus {
    pub fn focus<'a>(&mut self, system: &'a SolarSystem, id: BodyId) -> Option<&'a str> {
        let body = system.body(id)?;
        self.target = Some(FocusTarget {
            generation: system.generation(),
            id,
            name: body.name().to_string(),
        });
        Some(body.name())
    }

    pub fn clear(&mut self) {
        self.target = None;
    }

    /// Re-resolves the focus after a rebuild. Drops it when the body no longer exists.
    pub fn refresh(&mut self, system: &SolarSystem) {
        let Some(target) = &mut self.target else {
            return;
        };
        if target.generation == system.generation() {
            return;
        }
        match system.find_by_name(&target.name) {
            Some(id) => {
                target.id = id;
                target.generation = system.generation();
            }
            None => {
                info!("Focused body '{}' is gone", target.name);
                self.target = None;
            }
        }
    }
}

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraFocus>()
            .add_systems(Startup, setup_camera)
            .add_systems(
                Update,
                (
                    (camera_look, camera_zoom, camera_move, camera_reset, clear_focus)
                        .run_if(prompt_closed)
                        .in_set(SandboxSet::Input),
                    camera_follow.after(SandboxSet::Sync),
                ),
            );
    }
}

fn setup_camera(mut commands: Commands, config: Option<Res<SandboxConfig>>) {
    let config = config.map(|config| config.clone()).unwrap_or_default();
    info!("Spawning camera at {:?}", HOME_POSITION);

    commands.spawn((
        Camera3dBundle {
            transform: Transform::from_translation(HOME_POSITION),
            projection: PerspectiveProjection {
                near: 0.05,
                // keep the skydome inside the frustum
                far: config.skydome_radius * 3.0,
                fov: 60.0_f32.to_radians(),
                ..default()
            }
            .into(),
            ..default()
        },
        SandboxCamera,
        CameraController {
            move_speed: config.camera_move_speed,
            look_sensitivity: config.camera_look_sensitivity,
            orbit_distance: config.camera_orbit_distance,
            ..default()
        },
    ));
}

fn camera_look(
    mut motion_events: EventReader<MouseMotion>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut query: Query<(&mut Transform, &mut CameraController), With<SandboxCamera>>,
) {
    let mut delta = Vec2::ZERO;
    for event in motion_events.read() {
        delta += event.delta;
    }

    let locked = windows.get_single().map_or(false, cursor_locked);
    let Ok((mut transform, mut controller)) = query.get_single_mut() else {
        return;
    };

    if locked && delta.length_squared() > 0.0 {
        controller.yaw -= delta.x * controller.look_sensitivity;
        controller.pitch -= delta.y * controller.look_sensitivity;
        controller.pitch = controller.pitch.clamp(-1.5, 1.5);

        transform.rotation = controller.rotation();
    }
}

fn camera_zoom(
    mut wheel_events: EventReader<MouseWheel>,
    mut query: Query<&mut CameraController, With<SandboxCamera>>,
) {
    let mut scroll = 0.0;
    for event in wheel_events.read() {
        scroll += match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / 40.0,
        };
    }
    if scroll == 0.0 {
        return;
    }
    let Ok(mut controller) = query.get_single_mut() else {
        return;
    };
    controller.orbit_distance =
        (controller.orbit_distance * 0.9f32.powf(scroll)).clamp(MIN_ORBIT_DISTANCE, MAX_ORBIT_DISTANCE);
}

/// Unit direction from WASD, Q/E (camera down/up) and Space/Shift (world up/down).
pub fn movement_direction(keyboard: &ButtonInput<KeyCode>, rotation: Quat) -> Vec3 {
    let forward = rotation * Vec3::NEG_Z;
    let right = rotation * Vec3::X;
    let up = rotation * Vec3::Y;

    let mut direction = Vec3::ZERO;
    if keyboard.pressed(KeyCode::KeyW) {
        direction += forward;
    }
    if keyboard.pressed(KeyCode::KeyS) {
        direction -= forward;
    }
    if keyboard.pressed(KeyCode::KeyD) {
        direction += right;
    }
    if keyboard.pressed(KeyCode::KeyA) {
        direction -= right;
    }
    if keyboard.pressed(KeyCode::KeyE) {
        direction += up;
    }
    if keyboard.pressed(KeyCode::KeyQ) {
        direction -= up;
    }
    if keyboard.pressed(KeyCode::Space) {
        direction += Vec3::Y;
    }
    if keyboard.pressed(KeyCode::ShiftLeft) {
        direction -= Vec3::Y;
    }
    direction.normalize_or_zero()
}

fn camera_move(
    time: Res<Time>,
    keyboard: Res<ButtonInput<KeyCode>>,
    focus: Res<CameraFocus>,
    mut query: Query<(&mut Transform, &CameraController), With<SandboxCamera>>,
) {
    if focus.target.is_some() {
        return;
    }
    let Ok((mut transform, controller)) = query.get_single_mut() else {
        return;
    };
    let direction = movement_direction(&keyboard, transform.rotation);
    transform.translation += direction * controller.move_speed * time.delta_seconds();
}

fn camera_reset(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut focus: ResMut<CameraFocus>,
    mut query: Query<(&mut Transform, &mut CameraController), With<SandboxCamera>>,
) {
    if !keyboard.just_pressed(KeyCode::KeyR) {
        return;
    }
    let Ok((mut transform, mut controller)) = query.get_single_mut() else {
        return;
    };
    controller.yaw = 0.0;
    controller.pitch = 0.0;
    *transform = Transform::from_translation(HOME_POSITION);
    focus.clear();
    info!("Camera reset");
}

fn clear_focus(keyboard: Res<ButtonInput<KeyCode>>, mut focus: ResMut<CameraFocus>) {
    if keyboard.just_pressed(KeyCode::KeyF) && focus.target.is_some() {
        focus.clear();
        info!("Free-fly camera");
    }
}

/// Camera placement looking at `target` from `distance` away along the controller's rotation.
pub fn orbit_camera_transform(target: Vec3, rotation: Quat, distance: f32) -> Transform {
    Transform::from_translation(target + rotation * Vec3::Z * distance).with_rotation(rotation)
}

fn camera_follow(
    system: Res<SolarSystem>,
    mut focus: ResMut<CameraFocus>,
    nodes: Query<(&BodyPart, &GlobalTransform)>,
    mut cameras: Query<(&mut Transform, &CameraController), With<SandboxCamera>>,
) {
    if focus.target.is_none() {
        return;
    }
    focus.refresh(&system);
    let Some(target) = &focus.target else {
        return;
    };
    let Some(body) = system.body(target.id) else {
        return;
    };
    let Some(center) = nodes
        .iter()
        .find(|(part, _)| {
            part.role == PartRole::Node
                && part.generation == target.generation
                && part.id == target.id
        })
        .map(|(_, global)| global.translation())
    else {
        return;
    };
    let Ok((mut transform, controller)) = cameras.get_single_mut() else {
        return;
    };

    let distance = body.radius() * controller.orbit_distance + body.radius();
    *transform = orbit_camera_transform(center, controller.rotation(), distance);
}
