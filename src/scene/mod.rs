pub mod builder;
pub mod error;
pub mod node;
pub mod persistence;
pub mod spawn;

use bevy::prelude::*;

use crate::celestial::time::SimulationContext;
use crate::config::{report_config_error, ConfigLoadError, SandboxConfig};
use crate::SandboxSet;

pub use builder::{BodyId, BuildReport, SolarSystem};
pub use error::{SceneError, SpecError};
pub use node::SceneNode;
pub use spawn::{to_render_frame, BodyPart, PartRole};

use persistence::{
    dispatch_saves, load_initial_scene, poll_saves, watch_scene_file, DiskSceneStore,
    HotReloadState, PendingSaves, SaveRequest, SceneStoreHandle,
};
use spawn::{rebuild_scene, spawn_orrery_frame, sync_body_transforms, GeometryCache};

/// The declarative tree the live scene is built from. Any mutable access counts as a change
/// and triggers a full rebuild, so read through [`SceneDocument::root`] when only looking.
#[derive(Resource, Debug, Default)]
pub struct SceneDocument {
    root: Option<SceneNode>,
    revision: u64,
}

impl SceneDocument {
    pub fn new(root: Option<SceneNode>) -> Self {
        Self { root, revision: 0 }
    }

    pub fn root(&self) -> Option<&SceneNode> {
        self.root.as_ref()
    }

    pub fn replace(&mut self, root: Option<SceneNode>) {
        self.root = root;
        self.revision += 1;
    }

    /// Bumped on every replacement.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

pub fn advance_bodies(
    time: Res<Time>,
    mut context: ResMut<SimulationContext>,
    mut system: ResMut<SolarSystem>,
) {
    let dt = time.delta_seconds();
    context.tick(dt);
    system.advance_all(dt, &context);
}

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<SandboxConfig>()
            .cloned()
            .unwrap_or_default();

        app.init_resource::<SandboxConfig>()
            .init_resource::<ConfigLoadError>()
            .init_resource::<SceneDocument>()
            .init_resource::<SolarSystem>()
            .init_resource::<GeometryCache>()
            .init_resource::<PendingSaves>()
            .init_resource::<SaveRequest>()
            .insert_resource(HotReloadState::new(config.hot_reload_interval_secs))
            .insert_resource(SceneStoreHandle::new(DiskSceneStore::new(&config.scene_path)))
            .add_systems(
                Startup,
                (report_config_error, spawn_orrery_frame, load_initial_scene),
            )
            .add_systems(
                Update,
                (
                    (watch_scene_file, dispatch_saves, poll_saves).in_set(SandboxSet::Mutation),
                    rebuild_scene
                        .run_if(resource_changed::<SceneDocument>)
                        .in_set(SandboxSet::Rebuild),
                    advance_bodies.in_set(SandboxSet::Simulate),
                    sync_body_transforms.in_set(SandboxSet::Sync),
                ),
            );
    }
}
