use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use bevy::prelude::*;
use bevy::tasks::{IoTaskPool, Task};
use futures_lite::future;

use crate::config::SandboxConfig;
use crate::scene::error::SceneError;
use crate::scene::node::SceneNode;
use crate::scene::SceneDocument;

/// Backing store for the scene document.
pub trait SceneStore: Send + Sync + 'static {
    fn load(&self) -> Result<SceneNode, SceneError>;
    fn save(&self, root: &SceneNode) -> Result<(), SceneError>;
    /// Last modification time, if the store can tell.
    fn modified(&self) -> Option<SystemTime>;
    /// Where the document lives, for log lines.
    fn location(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct DiskSceneStore {
    path: PathBuf,
}

impl DiskSceneStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SceneStore for DiskSceneStore {
    fn load(&self) -> Result<SceneNode, SceneError> {
        load_document(&self.path)
    }

    fn save(&self, root: &SceneNode) -> Result<(), SceneError> {
        save_document(&self.path, root)
    }

    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|meta| meta.modified()).ok()
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

pub fn parse_document(text: &str, path: &Path) -> Result<SceneNode, SceneError> {
    serde_json::from_str(text).map_err(|source| SceneError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn encode_document(root: &SceneNode) -> Result<String, SceneError> {
    let mut text = serde_json::to_string_pretty(root)?;
    text.push('\n');
    Ok(text)
}

pub fn load_document(path: &Path) -> Result<SceneNode, SceneError> {
    let text = fs::read_to_string(path).map_err(|source| SceneError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&text, path)
}

/// Writes the whole document, replacing the file through a sibling temp file so a
/// concurrent reader never sees a half-written scene.
pub fn save_document(path: &Path, root: &SceneNode) -> Result<(), SceneError> {
    let text = encode_document(root)?;
    let write_error = |source| SceneError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, text).map_err(write_error)?;
    fs::rename(&staging, path).map_err(write_error)
}

#[derive(Resource, Clone)]
pub struct SceneStoreHandle(Arc<dyn SceneStore>);

impl SceneStoreHandle {
    pub fn new<S: SceneStore>(store: S) -> Self {
        Self(Arc::new(store))
    }

    pub fn store(&self) -> &dyn SceneStore {
        self.0.as_ref()
    }
}

/// Saves in flight on the IO task pool. At most one runs at a time since every save
/// stages through the same sibling file.
#[derive(Resource, Default)]
pub struct PendingSaves {
    tasks: Vec<Task<Result<(), SceneError>>>,
}

impl PendingSaves {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Snapshot of the document queued for persistence by the mutation step.
#[derive(Resource, Default)]
pub struct SaveRequest(pub Option<SceneNode>);

#[derive(Resource)]
pub struct HotReloadState {
    timer: Timer,
    last_modified: Option<SystemTime>,
}

impl HotReloadState {
    pub fn new(interval_secs: f32) -> Self {
        Self {
            timer: Timer::from_seconds(interval_secs.max(0.1), TimerMode::Repeating),
            last_modified: None,
        }
    }
}

/// Reads the scene once at startup. A missing or malformed document leaves the scene empty.
pub fn load_initial_scene(
    handle: Res<SceneStoreHandle>,
    mut document: ResMut<SceneDocument>,
    mut reload: ResMut<HotReloadState>,
) {
    reload.last_modified = handle.store().modified();
    match handle.store().load() {
        Ok(root) => {
            info!(
                "Loaded scene '{}' with {} nodes from {}",
                root.label(),
                1 + root.descendant_count(),
                handle.store().location()
            );
            document.replace(Some(root));
        }
        Err(error) => {
            error!("{}; starting with an empty scene", error);
            document.replace(None);
        }
    }
}

pub fn dispatch_saves(
    handle: Res<SceneStoreHandle>,
    mut request: ResMut<SaveRequest>,
    mut pending: ResMut<PendingSaves>,
) {
    // the newest snapshot waits in the request until the running save lands
    if !pending.is_empty() {
        return;
    }
    let Some(root) = request.0.take() else {
        return;
    };

    let store = Arc::clone(&handle.0);
    let task = IoTaskPool::get().spawn(async move { store.save(&root) });
    pending.tasks.push(task);
}

pub fn poll_saves(
    handle: Res<SceneStoreHandle>,
    mut pending: ResMut<PendingSaves>,
    mut reload: ResMut<HotReloadState>,
) {
    let mut finished = false;
    pending.tasks.retain_mut(|task| {
        match future::block_on(future::poll_once(task)) {
            Some(Ok(())) => {
                finished = true;
                false
            }
            Some(Err(error)) => {
                error!("{}", error);
                false
            }
            None => true,
        }
    });

    if finished {
        debug!("Saved scene to {}", handle.store().location());
        // our own write must not look like an external edit
        reload.last_modified = handle.store().modified();
    }
}

/// Re-reads the document when the file changes on disk. Content equal to the current
/// document is ignored; a malformed edit keeps the current scene.
pub fn watch_scene_file(
    time: Res<Time>,
    config: Res<SandboxConfig>,
    handle: Res<SceneStoreHandle>,
    pending: Res<PendingSaves>,
    mut reload: ResMut<HotReloadState>,
    mut document: ResMut<SceneDocument>,
) {
    if !config.hot_reload {
        return;
    }
    reload.timer.tick(time.delta());
    if !reload.timer.just_finished() || !pending.is_empty() {
        return;
    }

    let modified = handle.store().modified();
    if modified.is_none() || modified == reload.last_modified {
        return;
    }
    reload.last_modified = modified;

    match handle.store().load() {
        Ok(root) => {
            if document.root() == Some(&root) {
                return;
            }
            info!("Scene file changed, reloading '{}'", root.label());
            document.replace(Some(root));
        }
        Err(error) => warn!("{}; keeping the current scene", error),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("solar-sandbox-{}-{}.json", name, std::process::id()))
    }

    fn sample() -> SceneNode {
        serde_json::from_str(
            r#"{ "name": "Sun", "type": "star", "radius": 5, "orbit_radius": 0,
                 "orbit_speed": 0, "rotation_speed": 1, "notes": { "author": "me" },
                 "children": [ { "name": "Mars", "type": "planet", "radius": 0.5,
                   "orbit_radius": 15, "orbit_speed": 24, "rotation_speed": 40 } ] }"#,
        )
        .unwrap()
    }

    #[test]
    fn save_then_load_preserves_document() {
        let path = temp_path("roundtrip");
        let store = DiskSceneStore::new(&path);
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
        assert!(store.modified().is_some());
        assert!(!path.with_extension("json.tmp").exists());
        fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let store = DiskSceneStore::new(temp_path("absent"));
        assert!(matches!(store.load(), Err(SceneError::Read { .. })));
        assert!(store.modified().is_none());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let path = temp_path("malformed");
        fs::write(&path, "{ \"name\": ").unwrap();
        assert!(matches!(load_document(&path), Err(SceneError::Parse { .. })));
        fs::remove_file(path).ok();
    }

    #[test]
    fn encoded_document_is_pretty_printed() {
        let text = encode_document(&sample()).unwrap();
        assert!(text.starts_with("{\n  \"name\": \"Sun\""));
        assert!(text.contains("\"author\": \"me\""));
        assert!(text.ends_with("}\n"));
    }

    fn renamed(name: &str) -> SceneNode {
        SceneNode {
            name: Some(name.to_string()),
            ..sample()
        }
    }

    fn app(path: &Path, document: Option<SceneNode>) -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(SandboxConfig {
                hot_reload: true,
                ..default()
            })
            .insert_resource(SceneStoreHandle::new(DiskSceneStore::new(path)))
            .insert_resource(SceneDocument::new(document))
            .insert_resource(HotReloadState::new(1.0))
            .init_resource::<PendingSaves>()
            .init_resource::<SaveRequest>();
        app
    }

    /// Makes the next `watch_scene_file` run check the file regardless of frame time.
    fn arm_reload_timer(app: &mut App) {
        let mut reload = app.world_mut().resource_mut::<HotReloadState>();
        let duration = reload.timer.duration();
        reload.timer.set_elapsed(duration);
    }

    fn revision(app: &App) -> u64 {
        app.world().resource::<SceneDocument>().revision()
    }

    #[test]
    fn changed_file_replaces_the_document() {
        let path = temp_path("watch-changed");
        DiskSceneStore::new(&path).save(&renamed("Sol")).unwrap();
        let mut app = app(&path, Some(sample()));
        app.add_systems(Update, watch_scene_file);

        arm_reload_timer(&mut app);
        app.update();

        let document = app.world().resource::<SceneDocument>();
        assert_eq!(document.root(), Some(&renamed("Sol")));
        assert_eq!(document.revision(), 1);
        assert!(app.world().resource::<HotReloadState>().last_modified.is_some());
        fs::remove_file(path).ok();
    }

    #[test]
    fn unchanged_content_is_not_reloaded() {
        let path = temp_path("watch-equal");
        DiskSceneStore::new(&path).save(&sample()).unwrap();
        let mut app = app(&path, Some(sample()));
        app.add_systems(Update, watch_scene_file);

        arm_reload_timer(&mut app);
        app.update();

        assert_eq!(revision(&app), 0);
        assert_eq!(
            app.world().resource::<HotReloadState>().last_modified,
            DiskSceneStore::new(&path).modified()
        );
        fs::remove_file(path).ok();
    }

    #[test]
    fn malformed_edit_keeps_the_current_scene() {
        let path = temp_path("watch-malformed");
        fs::write(&path, "{ \"name\": ").unwrap();
        let mut app = app(&path, Some(sample()));
        app.add_systems(Update, watch_scene_file);

        arm_reload_timer(&mut app);
        app.update();

        let document = app.world().resource::<SceneDocument>();
        assert_eq!(document.root(), Some(&sample()));
        assert_eq!(document.revision(), 0);
        fs::remove_file(path).ok();
    }

    #[test]
    fn newer_save_waits_for_the_one_in_flight() {
        let path = temp_path("single-flight");
        let mut app = app(&path, None);
        app.add_systems(Update, dispatch_saves);

        app.world_mut().resource_mut::<SaveRequest>().0 = Some(renamed("First"));
        app.update();
        app.world_mut().resource_mut::<SaveRequest>().0 = Some(renamed("Second"));
        app.update();

        assert_eq!(app.world().resource::<PendingSaves>().tasks.len(), 1);
        assert_eq!(
            app.world().resource::<SaveRequest>().0,
            Some(renamed("Second"))
        );

        let task = app.world_mut().resource_mut::<PendingSaves>().tasks.remove(0);
        future::block_on(task).unwrap();
        app.update();

        let task = app.world_mut().resource_mut::<PendingSaves>().tasks.remove(0);
        future::block_on(task).unwrap();
        assert!(app.world().resource::<SaveRequest>().0.is_none());
        assert_eq!(load_document(&path).unwrap(), renamed("Second"));
        fs::remove_file(path).ok();
    }

    #[test]
    fn own_save_is_not_mistaken_for_an_external_edit() {
        let path = temp_path("own-save");
        let mut app = app(&path, Some(sample()));
        app.add_systems(Update, (dispatch_saves, poll_saves, watch_scene_file).chain());

        app.world_mut().resource_mut::<SaveRequest>().0 = Some(sample());
        for _ in 0..400 {
            app.update();
            let idle = app.world().resource::<PendingSaves>().is_empty()
                && app.world().resource::<SaveRequest>().0.is_none();
            if idle {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        let store = DiskSceneStore::new(&path);
        assert!(app.world().resource::<PendingSaves>().is_empty());
        assert_eq!(store.load().unwrap(), sample());
        assert!(store.modified().is_some());
        assert_eq!(
            app.world().resource::<HotReloadState>().last_modified,
            store.modified()
        );

        arm_reload_timer(&mut app);
        app.update();
        assert_eq!(revision(&app), 0);
        fs::remove_file(path).ok();
    }
}
