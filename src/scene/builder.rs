use bevy::prelude::*;

use crate::celestial::body::{BodyKind, CelestialBody};
use crate::celestial::time::SimulationContext;
use crate::scene::error::SpecError;
use crate::scene::node::SceneNode;

/// Index of a body inside one build of the [`SolarSystem`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

impl BodyId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct BodyEntry {
    pub id: BodyId,
    pub parent: Option<BodyId>,
    pub depth: u32,
    pub body: CelestialBody,
}

/// A node that was skipped during a build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildDiagnostic {
    /// Slash-separated path of names from the root, e.g. `Sun/Earth/children[1]`.
    pub path: String,
    pub error: SpecError,
    /// Nodes below the skipped one that were dropped with it.
    pub dropped_descendants: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub generation: u64,
    pub built: usize,
    pub disposed: usize,
    pub diagnostics: Vec<BuildDiagnostic>,
}

impl BuildReport {
    pub fn skipped(&self) -> usize {
        self.diagnostics
            .iter()
            .map(|diagnostic| 1 + diagnostic.dropped_descendants)
            .sum()
    }
}

/// The live instance tree: every built body in parent-first, depth-first order.
#[derive(Resource, Debug, Default)]
pub struct SolarSystem {
    generation: u64,
    bodies: Vec<BodyEntry>,
}

impl SolarSystem {
    /// Builds generation 1 from a root node.
    pub fn build(root: &SceneNode) -> (Self, BuildReport) {
        let mut system = Self::default();
        let report = system.rebuild(Some(root));
        (system, report)
    }

    /// Disposes every current body and builds a fresh generation from `root`.
    /// `None` leaves an empty scene.
    pub fn rebuild(&mut self, root: Option<&SceneNode>) -> BuildReport {
        let disposed = self.dispose_all();
        self.bodies = Vec::new();
        self.generation += 1;

        let mut report = BuildReport {
            generation: self.generation,
            disposed,
            ..Default::default()
        };

        if let Some(root) = root {
            let path = root.label().to_string();
            self.instantiate(root, None, 0, path, &mut report);
        }
        report.built = self.bodies.len();
        report
    }

    fn instantiate(
        &mut self,
        node: &SceneNode,
        parent: Option<BodyId>,
        depth: u32,
        path: String,
        report: &mut BuildReport,
    ) {
        let spec = match node.validate() {
            Ok(spec) => spec,
            Err(error) => {
                report.diagnostics.push(BuildDiagnostic {
                    path,
                    error,
                    dropped_descendants: node.descendant_count(),
                });
                return;
            }
        };

        let id = BodyId(self.bodies.len() as u32);
        debug!("Constructing {} '{}' as {:?}", spec.kind.as_str(), spec.name, id);
        self.bodies.push(BodyEntry {
            id,
            parent,
            depth,
            body: CelestialBody::new(spec),
        });

        for (index, child) in node.children.iter().enumerate() {
            let child_path = match child.name.as_deref() {
                Some(name) if !name.trim().is_empty() => format!("{path}/{name}"),
                _ => format!("{path}/children[{index}]"),
            };
            self.instantiate(child, Some(id), depth + 1, child_path, report);
        }
    }

    /// Marks every body disposed and returns how many were live.
    pub fn dispose_all(&mut self) -> usize {
        let mut disposed = 0;
        for entry in &mut self.bodies {
            if entry.body.is_active() {
                entry.body.dispose();
                disposed += 1;
            }
        }
        disposed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn get(&self, id: BodyId) -> Option<&BodyEntry> {
        self.bodies.get(id.index())
    }

    pub fn body(&self, id: BodyId) -> Option<&CelestialBody> {
        self.get(id).map(|entry| &entry.body)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BodyEntry> {
        self.bodies.iter()
    }

    pub fn children_of(&self, parent: BodyId) -> impl Iterator<Item = &BodyEntry> {
        self.bodies
            .iter()
            .filter(move |entry| entry.parent == Some(parent))
    }

    /// First body with the given name, in build order.
    pub fn find_by_name(&self, name: &str) -> Option<BodyId> {
        self.bodies
            .iter()
            .find(|entry| entry.body.name() == name)
            .map(|entry| entry.id)
    }

    /// The body the light follows under [`LightAnchor::Star`](crate::celestial::time::LightAnchor).
    pub fn first_star(&self) -> Option<BodyId> {
        self.bodies
            .iter()
            .find(|entry| entry.body.kind() == BodyKind::Star)
            .map(|entry| entry.id)
    }

    /// Advances every body in construction order.
    pub fn advance_all(&mut self, dt: f32, context: &SimulationContext) {
        for entry in &mut self.bodies {
            entry.body.advance(dt, context);
        }
    }

    /// Position of a body in the orbital frame of the root, composed up the parent chain.
    pub fn world_position(&self, id: BodyId) -> Option<Vec3> {
        let mut entry = self.get(id)?;
        let mut position = entry.body.position();
        while let Some(parent) = entry.parent {
            entry = self.get(parent)?;
            position += entry.body.position();
        }
        Some(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::celestial::body::Lifecycle;

    fn scene() -> SceneNode {
        serde_json::from_str(
            r#"{
                "name": "Sun", "type": "star", "radius": 5,
                "orbit_radius": 0, "orbit_speed": 0, "rotation_speed": 2,
                "children": [
                    { "name": "Mercury", "type": "planet", "radius": 0.4,
                      "orbit_radius": 8, "orbit_speed": 47, "rotation_speed": 1 },
                    { "name": "Earth", "type": "planet", "radius": 1,
                      "orbit_radius": 20, "orbit_speed": 30, "rotation_speed": 50,
                      "children": [
                          { "name": "Moon", "type": "moon", "radius": 0.27,
                            "orbit_radius": 2.5, "orbit_speed": 60, "rotation_speed": 10 }
                      ] },
                    { "name": "Broken", "type": "planet", "radius": -1,
                      "orbit_radius": 30, "orbit_speed": 10, "rotation_speed": 1,
                      "children": [
                          { "name": "Lost", "type": "moon", "radius": 0.1,
                            "orbit_radius": 1, "orbit_speed": 1, "rotation_speed": 1 }
                      ] },
                    { "type": "planet", "radius": 1, "orbit_radius": 40,
                      "orbit_speed": 5, "rotation_speed": 1 },
                    { "name": "Mars", "type": "planet", "radius": 0.53,
                      "orbit_radius": 30, "orbit_speed": 24, "rotation_speed": 48 }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_parent_first_in_declared_order() {
        let (system, report) = SolarSystem::build(&scene());
        let names: Vec<_> = system.iter().map(|e| e.body.name().to_string()).collect();
        assert_eq!(names, ["Sun", "Mercury", "Earth", "Moon", "Mars"]);
        assert_eq!(report.built, 5);

        let moon = system.find_by_name("Moon").unwrap();
        let earth = system.find_by_name("Earth").unwrap();
        assert_eq!(system.get(moon).unwrap().parent, Some(earth));
        assert_eq!(system.get(moon).unwrap().depth, 2);
        assert_eq!(system.children_of(earth).count(), 1);
    }

    #[test]
    fn malformed_nodes_are_skipped_with_their_subtree() {
        let (system, report) = SolarSystem::build(&scene());
        assert!(system.find_by_name("Broken").is_none());
        assert!(system.find_by_name("Lost").is_none());
        assert!(system.find_by_name("Mars").is_some());

        assert_eq!(report.diagnostics.len(), 2);
        let broken = &report.diagnostics[0];
        assert_eq!(broken.path, "Sun/Broken");
        assert_eq!(broken.dropped_descendants, 1);
        assert!(matches!(
            broken.error,
            SpecError::OutOfRange { field: "radius", .. }
        ));
        let unnamed = &report.diagnostics[1];
        assert_eq!(unnamed.path, "Sun/children[3]");
        assert_eq!(unnamed.error, SpecError::MissingField { field: "name" });
        assert_eq!(report.skipped(), 3);
    }

    #[test]
    fn wrong_typed_field_skips_only_that_node() {
        let root: SceneNode = serde_json::from_str(
            r#"{
                "name": "Sun", "type": "star", "radius": 5,
                "orbit_radius": 0, "orbit_speed": 0, "rotation_speed": 2,
                "children": [
                    { "name": "Earth", "type": "planet", "radius": 1,
                      "orbit_radius": 20, "orbit_speed": 30, "rotation_speed": 50 },
                    { "name": "Blob", "type": "planet", "radius": "big",
                      "orbit_radius": 30, "orbit_speed": "fast", "rotation_speed": 1,
                      "children": [
                          { "name": "Speck", "type": "moon", "radius": 0.1,
                            "orbit_radius": 1, "orbit_speed": 1, "rotation_speed": 1 }
                      ] },
                    { "name": "Mars", "type": "planet", "radius": 0.53,
                      "orbit_radius": 30, "orbit_speed": 24, "rotation_speed": 48 }
                ]
            }"#,
        )
        .unwrap();

        let (system, report) = SolarSystem::build(&root);
        let names: Vec<_> = system.iter().map(|e| e.body.name().to_string()).collect();
        assert_eq!(names, ["Sun", "Earth", "Mars"]);

        assert_eq!(report.diagnostics.len(), 1);
        let blob = &report.diagnostics[0];
        assert_eq!(blob.path, "Sun/Blob");
        assert_eq!(blob.dropped_descendants, 1);
        assert_eq!(
            blob.error,
            SpecError::InvalidType {
                field: "radius".to_string()
            }
        );
    }

    #[test]
    fn rebuild_bumps_generation_and_disposes() {
        let (mut system, first) = SolarSystem::build(&scene());
        assert_eq!(first.generation, 1);
        assert_eq!(first.disposed, 0);

        let second = system.rebuild(Some(&scene()));
        assert_eq!(second.generation, 2);
        assert_eq!(second.disposed, 5);
        assert!(system.iter().all(|e| e.body.lifecycle() == Lifecycle::Active));

        let empty = system.rebuild(None);
        assert_eq!(empty.generation, 3);
        assert!(system.is_empty());
        assert_eq!(system.dispose_all(), 0);
    }

    #[test]
    fn world_position_composes_parent_chain() {
        let (mut system, _) = SolarSystem::build(&scene());
        system.advance_all(1.5, &SimulationContext::default());

        let earth = system.find_by_name("Earth").unwrap();
        let moon = system.find_by_name("Moon").unwrap();
        let expected = system.body(earth).unwrap().position() + system.body(moon).unwrap().position();
        let actual = system.world_position(moon).unwrap();
        assert!(actual.distance(expected) < 1e-5);
        assert_eq!(system.world_position(BodyId(99)), None);
    }

    #[test]
    fn first_star_is_the_root() {
        let (system, _) = SolarSystem::build(&scene());
        assert_eq!(system.first_star(), Some(BodyId(0)));
    }
}
