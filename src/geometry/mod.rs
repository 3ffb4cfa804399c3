//! Procedural meshes backing the celestial bodies.
//!
//! Generators return plain [`MeshData`] so they can be compared and tested without a
//! renderer; [`MeshData::into_mesh`] hands them over to Bevy.

pub mod ring;
pub mod sphere;

use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;

pub use ring::ring;
pub use sphere::{skydome, uv_sphere};

/// Raw vertex and index buffers for a triangle list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    /// `None` for unlit geometry such as the skydome.
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn into_mesh(self) -> Mesh {
        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
        );

        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.positions);
        if let Some(normals) = self.normals {
            mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
        }
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, self.uvs);
        mesh.insert_indices(Indices::U32(self.indices));

        mesh
    }
}

/// Line-strip mesh through `points`, used for the debug orbit paths.
pub fn line_strip_mesh(points: &[Vec3]) -> Mesh {
    let positions: Vec<[f32; 3]> = points.iter().map(|p| p.to_array()).collect();

    let mut mesh = Mesh::new(
        PrimitiveTopology::LineStrip,
        RenderAssetUsages::RENDER_WORLD,
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_mesh_keeps_buffers() {
        let data = uv_sphere(1.0, 4, 8);
        let vertices = data.vertex_count();
        let mesh = data.into_mesh();
        assert_eq!(mesh.count_vertices(), vertices);
        assert!(mesh.attribute(Mesh::ATTRIBUTE_NORMAL).is_some());
        assert_eq!(mesh.indices().map(|i| i.len()), Some(2 * 4 * 8 * 3));
    }

    #[test]
    fn skydome_mesh_has_no_normals() {
        let mesh = skydome(100.0, 4, 4).into_mesh();
        assert!(mesh.attribute(Mesh::ATTRIBUTE_NORMAL).is_none());
        assert!(mesh.attribute(Mesh::ATTRIBUTE_UV_0).is_some());
    }
}
