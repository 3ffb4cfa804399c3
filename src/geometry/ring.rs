use std::f32::consts::PI;

use super::MeshData;

/// Flat annulus in the XY plane, facing +Z.
///
/// UVs map onto a disc so a radial ring texture lines up: the outer edge touches the
/// texture border and the inner edge sits at `inner / outer` of it.
pub fn ring(inner_radius: f32, outer_radius: f32, segments: u32) -> MeshData {
    let segments = segments.max(3);
    let outer_radius = outer_radius.max(f32::EPSILON);
    let inner_radius = inner_radius.clamp(0.0, outer_radius);
    let ratio = inner_radius / outer_radius;

    let vertex_count = ((segments + 1) * 2) as usize;
    let mut positions = Vec::with_capacity(vertex_count);
    let mut uvs = Vec::with_capacity(vertex_count);

    for i in 0..=segments {
        let angle = 2.0 * PI * i as f32 / segments as f32;
        let (sin, cos) = angle.sin_cos();

        positions.push([inner_radius * cos, inner_radius * sin, 0.0]);
        uvs.push([cos * 0.5 * ratio + 0.5, sin * 0.5 * ratio + 0.5]);

        positions.push([outer_radius * cos, outer_radius * sin, 0.0]);
        uvs.push([cos * 0.5 + 0.5, sin * 0.5 + 0.5]);
    }

    let mut indices = Vec::with_capacity((segments * 6) as usize);
    for i in 0..segments {
        let inner = i * 2;
        let outer = inner + 1;
        let next_inner = inner + 2;
        let next_outer = inner + 3;
        indices.extend_from_slice(&[inner, outer, next_outer, inner, next_outer, next_inner]);
    }

    MeshData {
        normals: Some(vec![[0.0, 0.0, 1.0]; positions.len()]),
        positions,
        uvs,
        indices,
    }
}
