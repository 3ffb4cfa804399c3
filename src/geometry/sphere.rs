use std::f32::consts::PI;

use super::MeshData;

/// Lit UV sphere: `(lat_steps + 1) * (long_steps + 1)` vertices, seam column duplicated
/// so the texture wraps cleanly. Triangles wind counter-clockwise seen from outside.
pub fn uv_sphere(radius: f32, lat_steps: u32, long_steps: u32) -> MeshData {
    let lat_steps = lat_steps.max(1);
    let long_steps = long_steps.max(1);

    let mut positions = Vec::with_capacity(((lat_steps + 1) * (long_steps + 1)) as usize);
    let mut normals = Vec::with_capacity(positions.capacity());
    let mut uvs = Vec::with_capacity(positions.capacity());

    for_each_vertex(lat_steps, long_steps, |unit, uv| {
        positions.push([unit[0] * radius, unit[1] * radius, unit[2] * radius]);
        normals.push(unit);
        uvs.push(uv);
    });

    MeshData {
        positions,
        normals: Some(normals),
        uvs,
        indices: grid_indices(lat_steps, long_steps, false),
    }
}

/// Inside-out sphere for the star background. No normals: it is drawn unlit with
/// culling off, and the winding is flipped so the inner face is the front face.
pub fn skydome(radius: f32, lat_steps: u32, long_steps: u32) -> MeshData {
    let lat_steps = lat_steps.max(1);
    let long_steps = long_steps.max(1);

    let mut positions = Vec::with_capacity(((lat_steps + 1) * (long_steps + 1)) as usize);
    let mut uvs = Vec::with_capacity(positions.capacity());

    for_each_vertex(lat_steps, long_steps, |unit, uv| {
        positions.push([unit[0] * radius, unit[1] * radius, unit[2] * radius]);
        uvs.push(uv);
    });

    MeshData {
        positions,
        normals: None,
        uvs,
        indices: grid_indices(lat_steps, long_steps, true),
    }
}

/// Visits the unit-sphere vertex grid pole to pole. phi runs over [0, pi], theta over [0, 2pi].
fn for_each_vertex(lat_steps: u32, long_steps: u32, mut visit: impl FnMut([f32; 3], [f32; 2])) {
    for i in 0..=lat_steps {
        let phi = PI * i as f32 / lat_steps as f32;
        let (sin_phi, cos_phi) = phi.sin_cos();
        for j in 0..=long_steps {
            let theta = 2.0 * PI * j as f32 / long_steps as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let unit = [sin_phi * cos_theta, sin_phi * sin_theta, cos_phi];
            let uv = [theta / (2.0 * PI), 1.0 - phi / PI];
            visit(unit, uv);
        }
    }
}

fn grid_indices(lat_steps: u32, long_steps: u32, inward: bool) -> Vec<u32> {
    let row = long_steps + 1;
    let mut indices = Vec::with_capacity((lat_steps * long_steps * 6) as usize);

    for i in 0..lat_steps {
        for j in 0..long_steps {
            let i0 = i * row + j;
            let i1 = (i + 1) * row + j;
            let i2 = i0 + 1;
            let i3 = i1 + 1;
            if inward {
                indices.extend_from_slice(&[i0, i2, i1, i2, i3, i1]);
            } else {
                indices.extend_from_slice(&[i0, i1, i2, i2, i1, i3]);
            }
        }
    }

    indices
}
