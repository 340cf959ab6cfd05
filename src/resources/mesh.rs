use std::sync::Arc;

use cgmath::{InnerSpace, Vector3, Zero};
use image::{Rgb, RgbImage};

use crate::data_structures::model::{Material, MeshData, Model, ModelError};

/**
 * Derive smooth vertex normals by summing the normals of every triangle a
 * vertex belongs to and normalizing the sum.
 *
 * Triangles come from `indices` in chunks of 3, or from consecutive positions
 * when there is no index buffer. Every face contributes with the same weight
 * regardless of its area. Vertices that end up with a zero sum (degenerate or
 * unreferenced) keep a zero normal.
 *
 * # Panics
 *
 * Every index must be smaller than `positions.len()`. [`Model::new`] checks
 * this before deriving normals.
 */
pub fn compute_normals(positions: &[[f32; 3]], indices: Option<&[u32]>) -> Vec<[f32; 3]> {
    let mut normals = vec![Vector3::<f32>::zero(); positions.len()];

    let sequential: Vec<u32>;
    let indices = match indices {
        Some(indices) => indices,
        None => {
            sequential = (0..positions.len() as u32).collect();
            &sequential
        }
    };

    for c in indices.chunks_exact(3) {
        let pos0: Vector3<f32> = positions[c[0] as usize].into();
        let pos1: Vector3<f32> = positions[c[1] as usize].into();
        let pos2: Vector3<f32> = positions[c[2] as usize].into();

        let face = (pos1 - pos0).cross(pos2 - pos0);
        let length = face.magnitude();
        // Collapsed triangles have no direction to contribute
        if length == 0.0 || !length.is_finite() {
            continue;
        }
        let face = face / length;

        normals[c[0] as usize] += face;
        normals[c[1] as usize] += face;
        normals[c[2] as usize] += face;
    }

    normals
        .into_iter()
        .map(|n| {
            let length = n.magnitude();
            let length = if length == 0.0 { 1.0 } else { length };
            (n / length).into()
        })
        .collect()
}

/// Face colours of the cube, one texel each in a 6x1 strip.
const FACE_COLORS: [[u8; 3]; 6] = [
    [0x1F, 0x77, 0xB4],
    [0xFF, 0x7F, 0x0E],
    [0x2C, 0xA0, 0x2C],
    [0xD6, 0x27, 0x28],
    [0x94, 0x67, 0xBD],
    [0x8C, 0x56, 0x4B],
];

/// Two counter-clockwise (seen from outside) triangles per face, referencing
/// the corners produced by [`cube_corners`].
const FACE_TRIANGLES: [[usize; 6]; 6] = [
    // right (+x)
    [0, 2, 1, 1, 2, 3],
    // front (-z)
    [1, 3, 5, 3, 7, 5],
    // left (-x)
    [5, 7, 4, 4, 7, 6],
    // back (+z)
    [0, 4, 6, 0, 6, 2],
    // top (+y)
    [1, 4, 0, 1, 5, 4],
    // bottom (-y)
    [3, 6, 7, 3, 2, 6],
];

/// The 8 corners of the cube: every combination of +1/-1 on the three axes,
/// with x varying slowest.
pub fn cube_corners() -> [[f32; 3]; 8] {
    let mut corners = [[0.0; 3]; 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        let sign = |bit: usize| if i & bit == 0 { 1.0 } else { -1.0 };
        *corner = [sign(4), sign(2), sign(1)];
    }
    corners
}

/// The texture coordinate that addresses the centre of face `face`'s texel.
fn face_texcoord(face: usize) -> [f32; 2] {
    let n = FACE_COLORS.len() as f32;
    [(face as f32 + 0.5) / n, 0.5]
}

/// Geometry of the unit cube: 24 vertices (4 per face, never shared between
/// faces so every face keeps its own colour and normal) and 36 indices.
/// No normals are supplied; they are derived when the model is built.
pub fn cube_mesh() -> MeshData {
    let corners = cube_corners();
    let mut positions = Vec::with_capacity(24);
    let mut texcoords = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (face, triangles) in FACE_TRIANGLES.iter().enumerate() {
        let mut local: Vec<usize> = Vec::with_capacity(4);
        for &corner in triangles {
            let slot = match local.iter().position(|&c| c == corner) {
                Some(slot) => slot,
                None => {
                    local.push(corner);
                    positions.push(corners[corner]);
                    texcoords.push(face_texcoord(face));
                    local.len() - 1
                }
            };
            indices.push((face * 4 + slot) as u32);
        }
    }

    MeshData {
        positions,
        texcoords: Some(texcoords),
        normals: None,
        indices: Some(indices),
    }
}

/// The 6x1 colour strip sampled by the cube's texture coordinates.
pub fn cube_texture() -> RgbImage {
    let mut texture = RgbImage::new(FACE_COLORS.len() as u32, 1);
    for (x, color) in FACE_COLORS.iter().enumerate() {
        texture.put_pixel(x as u32, 0, Rgb(*color));
    }
    texture
}

pub fn build_cube() -> Result<Model, ModelError> {
    Model::new(
        cube_mesh(),
        Some(Arc::new(cube_texture())),
        Material::new(0.4, 0.6, 2.0),
    )
}
