//! Renderable model: immutable geometry, material and texture plus a mutable
//! transform stack.
//!
//! A [`Model`] is built once from [`MeshData`]. Construction validates the
//! geometry and derives vertex normals when the caller did not supply them.
//! After that the only thing that changes is [`Model::transforms`], which
//! the render loop replaces wholesale every frame.

use std::sync::Arc;

use cgmath::{Matrix4, SquareMatrix};
use image::{Rgb, RgbImage};
use thiserror::Error;

use crate::resources::mesh::compute_normals;

/// A single vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub texcoord: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Coefficients of the Phong reflection equation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Material {
    pub ambient_k: f32,
    pub diffusion_k: f32,
    pub specular_k: f32,
}

impl Material {
    pub fn new(ambient_k: f32, diffusion_k: f32, specular_k: f32) -> Self {
        Self {
            ambient_k,
            diffusion_k,
            specular_k,
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        for (name, value) in [
            ("ambient_k", self.ambient_k),
            ("diffusion_k", self.diffusion_k),
            ("specular_k", self.specular_k),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidMaterial { name, value });
            }
        }
        Ok(())
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(0.4, 0.8, 0.6)
    }
}

/// Raw mesh input. Only `positions` is mandatory; `texcoords` and `normals`
/// are reused as-is when present and must then have one entry per position.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub texcoords: Option<Vec<[f32; 2]>>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub indices: Option<Vec<u32>>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("mesh has no vertex positions")]
    NoPositions,
    #[error("attribute `{attribute}` has {actual} entries but there are {expected} positions")]
    AttributeLength {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("number of indices ({0}) is not a multiple of 3")]
    IndexCount(usize),
    #[error("index {index} is out of range for {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: usize },
    #[error("non-indexed mesh has {0} vertices which is not a multiple of 3")]
    VertexCount(usize),
    #[error("material coefficient `{name}` must be finite and non-negative, got {value}")]
    InvalidMaterial { name: &'static str, value: f32 },
}

/// Geometry, material and texture bound together with a transform stack.
#[derive(Clone, Debug)]
pub struct Model {
    vertices: Vec<Vertex>,
    indices: Option<Vec<u32>>,
    texture: Arc<RgbImage>,
    material: Material,
    /// Transforms applied to the mesh, earliest first. The composed model
    /// matrix is `T_last * ... * T_first`. Callers replace the contents
    /// freely; nothing here validates the matrices.
    pub transforms: Vec<Matrix4<f32>>,
}

impl Model {
    pub fn new(
        mesh: MeshData,
        texture: Option<Arc<RgbImage>>,
        material: Material,
    ) -> Result<Self, ModelError> {
        material.validate()?;
        let MeshData {
            positions,
            texcoords,
            normals,
            indices,
        } = mesh;

        if positions.is_empty() {
            return Err(ModelError::NoPositions);
        }
        let count = positions.len();
        check_len("texcoord", count, texcoords.as_ref().map(Vec::len))?;
        check_len("normal", count, normals.as_ref().map(Vec::len))?;

        match &indices {
            Some(indices) => {
                if indices.len() % 3 != 0 {
                    return Err(ModelError::IndexCount(indices.len()));
                }
                if let Some(&index) = indices.iter().find(|&&i| i as usize >= count) {
                    return Err(ModelError::IndexOutOfRange {
                        index,
                        vertices: count,
                    });
                }
            }
            None if count % 3 != 0 => return Err(ModelError::VertexCount(count)),
            None => (),
        }

        let normals = match normals {
            Some(normals) => normals,
            None => compute_normals(&positions, indices.as_deref()),
        };
        let texcoords = texcoords.unwrap_or_else(|| vec![[0.0, 0.0]; count]);

        let vertices = positions
            .into_iter()
            .zip(texcoords)
            .zip(normals)
            .map(|((position, texcoord), normal)| Vertex {
                position,
                texcoord,
                normal,
            })
            .collect();

        Ok(Self {
            vertices,
            indices,
            texture: texture.unwrap_or_else(|| Arc::new(fallback_texture())),
            material,
            transforms: Vec::new(),
        })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indexes(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    pub fn texture(&self) -> &Arc<RgbImage> {
        &self.texture
    }

    pub fn material(&self) -> Material {
        self.material
    }

    /// Compose the transform stack into a single model-to-world matrix.
    /// An empty stack yields the identity.
    pub fn get_model_matrix(&self) -> Matrix4<f32> {
        self.transforms
            .iter()
            .fold(Matrix4::identity(), |acc, transform| *transform * acc)
    }
}

fn check_len(
    attribute: &'static str,
    expected: usize,
    actual: Option<usize>,
) -> Result<(), ModelError> {
    match actual {
        Some(actual) if actual != expected => Err(ModelError::AttributeLength {
            attribute,
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

/// Plain mid-grey texture used when a model is built without one.
pub fn fallback_texture() -> RgbImage {
    RgbImage::from_pixel(16, 16, Rgb([127, 127, 127]))
}
