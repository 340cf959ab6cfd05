use std::sync::Arc;

use cgmath::{InnerSpace, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        model::{Material, Vertex},
        texture::{Texture, create_texel_sampler},
    },
    scene::{ProgramError, ProgramFactory, ShaderProgram, UniformValue, uniforms},
};

/// CPU-side copy of the Phong program's uniform block.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PhongUniform {
    model: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    light_pos: [f32; 3],
    ambient_k: f32,
    view_pos: [f32; 3],
    diffusion_k: f32,
    specular_k: f32,
    normal_sign: f32,
    // Uniform blocks are sized in multiples of 16 bytes
    _padding: [f32; 2],
}

impl Default for PhongUniform {
    fn default() -> Self {
        let identity = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        Self {
            model: identity,
            view: identity,
            projection: identity,
            light_pos: [0.0; 3],
            ambient_k: 0.0,
            view_pos: [0.0; 3],
            diffusion_k: 0.0,
            specular_k: 0.0,
            normal_sign: -1.0,
            _padding: [0.0; 2],
        }
    }
}

impl PhongUniform {
    /// Store `value` under the uniform called `name`.
    pub fn assign(&mut self, name: &str, value: &UniformValue) -> Result<(), ProgramError> {
        let mismatch = |expected: &'static str| ProgramError::TypeMismatch {
            name: name.to_string(),
            expected,
            actual: value.kind(),
        };
        match (name, value) {
            (uniforms::MODEL, UniformValue::Mat4(m)) => self.model = (*m).into(),
            (uniforms::VIEW, UniformValue::Mat4(m)) => self.view = (*m).into(),
            (uniforms::PROJECTION, UniformValue::Mat4(m)) => self.projection = (*m).into(),
            (uniforms::MODEL | uniforms::VIEW | uniforms::PROJECTION, _) => {
                return Err(mismatch("mat4"));
            }
            (uniforms::LIGHT_POS, UniformValue::Vec3(v)) => self.light_pos = *v,
            (uniforms::VIEW_POS, UniformValue::Vec3(v)) => self.view_pos = *v,
            (uniforms::LIGHT_POS | uniforms::VIEW_POS, _) => return Err(mismatch("vec3")),
            (uniforms::AMBIENT_K, UniformValue::Scalar(k)) => self.ambient_k = *k,
            (uniforms::DIFFUSION_K, UniformValue::Scalar(k)) => self.diffusion_k = *k,
            (uniforms::SPECULAR_K, UniformValue::Scalar(k)) => self.specular_k = *k,
            (uniforms::NORMAL_SIGN, UniformValue::Scalar(s)) => self.normal_sign = *s,
            (
                uniforms::AMBIENT_K
                | uniforms::DIFFUSION_K
                | uniforms::SPECULAR_K
                | uniforms::NORMAL_SIGN,
                _,
            ) => return Err(mismatch("scalar")),
            _ => return Err(ProgramError::UnknownUniform(name.to_string())),
        }
        Ok(())
    }
}

pub fn mk_uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("phong_uniform_layout"),
    })
}

pub fn mk_texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("phong_texture_layout"),
    })
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    uniform_layout: &wgpu::BindGroupLayout,
    texture_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Phong Pipeline Layout"),
        bind_group_layouts: &[uniform_layout, texture_layout],
        push_constant_ranges: &[],
    });

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Phong Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("phong.wgsl").into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Phong Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::desc()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // models may arrive with either winding
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

/// Creates one [`PhongProgram`] per registered model. All programs share the
/// pipeline and bind group layouts.
pub struct PhongPrograms {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: Arc<wgpu::RenderPipeline>,
    uniform_layout: Arc<wgpu::BindGroupLayout>,
    texture_layout: Arc<wgpu::BindGroupLayout>,
}

impl PhongPrograms {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, color_format: wgpu::TextureFormat) -> Self {
        let uniform_layout = mk_uniform_layout(device);
        let texture_layout = mk_texture_layout(device);
        let pipeline = mk_render_pipeline(device, color_format, &uniform_layout, &texture_layout);
        Self {
            // Device and Queue are internally reference counted
            device: device.clone(),
            queue: queue.clone(),
            pipeline: Arc::new(pipeline),
            uniform_layout: Arc::new(uniform_layout),
            texture_layout: Arc::new(texture_layout),
        }
    }
}

impl ProgramFactory for PhongPrograms {
    type Program = PhongProgram;

    fn create_program(&self) -> PhongProgram {
        let uniform = PhongUniform::default();
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Phong Uniform Buffer"),
                contents: bytemuck::cast_slice(&[uniform]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("phong_uniform_bind_group"),
        });

        PhongProgram {
            device: self.device.clone(),
            queue: self.queue.clone(),
            pipeline: self.pipeline.clone(),
            texture_layout: self.texture_layout.clone(),
            uniform,
            dirty: false,
            uniform_buffer,
            uniform_bind_group,
            texture: None,
            vertex_buffer: None,
            index_buffer: None,
        }
    }
}

/// A Phong program bound to a single model's buffers and texture.
pub struct PhongProgram {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: Arc<wgpu::RenderPipeline>,
    texture_layout: Arc<wgpu::BindGroupLayout>,
    uniform: PhongUniform,
    dirty: bool,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture: Option<(Texture, wgpu::BindGroup)>,
    vertex_buffer: Option<(wgpu::Buffer, u32)>,
    index_buffer: Option<(wgpu::Buffer, u32)>,
}

impl PhongProgram {
    fn bind_texture(&self, texture: &Texture) -> wgpu::BindGroup {
        let sampler = texture
            .sampler
            .clone()
            .unwrap_or_else(|| create_texel_sampler(&self.device));
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
            label: Some("phong_texture_bind_group"),
        })
    }
}

impl ShaderProgram for PhongProgram {
    type Target<'t> = wgpu::RenderPass<'t>;

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), ProgramError> {
        match (name, &value) {
            (uniforms::TEXTURE, UniformValue::Texture(img)) => {
                let texture =
                    Texture::from_rgb_image(&self.device, &self.queue, img, Some("model texture"));
                let bind_group = self.bind_texture(&texture);
                self.texture = Some((texture, bind_group));
                Ok(())
            }
            (uniforms::TEXTURE, other) => Err(ProgramError::TypeMismatch {
                name: name.to_string(),
                expected: "texture",
                actual: other.kind(),
            }),
            _ => {
                self.uniform.assign(name, &value)?;
                self.dirty = true;
                Ok(())
            }
        }
    }

    fn set_geometry(&mut self, vertices: &[Vertex], indices: Option<&[u32]>) {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Model Vertex Buffer"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.vertex_buffer = Some((vertex_buffer, vertices.len() as u32));

        self.index_buffer = indices.map(|indices| {
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Model Index Buffer"),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
            (buffer, indices.len() as u32)
        });
    }

    fn draw_triangles(&mut self, pass: &mut wgpu::RenderPass<'_>) -> Result<(), ProgramError> {
        let (vertex_buffer, vertex_count) =
            self.vertex_buffer.as_ref().ok_or(ProgramError::MissingGeometry)?;
        let (_, texture_bind_group) = self.texture.as_ref().ok_or(ProgramError::MissingTexture)?;

        // Staged writes land before the command buffer holding this pass runs
        if self.dirty {
            self.queue
                .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniform]));
            self.dirty = false;
        }

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, texture_bind_group, &[]);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        match &self.index_buffer {
            Some((index_buffer, index_count)) => {
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..*index_count, 0, 0..1);
            }
            None => pass.draw(0..*vertex_count, 0..1),
        }
        Ok(())
    }
}

/// Light factor the fragment stage applies to the texture colour at a point,
/// computed on the CPU. Used to check lighting conventions without a GPU.
pub fn phong_intensity(
    material: Material,
    light_pos: Vector3<f32>,
    view_pos: Vector3<f32>,
    frag_pos: Vector3<f32>,
    normal: Vector3<f32>,
    normal_sign: f32,
) -> f32 {
    let mut light_k = material.ambient_k;
    let normal_length = normal.magnitude();
    if normal_length > 0.0 {
        let light_dir = (light_pos - frag_pos).normalize();
        let view_dir = (view_pos - frag_pos).normalize();
        let normal_dir = normal * (normal_sign / normal_length);
        let incident = -light_dir;
        let reflect_dir = incident - normal_dir * (2.0 * normal_dir.dot(incident));

        let diffuse = light_dir.dot(normal_dir).max(0.0) * material.diffusion_k;
        let specular = view_dir.dot(reflect_dir).max(0.0).powi(16) * material.specular_k;
        light_k += diffuse + specular;
    }
    light_k
}
