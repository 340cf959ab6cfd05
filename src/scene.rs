//! Scene: camera, a single point light and the models bound to shader programs.
//!
//! The scene owns one [`ShaderProgram`] per registered [`Model`]. Camera and
//! light uniforms are pushed to every program at the moment they change;
//! the model matrix is the only uniform pushed every frame, right before the
//! draw call of its registration.
//!
//! # Key types
//!
//! - [`UniformValue`] is the tagged value accepted by [`ShaderProgram::set_uniform`]
//! - [`ShaderProgram`] is a compiled GPU program bound to one model
//! - [`ProgramFactory`] allocates fresh programs for [`Scene::register_model`]
//! - [`Scene`] keeps every program in sync with the camera and the light

use std::sync::Arc;

use cgmath::{Deg, Matrix4, Vector3};
use image::RgbImage;
use thiserror::Error;

use crate::data_structures::model::{Model, Vertex};

/// Uniform names understood by the Phong program.
pub mod uniforms {
    pub const MODEL: &str = "u_model";
    pub const VIEW: &str = "u_view";
    pub const PROJECTION: &str = "u_projection";
    pub const VIEW_POS: &str = "u_view_pos";
    pub const LIGHT_POS: &str = "u_light_pos";
    pub const AMBIENT_K: &str = "u_ambient_k";
    pub const DIFFUSION_K: &str = "u_diffusion_k";
    pub const SPECULAR_K: &str = "u_specular_k";
    pub const NORMAL_SIGN: &str = "u_normal_sign";
    pub const TEXTURE: &str = "u_texture";
}

/// cgmath targets OpenGL clip space (z in -1..1) while WGPU expects 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// A value assigned to a named uniform of a [`ShaderProgram`].
#[derive(Clone, Debug, PartialEq)]
pub enum UniformValue {
    Scalar(f32),
    Vec3([f32; 3]),
    Mat4(Matrix4<f32>),
    Texture(Arc<RgbImage>),
}

impl UniformValue {
    pub fn kind(&self) -> &'static str {
        match self {
            UniformValue::Scalar(_) => "scalar",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Mat4(_) => "mat4",
            UniformValue::Texture(_) => "texture",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ProgramError {
    #[error("the program has no uniform named `{0}`")]
    UnknownUniform(String),
    #[error("uniform `{name}` expects a {expected} but was given a {actual}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("the program has no geometry to draw")]
    MissingGeometry,
    #[error("no texture has been assigned to the program")]
    MissingTexture,
}

/// A compiled GPU program bound to the vertex data of a single model.
///
/// `Target` is whatever the backend records draw calls into, e.g. a render
/// pass for one frame.
pub trait ShaderProgram {
    type Target<'t>;

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), ProgramError>;

    /// Upload vertex attributes and the optional index buffer.
    fn set_geometry(&mut self, vertices: &[Vertex], indices: Option<&[u32]>);

    /// Draw the geometry as a triangle list. Every uniform assigned before
    /// this call must be visible to the draw.
    fn draw_triangles(&mut self, target: &mut Self::Target<'_>) -> Result<(), ProgramError>;
}

/// Allocates a fresh program for every registered model.
pub trait ProgramFactory {
    type Program: ShaderProgram;

    fn create_program(&self) -> Self::Program;
}

/// View and projection state of the scene.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: [f32; 3],
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
}

impl Camera {
    fn new(position: [f32; 3], projection: Perspective) -> Self {
        Self {
            position,
            view: Matrix4::from_translation(Vector3::from(position)),
            projection: projection.to_matrix(),
        }
    }
}

/// Parameters of a perspective projection. `fovy` is in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Perspective {
    pub fovy: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Perspective {
    pub fn to_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(Deg(self.fovy), self.aspect, self.znear, self.zfar)
    }
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            fovy: 45.0,
            aspect: 1.0,
            znear: 2.0,
            zfar: 100.0,
        }
    }
}

/// The single point light of the scene.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Light {
    pub position: [f32; 3],
}

/// Handle to a model registered with a [`Scene`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelHandle(usize);

struct Registration<P> {
    model: Model,
    program: P,
}

pub struct Scene<F: ProgramFactory> {
    factory: F,
    camera: Camera,
    light: Light,
    normal_sign: f32,
    registrations: Vec<Registration<F::Program>>,
}

impl<F: ProgramFactory> Scene<F> {
    /// Create an empty scene with the camera at `(0, 0, -10)`, the default
    /// perspective and the light at `(0, 0, -20)`.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            camera: Camera::new([0.0, 0.0, -10.0], Perspective::default()),
            light: Light {
                position: [0.0, 0.0, -20.0],
            },
            normal_sign: -1.0,
            registrations: Vec::new(),
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn light(&self) -> &Light {
        &self.light
    }

    pub fn model(&self, handle: ModelHandle) -> Option<&Model> {
        self.registrations.get(handle.0).map(|r| &r.model)
    }

    pub fn model_mut(&mut self, handle: ModelHandle) -> Option<&mut Model> {
        self.registrations.get_mut(handle.0).map(|r| &mut r.model)
    }

    pub fn program(&self, handle: ModelHandle) -> Option<&F::Program> {
        self.registrations.get(handle.0).map(|r| &r.program)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Move the camera. The view matrix becomes a pure translation by `(x, y, z)`.
    pub fn set_camera_position(&mut self, x: f32, y: f32, z: f32) -> Result<(), ProgramError> {
        self.camera.position = [x, y, z];
        self.camera.view = Matrix4::from_translation(Vector3::new(x, y, z));
        let (view, position) = (self.camera.view, self.camera.position);
        self.for_each_program(|program| {
            program.set_uniform(uniforms::VIEW, UniformValue::Mat4(view))?;
            program.set_uniform(uniforms::VIEW_POS, UniformValue::Vec3(position))
        })
    }

    pub fn set_camera_projection(
        &mut self,
        fovy: f32,
        aspect: f32,
        znear: f32,
        zfar: f32,
    ) -> Result<(), ProgramError> {
        self.camera.projection = Perspective {
            fovy,
            aspect,
            znear,
            zfar,
        }
        .to_matrix();
        let projection = self.camera.projection;
        self.for_each_program(|program| {
            program.set_uniform(uniforms::PROJECTION, UniformValue::Mat4(projection))
        })
    }

    pub fn set_light_pos(&mut self, x: f32, y: f32, z: f32) -> Result<(), ProgramError> {
        self.light.position = [x, y, z];
        let position = self.light.position;
        self.for_each_program(|program| {
            program.set_uniform(uniforms::LIGHT_POS, UniformValue::Vec3(position))
        })
    }

    /// Set the sign applied to interpolated normals in the fragment stage.
    ///
    /// The reference renders were produced with `-1.0`; it is kept as a
    /// lighting parameter so it can be checked against other references.
    pub fn set_normal_sign(&mut self, sign: f32) -> Result<(), ProgramError> {
        self.normal_sign = sign;
        self.for_each_program(|program| {
            program.set_uniform(uniforms::NORMAL_SIGN, UniformValue::Scalar(sign))
        })
    }

    /// Bind `model` to a new program and upload everything it needs to draw.
    pub fn register_model(&mut self, model: Model) -> Result<ModelHandle, ProgramError> {
        let mut program = self.factory.create_program();

        program.set_geometry(model.vertices(), model.indexes());

        let material = model.material();
        program.set_uniform(uniforms::AMBIENT_K, UniformValue::Scalar(material.ambient_k))?;
        program.set_uniform(uniforms::DIFFUSION_K, UniformValue::Scalar(material.diffusion_k))?;
        program.set_uniform(uniforms::SPECULAR_K, UniformValue::Scalar(material.specular_k))?;
        program.set_uniform(uniforms::TEXTURE, UniformValue::Texture(model.texture().clone()))?;

        program.set_uniform(uniforms::MODEL, UniformValue::Mat4(model.get_model_matrix()))?;
        program.set_uniform(uniforms::PROJECTION, UniformValue::Mat4(self.camera.projection))?;
        program.set_uniform(uniforms::VIEW, UniformValue::Mat4(self.camera.view))?;
        program.set_uniform(uniforms::VIEW_POS, UniformValue::Vec3(self.camera.position))?;
        program.set_uniform(uniforms::LIGHT_POS, UniformValue::Vec3(self.light.position))?;
        program.set_uniform(uniforms::NORMAL_SIGN, UniformValue::Scalar(self.normal_sign))?;

        self.registrations.push(Registration { model, program });
        log::info!("Registered model #{}", self.registrations.len() - 1);
        Ok(ModelHandle(self.registrations.len() - 1))
    }

    /// Push every model's current transform and record its draw call.
    pub fn draw(
        &mut self,
        target: &mut <F::Program as ShaderProgram>::Target<'_>,
    ) -> Result<(), ProgramError> {
        for Registration { model, program } in self.registrations.iter_mut() {
            program.set_uniform(uniforms::MODEL, UniformValue::Mat4(model.get_model_matrix()))?;
            program.draw_triangles(target)?;
        }
        Ok(())
    }

    fn for_each_program(
        &mut self,
        mut f: impl FnMut(&mut F::Program) -> Result<(), ProgramError>,
    ) -> Result<(), ProgramError> {
        self.registrations
            .iter_mut()
            .try_for_each(|registration| f(&mut registration.program))
    }
}
