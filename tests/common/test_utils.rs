#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;

use gyro_cube::data_structures::model::Vertex;
use gyro_cube::scene::{ProgramError, ProgramFactory, ShaderProgram, UniformValue, uniforms};

/// Every uniform the Phong program declares, with the variant it accepts.
const DECLARED: [(&str, &str); 10] = [
    (uniforms::MODEL, "mat4"),
    (uniforms::VIEW, "mat4"),
    (uniforms::PROJECTION, "mat4"),
    (uniforms::VIEW_POS, "vec3"),
    (uniforms::LIGHT_POS, "vec3"),
    (uniforms::AMBIENT_K, "scalar"),
    (uniforms::DIFFUSION_K, "scalar"),
    (uniforms::SPECULAR_K, "scalar"),
    (uniforms::NORMAL_SIGN, "scalar"),
    (uniforms::TEXTURE, "texture"),
];

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Uniform(String),
    Geometry {
        vertices: usize,
        indices: Option<usize>,
    },
    Draw,
}

/// What a draw call could observe.
#[derive(Clone, Debug)]
pub struct DrawRecord {
    pub program: usize,
    pub uniforms: HashMap<String, UniformValue>,
}

/// A shader program that records its calls instead of talking to a GPU.
#[derive(Debug)]
pub struct RecordingProgram {
    pub id: usize,
    pub calls: Vec<Call>,
    pub uniforms: HashMap<String, UniformValue>,
    has_geometry: bool,
}

impl RecordingProgram {
    /// The calls made since the most recent draw.
    pub fn calls_since_last_draw(&self) -> &[Call] {
        let start = self
            .calls
            .iter()
            .rposition(|c| *c == Call::Draw)
            .map_or(0, |i| i + 1);
        &self.calls[start..]
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }
}

impl ShaderProgram for RecordingProgram {
    type Target<'t> = Vec<DrawRecord>;

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), ProgramError> {
        let expected = DECLARED
            .iter()
            .find(|(declared, _)| *declared == name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| ProgramError::UnknownUniform(name.to_string()))?;
        if value.kind() != expected {
            return Err(ProgramError::TypeMismatch {
                name: name.to_string(),
                expected,
                actual: value.kind(),
            });
        }
        self.calls.push(Call::Uniform(name.to_string()));
        self.uniforms.insert(name.to_string(), value);
        Ok(())
    }

    fn set_geometry(&mut self, vertices: &[Vertex], indices: Option<&[u32]>) {
        self.calls.push(Call::Geometry {
            vertices: vertices.len(),
            indices: indices.map(<[u32]>::len),
        });
        self.has_geometry = true;
    }

    fn draw_triangles(&mut self, target: &mut Vec<DrawRecord>) -> Result<(), ProgramError> {
        if !self.has_geometry {
            return Err(ProgramError::MissingGeometry);
        }
        self.calls.push(Call::Draw);
        target.push(DrawRecord {
            program: self.id,
            uniforms: self.uniforms.clone(),
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingPrograms {
    next_id: Cell<usize>,
}

impl ProgramFactory for RecordingPrograms {
    type Program = RecordingProgram;

    fn create_program(&self) -> RecordingProgram {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        RecordingProgram {
            id,
            calls: Vec::new(),
            uniforms: HashMap::new(),
            has_geometry: false,
        }
    }
}
