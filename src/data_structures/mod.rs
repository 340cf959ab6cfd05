//! Engine data structures: models and textures.
//!
//! - `model` contains vertices, materials and the transform stack of a renderable model
//! - `texture` contains the GPU texture wrapper and creation utilities

pub mod model;
pub mod texture;
