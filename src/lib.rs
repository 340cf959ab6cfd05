//! gyro-cube
//!
//! Live orientation viewer for a gyroscope/IMU streaming text telemetry over a
//! serial link. The sensor's orientation is shown as a lit, textured cube that
//! is rotated every frame to the most recent sample.
//!
//! High-level modules
//! - `config`: window, camera and lighting settings
//! - `context`: GPU device, queue, surface and depth buffer of the window
//! - `data_structures`: vertices, materials, models and GPU textures
//! - `flow`: the winit render loop
//! - `pipelines`: the Phong shading program and its wgpu pipeline
//! - `pump`: hands orientations from the telemetry reader to the render thread
//! - `resources`: normal derivation and the cube mesh
//! - `scene`: camera, light and the uniform contract of shader programs
//! - `telemetry`: parsing of telemetry lines
//!

pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod pump;
pub mod resources;
pub mod scene;
pub mod telemetry;
