//! Viewer settings.

/// Window, camera and lighting settings of the viewer.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub title: String,
    pub clear_colour: wgpu::Color,
    pub camera_position: [f32; 3],
    /// Vertical field of view in degrees.
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    pub light_position: [f32; 3],
    pub normal_sign: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Gyroscope".to_string(),
            clear_colour: wgpu::Color::BLACK,
            camera_position: [0.0, 0.0, -10.0],
            fovy: 45.0,
            znear: 2.0,
            zfar: 100.0,
            light_position: [0.0, 0.0, -20.0],
            normal_sign: -1.0,
        }
    }
}
