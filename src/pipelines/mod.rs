//! Render pipelines. The crate draws every model with a single Phong pipeline.

pub mod phong;
