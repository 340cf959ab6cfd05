//! Render loop.
//!
//! The viewer is a winit [`ApplicationHandler`] driving a single [`Scene`]
//! that holds the cube. Each frame it
//!
//! 1. checks the pump's active flag and leaves the event loop once cleared
//! 2. turns the latest orientation into the cube's rotation
//! 3. records the scene into a render pass and presents the frame
//!
//! [`run`] blocks the calling thread until the window is closed or the pump
//! is stopped, and reports which of the two happened.

use std::sync::Arc;

use anyhow::Context as _;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::{
    config::ViewerConfig,
    context::Context,
    data_structures::model::Model,
    pipelines::phong::PhongPrograms,
    pump::{RenderLink, apply_orientation},
    scene::{ModelHandle, Scene},
    telemetry::Orientation,
};

/// Why the render loop returned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// The pump cleared the active flag.
    Stopped,
    /// The user or the OS closed the window.
    WindowClosed,
}

struct Viewer {
    ctx: Context,
    scene: Scene<PhongPrograms>,
    cube: ModelHandle,
    applied: Option<Orientation>,
}

impl Viewer {
    fn new(ctx: Context, config: &ViewerConfig, model: Model) -> anyhow::Result<Self> {
        let factory = PhongPrograms::new(&ctx.device, &ctx.queue, ctx.config.format);
        let mut scene = Scene::new(factory);

        let [x, y, z] = config.camera_position;
        scene.set_camera_position(x, y, z)?;
        scene.set_camera_projection(config.fovy, ctx.aspect(), config.znear, config.zfar)?;
        let [x, y, z] = config.light_position;
        scene.set_light_pos(x, y, z)?;
        scene.set_normal_sign(config.normal_sign)?;
        let cube = scene.register_model(model)?;

        Ok(Self {
            ctx,
            scene,
            cube,
            applied: None,
        })
    }

    fn resize(&mut self, config: &ViewerConfig, width: u32, height: u32) {
        self.ctx.resize(width, height);
        if let Err(e) = self.scene.set_camera_projection(
            config.fovy,
            self.ctx.aspect(),
            config.znear,
            config.zfar,
        ) {
            log::error!("Could not update the projection: {}", e);
        }
    }

    fn update(&mut self, latest: Orientation) {
        if self.applied == Some(latest) {
            return;
        }
        self.applied = Some(latest);
        if let Some(cube) = self.scene.model_mut(self.cube) {
            if let Err(e) = apply_orientation(cube, &latest) {
                log::error!("{}", e);
            }
        }
    }

    fn render(&mut self, clear_colour: wgpu::Color) -> Result<(), wgpu::SurfaceError> {
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.ctx.is_surface_configured() {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Err(e) = self.scene.draw(&mut render_pass) {
                log::error!("Unable to draw the scene: {}", e);
            }
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub struct ViewerApp {
    async_runtime: tokio::runtime::Runtime,
    config: ViewerConfig,
    link: RenderLink,
    model: Option<Model>,
    viewer: Option<Viewer>,
    exit: Option<ExitReason>,
    error: Option<anyhow::Error>,
}

impl ViewerApp {
    pub fn new(config: ViewerConfig, model: Model, link: RenderLink) -> anyhow::Result<Self> {
        let async_runtime =
            tokio::runtime::Runtime::new().context("could not start the async runtime")?;
        Ok(Self {
            async_runtime,
            config,
            link,
            model: Some(model),
            viewer: None,
            exit: None,
            error: None,
        })
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes().with_title(self.config.title.clone());
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("could not create the window")?,
        );
        let model = self.model.take().context("the viewer was initialised twice")?;

        let mut ctx = self.async_runtime.block_on(Context::new(window))?;
        let size = ctx.window.inner_size();
        ctx.resize(size.width, size.height);

        self.viewer = Some(Viewer::new(ctx, &self.config, model)?);
        Ok(())
    }

    fn finish(&mut self, event_loop: &ActiveEventLoop, reason: ExitReason) {
        self.exit.get_or_insert(reason);
        event_loop.exit();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() || self.error.is_some() {
            return;
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Err(e) = self.init(event_loop) {
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let viewer = match &mut self.viewer {
            Some(viewer) => viewer,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => {
                log::warn!("Window closed");
                self.finish(event_loop, ExitReason::WindowClosed);
            }
            WindowEvent::Resized(size) => viewer.resize(&self.config, size.width, size.height),
            WindowEvent::RedrawRequested => {
                if !self.link.is_active() {
                    self.finish(event_loop, ExitReason::Stopped);
                    return;
                }
                viewer.update(self.link.latest());
                match viewer.render(self.config.clear_colour) {
                    Ok(()) => (),
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = viewer.ctx.window.inner_size();
                        viewer.resize(&self.config, size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if !self.link.is_active() {
            self.finish(event_loop, ExitReason::Stopped);
        } else if let Some(viewer) = &self.viewer {
            viewer.ctx.window.request_redraw();
        }
    }
}

/// Open the viewer window showing `model` and run the render loop on the
/// calling thread until the window closes or `link` turns inactive.
pub fn run(config: ViewerConfig, model: Model, link: RenderLink) -> anyhow::Result<ExitReason> {
    // The render loop lives on the pump's thread, not the main thread.
    #[cfg(target_os = "linux")]
    let event_loop: EventLoop<()> = {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        EventLoop::builder()
            .with_any_thread(true)
            .build()
            .context("could not create the event loop")?
    };

    #[cfg(target_os = "windows")]
    let event_loop: EventLoop<()> = {
        use winit::platform::windows::EventLoopBuilderExtWindows;

        EventLoop::builder()
            .with_any_thread(true)
            .build()
            .context("could not create the event loop")?
    };

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    let event_loop: EventLoop<()> = EventLoop::builder()
        .build()
        .context("could not create the event loop")?;

    let mut app = ViewerApp::new(config, model, link)?;
    event_loop.run_app(&mut app)?;

    if let Some(e) = app.error.take() {
        return Err(e);
    }
    Ok(app.exit.unwrap_or(ExitReason::Stopped))
}
