//! Orientation pump.
//!
//! Connects the blocking telemetry reader (the producer) with the render loop
//! (the consumer). The two sides share exactly two things:
//!
//! - an `active` flag the render loop polls once per frame and exits on when
//!   it is cleared
//! - an [`OrientationSlot`] holding the most recent sample, overwritten whole
//!   by the producer and read whole by the consumer, so a frame never mixes
//!   fields of two samples
//!
//! [`OrientationPump::start`] spawns the render thread, [`OrientationPump::run`]
//! drives the producer on the calling thread and [`OrientationPump::stop`]
//! clears the flag and joins the render thread. [`OrientationPump::run_to_end`]
//! does the last two in sequence.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use cgmath::{InnerSpace, Matrix4, Rad, Vector3};
use thiserror::Error;

use crate::data_structures::model::Model;
use crate::telemetry::{Orientation, TelemetryError, TelemetryReader};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Error)]
pub enum PumpError {
    #[error("the orientation pump is already running")]
    AlreadyRunning,
    #[error("the orientation pump is not running")]
    NotRunning,
    #[error("could not spawn the render thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("the render thread panicked")]
    RenderPanicked,
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

#[derive(Debug, Error, PartialEq)]
pub enum OrientationError {
    #[error("cannot rotate by {angle} around degenerate axis ({x}, {y}, {z})")]
    DegenerateAxis { angle: f32, x: f32, y: f32, z: f32 },
}

/// Single-slot handoff of the latest orientation.
#[derive(Debug, Default)]
pub struct OrientationSlot {
    latest: Mutex<Orientation>,
}

impl OrientationSlot {
    pub fn new(initial: Orientation) -> Self {
        Self {
            latest: Mutex::new(initial),
        }
    }

    pub fn store(&self, orientation: Orientation) {
        // a poisoned slot still holds a whole sample
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = orientation;
    }

    pub fn load(&self) -> Orientation {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The render thread's view of the pump.
#[derive(Clone, Debug)]
pub struct RenderLink {
    active: Arc<AtomicBool>,
    slot: Arc<OrientationSlot>,
}

impl RenderLink {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn latest(&self) -> Orientation {
        self.slot.load()
    }
}

#[derive(Debug)]
pub struct OrientationPump {
    state: PumpState,
    active: Arc<AtomicBool>,
    slot: Arc<OrientationSlot>,
    render_thread: Option<JoinHandle<()>>,
}

impl Default for OrientationPump {
    fn default() -> Self {
        Self::new()
    }
}

impl OrientationPump {
    pub fn new() -> Self {
        Self {
            state: PumpState::Idle,
            active: Arc::new(AtomicBool::new(false)),
            slot: Arc::new(OrientationSlot::default()),
            render_thread: None,
        }
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PumpState::Running
    }

    pub fn has_render_thread(&self) -> bool {
        self.render_thread.is_some()
    }

    /// A link to the shared state, as handed to the render thread.
    pub fn link(&self) -> RenderLink {
        RenderLink {
            active: self.active.clone(),
            slot: self.slot.clone(),
        }
    }

    /// Spawn the render thread running `render`.
    ///
    /// `render` should return once [`RenderLink::is_active`] turns false.
    pub fn start<F>(&mut self, render: F) -> Result<(), PumpError>
    where
        F: FnOnce(RenderLink) + Send + 'static,
    {
        if self.is_running() {
            return Err(PumpError::AlreadyRunning);
        }
        self.active.store(true, Ordering::Release);
        let link = self.link();
        let handle = thread::Builder::new()
            .name("render".to_string())
            .spawn(move || render(link))
            .map_err(|e| {
                self.active.store(false, Ordering::Release);
                PumpError::Spawn(e)
            })?;
        self.render_thread = Some(handle);
        self.state = PumpState::Running;
        log::info!("Render thread started");
        Ok(())
    }

    /// Clear the active flag and wait for the render thread to return.
    ///
    /// The pump can be started again afterwards.
    pub fn stop(&mut self) -> Result<(), PumpError> {
        if !self.is_running() {
            return Err(PumpError::NotRunning);
        }
        self.state = PumpState::Stopping;
        self.active.store(false, Ordering::Release);
        let joined = match self.render_thread.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        };
        self.state = PumpState::Stopped;
        log::info!("Render thread stopped");
        joined.map_err(|_| PumpError::RenderPanicked)
    }

    /// Replace the orientation the render thread sees next.
    pub fn publish(&self, orientation: Orientation) {
        self.slot.store(orientation);
    }

    /// Read telemetry lines until the stream ends, publishing every parsed
    /// sample in display axes.
    ///
    /// Undecodable and unparseable lines are logged and skipped. Returns the
    /// number of published samples, or the I/O error that ended the stream.
    pub fn run<R: BufRead>(&self, reader: R) -> Result<usize, TelemetryError> {
        let mut published = 0;
        for reading in TelemetryReader::new(reader) {
            match reading {
                Ok(reading) => {
                    log::info!("{}", reading.line);
                    self.publish(reading.orientation.to_display());
                    published += 1;
                }
                Err(e) if e.is_recoverable() => log::error!("{}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(published)
    }

    /// [`run`](Self::run) the telemetry stream to its end, then stop the
    /// render thread.
    ///
    /// A failed stop is returned in preference to a failed stream; the
    /// stream error is logged so it is not lost.
    pub fn run_to_end<R: BufRead>(&mut self, reader: R) -> Result<usize, PumpError> {
        let streamed = self.run(reader);
        if let Err(e) = &streamed {
            log::error!("{}", e);
        }
        self.stop()?;
        Ok(streamed?)
    }
}

impl Drop for OrientationPump {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.stop() {
                log::error!("Failed to stop the orientation pump: {}", e);
            }
        }
    }
}

/// Rotation by `angle` radians around the (not necessarily normalised) axis.
pub fn rotation_matrix(orientation: &Orientation) -> Result<Matrix4<f32>, OrientationError> {
    let Orientation { angle, x, y, z } = *orientation;
    let degenerate = OrientationError::DegenerateAxis { angle, x, y, z };
    if ![angle, x, y, z].iter().all(|v| v.is_finite()) {
        return Err(degenerate);
    }
    // Scale by the largest component first so the length cannot overflow
    // or underflow.
    let largest = x.abs().max(y.abs()).max(z.abs());
    if largest == 0.0 {
        return Err(degenerate);
    }
    let axis = (Vector3::new(x, y, z) / largest).normalize();
    if (axis.magnitude2() - 1.0).abs() > 1e-4 {
        return Err(degenerate);
    }
    Ok(Matrix4::from_axis_angle(axis, Rad(angle)))
}

/// Install the rotation of `orientation` as the model's only transform.
///
/// On a degenerate orientation the model keeps its previous transforms.
pub fn apply_orientation(
    model: &mut Model,
    orientation: &Orientation,
) -> Result<(), OrientationError> {
    let rotation = rotation_matrix(orientation)?;
    model.transforms = vec![rotation];
    Ok(())
}
