use std::path::PathBuf;
use std::time::Instant;

use crate::error::{FrameError, ViewerError};

/// Host-independent key identifiers the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    W,
    A,
    S,
    D,
    Q,
    E,
    C,
    T,
    O,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub code: KeyCode,
    pub pressed: bool,
    /// Synthesised by keyboard auto-repeat rather than a physical press.
    pub repeat: bool,
}

/// What the host should do after forwarding a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyResponse {
    Handled,
    /// Not a viewer binding; the host may apply its default handling.
    Ignored,
    /// Ask the file-selection collaborator for a shader path.
    OpenShader,
}

/// Outcome of one frame callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStatus {
    /// Frame submitted; schedule the next one.
    Continue,
    /// Nothing to draw yet.
    Skipped,
    /// The surface must be reconfigured before drawing again.
    Reconfigure,
    /// Rendering cannot continue.
    Fatal(FrameError),
}

/// A renderable surface driven by a host window.
///
/// The host owns the surface, forwards input and lifecycle events, and calls
/// [`RenderSurface::teardown`] exactly once while the GPU context is alive.
pub trait RenderSurface {
    fn on_init(&mut self, now: Instant) -> Result<(), ViewerError>;
    fn on_resize(&mut self, width: u32, height: u32);
    fn on_frame(&mut self, now: Instant) -> FrameStatus;
    /// Pointer motion while the primary button is held, in physical pixels.
    fn on_pointer_move(&mut self, x: f64, y: f64);
    fn on_pointer_release(&mut self);
    fn on_key(&mut self, key: KeyInput) -> KeyResponse;
    /// Wheel delta in eighths of a degree (120 per notch).
    fn on_wheel(&mut self, delta: f32);
    /// Periodic tick; runs the reload check when it is due.
    fn on_timer(&mut self, now: Instant);
    /// Switches to a new shader file and reloads it immediately.
    fn open_shader(&mut self, path: PathBuf);
    fn teardown(&mut self);
}
