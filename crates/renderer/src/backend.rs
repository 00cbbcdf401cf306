//! Seams between the render loop and the GPU API.
//!
//! [`ProgramBackend`] covers everything the program manager needs (compile,
//! link, destroy, uniform lookup); [`FrameBackend`] adds what the render loop
//! needs each frame. `WgpuBackend` implements both for real devices; tests use
//! an in-memory recorder.

use crate::error::FrameError;
use crate::quad::QUAD_VERTEX_COUNT;
use crate::types::{ShaderStage, UniformLocation, UniformName, UniformWrite};

pub trait ProgramBackend {
    /// A compiled shader unit.
    type Unit;
    /// A linked, executable program.
    type Program;

    /// Compiles one unit. On failure the backend has already released any
    /// object it created and returns the diagnostic log.
    fn compile_unit(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Unit, String>;

    /// Links one vertex unit with fragment units in the given order. On failure
    /// the candidate program is released and the log is returned.
    fn link_program(
        &mut self,
        vertex: &Self::Unit,
        fragments: &[&Self::Unit],
    ) -> Result<Self::Program, String>;

    /// Resolves a uniform against a linked program; `None` means absent.
    fn uniform_location(&self, program: &Self::Program, name: UniformName)
        -> Option<UniformLocation>;

    fn destroy_unit(&mut self, unit: Self::Unit);

    fn destroy_program(&mut self, program: Self::Program);
}

/// Outcome of checking the in-flight timer query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPoll {
    /// No closed window is waiting to be read.
    Idle,
    /// The closed window has not finished on the GPU yet.
    Pending,
    /// GPU duration of the closed window in nanoseconds.
    Ready(u64),
    /// The device cannot measure GPU time.
    Unsupported,
}

/// Everything needed to draw one frame.
pub struct FrameDraw<'a, P> {
    pub program: &'a P,
    pub uniforms: &'a [UniformWrite],
    /// Wrap this frame's draw in a timer query window.
    pub measure: bool,
}

pub trait FrameBackend: ProgramBackend {
    fn resize_surface(&mut self, width: u32, height: u32);

    /// Replaces the per-vertex UV attribute of the full-screen quad.
    fn upload_uvs(&mut self, uvs: &[[f32; 2]; QUAD_VERTEX_COUNT]);

    /// Draws the quad. Returns `true` when a measurement window was opened
    /// and closed around this draw.
    fn draw_frame(&mut self, frame: FrameDraw<'_, Self::Program>) -> Result<bool, FrameError>;

    /// Non-blocking check of the last closed measurement window.
    fn poll_timer(&mut self) -> TimerPoll;

    /// Releases every GPU object still owned by the backend. Must run while
    /// the surface is alive; later calls are no-ops.
    fn release(&mut self);
}
