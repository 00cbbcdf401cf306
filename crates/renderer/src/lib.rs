//! Renderer crate for sdfview, a live-reloading signed-distance-field viewer.
//!
//! A user fragment defines `vec3 render(vec3 rayPos, vec3 rayDir, float time)`;
//! the crate links it against fixed vertex/base units, ray-marches it over a
//! full-screen quad, and swaps in a new program whenever the file changes.
//!
//! ```text
//!   host (window::run) ── events ──▶ SdfViewer ──▶ ProgramManager ──▶ FrameBackend
//!        ▲                              │  ▲              (compile/link)    (wgpu)
//!        │ ViewerEvent (frame time,     │  └── ShaderWatcher (mtime poll)
//!        └──────── diagnostics) ◀───────┘      Camera / FrameClock
//! ```
//!
//! [`SdfViewer`] is generic over [`FrameBackend`], so everything above the GPU
//! API runs unchanged against [`WgpuBackend`] or an in-memory backend.

pub mod backend;
pub mod camera;
pub mod compile;
pub mod error;
mod gpu;
pub mod program;
pub mod quad;
pub mod surface;
pub mod telemetry;
pub mod types;
pub mod viewer;
pub mod watcher;
mod window;

#[cfg(test)]
mod testing;

pub use backend::{FrameBackend, FrameDraw, ProgramBackend, TimerPoll};
pub use camera::{Camera, MoveAxis, RayBasis};
pub use error::{FrameError, ProgramError, ViewerError};
pub use gpu::{WgpuBackend, WgpuProgram, WgpuUnit};
pub use program::{ProgramManager, UniformTable};
pub use surface::{FrameStatus, KeyCode, KeyInput, KeyResponse, RenderSurface};
pub use telemetry::{FrameClock, ViewerEvents};
pub use types::{
    CameraSettings, ShaderOrigin, ShaderStage, UniformLocation, UniformName, UniformValue,
    UniformWrite, ViewerConfig, ViewerEvent, DEFAULT_POLL_INTERVAL, DEFAULT_QUERY_INTERVAL,
};
pub use viewer::SdfViewer;
pub use window::{run, ShaderPicker, WindowCommand};
