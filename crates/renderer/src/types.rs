use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default interval between shader file checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Default interval between GPU frame-time measurements.
pub const DEFAULT_QUERY_INTERVAL: Duration = Duration::from_millis(1000);

/// One compilable piece of the viewer's GPU program.
///
/// A program is always linked from exactly three units in this order:
/// the fixed vertex unit, the fixed fragment base (shared declarations and
/// `main`), and the user fragment that defines `render`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    FragBase,
    Fragment,
}

impl ShaderStage {
    pub fn label(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "Vertex",
            ShaderStage::FragBase => "FragBase",
            ShaderStage::Fragment => "Fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Host-provided uniforms declared by the fixed units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformName {
    CamPos,
    CamDir,
    CamU,
    CamV,
    Time,
}

impl UniformName {
    pub const ALL: [UniformName; 5] = [
        UniformName::CamPos,
        UniformName::CamDir,
        UniformName::CamU,
        UniformName::CamV,
        UniformName::Time,
    ];

    /// Name as seen by shader authors.
    pub fn glsl_name(self) -> &'static str {
        match self {
            UniformName::CamPos => "iCamPos",
            UniformName::CamDir => "iCamDir",
            UniformName::CamU => "iCamU",
            UniformName::CamV => "iCamV",
            UniformName::Time => "iTime",
        }
    }

    /// Member name inside the `SdfParams` uniform block.
    pub fn block_member(self) -> &'static str {
        match self {
            UniformName::CamPos => "_iCamPos",
            UniformName::CamDir => "_iCamDir",
            UniformName::CamU => "_iCamU",
            UniformName::CamV => "_iCamV",
            UniformName::Time => "_iTime",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Backend-specific address of a resolved uniform.
///
/// For the wgpu backend this is the byte offset inside the uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Value uploaded to a uniform location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec3([f32; 3]),
}

/// A single uniform upload for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformWrite {
    pub location: UniformLocation,
    pub value: UniformValue,
}

/// Where the user fragment source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderOrigin {
    /// The built-in demo scene; never watched for changes.
    Embedded,
    /// A file on disk that is polled for modifications.
    File(PathBuf),
}

/// Free-fly camera tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    /// Initial movement speed in world units per second.
    pub fly_speed: f32,
    /// Degrees of rotation per pixel of pointer motion.
    pub mouse_sensitivity: f32,
    /// `k` in `speed *= exp(wheel_delta * k)`, with deltas in eighths of a degree.
    pub wheel_speed_factor: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fly_speed: 2.0,
            mouse_sensitivity: 0.4,
            wheel_speed_factor: 0.0015,
        }
    }
}

/// Immutable configuration passed to the viewer at start-up.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Base window title; the frame time is appended to it.
    pub title: String,
    /// Fragment source rendered at start-up.
    pub shader: ShaderOrigin,
    pub camera: CameraSettings,
    /// How often the watched shader file is checked for modifications.
    pub poll_interval: Duration,
    /// How often the GPU render duration is measured.
    pub query_interval: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            surface_size: (640, 480),
            title: "sdfview".to_string(),
            shader: ShaderOrigin::Embedded,
            camera: CameraSettings::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            query_interval: DEFAULT_QUERY_INTERVAL,
        }
    }
}

/// Notifications pushed from the render loop to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// GPU render duration of one measured frame.
    FrameTime { sequence: u64, microseconds: u32 },
    /// A compile or link failure, tagged with the stage that produced it.
    Diagnostic { stage: &'static str, message: String },
}
