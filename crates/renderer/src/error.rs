use thiserror::Error;

use crate::types::ShaderStage;

/// Failure while building a GPU program.
///
/// Diagnostics are opaque, human-readable driver/compiler logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProgramError {
    #[error("{stage} shader compile error: {log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("Program link error: {log}")]
    Link { log: String },
}

impl ProgramError {
    /// Tag used when surfacing the diagnostic ("Vertex", "FragBase", "Fragment", "Program").
    pub fn stage_label(&self) -> &'static str {
        match self {
            ProgramError::Compile { stage, .. } => stage.label(),
            ProgramError::Link { .. } => "Program",
        }
    }

    pub fn log(&self) -> &str {
        match self {
            ProgramError::Compile { log, .. } | ProgramError::Link { log } => log,
        }
    }
}

/// Errors that stop the viewer from starting.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// No working program could be built at start-up; nothing is safe to render.
    #[error("failed to build the initial shader program")]
    InitialProgram(#[source] ProgramError),
}

/// Per-frame presentation failures reported by a backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The surface must be reconfigured before the next frame.
    #[error("surface lost or outdated")]
    SurfaceLost,
    #[error("surface out of memory")]
    OutOfMemory,
    #[error("surface timeout")]
    Timeout,
    #[error("surface error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_labels_match_diagnostic_tags() {
        let compile = ProgramError::Compile {
            stage: ShaderStage::FragBase,
            log: "oops".into(),
        };
        let link = ProgramError::Link { log: "nope".into() };
        assert_eq!(compile.stage_label(), "FragBase");
        assert_eq!(link.stage_label(), "Program");
        assert_eq!(compile.to_string(), "FragBase shader compile error: oops");
        assert_eq!(link.log(), "nope");
    }
}
