//! Ownership of every compiled unit and linked program.
//!
//! The manager holds the fixed vertex and base-fragment units for its whole
//! life and at most one active program. Candidates are built off to the side
//! and only replace the active program once they have linked; a failure at any
//! stage leaves the active program untouched.

use crate::backend::ProgramBackend;
use crate::compile::{BASE_FRAGMENT_GLSL, VERTEX_SHADER_GLSL};
use crate::error::ProgramError;
use crate::types::{ShaderStage, UniformLocation, UniformName, UniformValue, UniformWrite};

/// Resolved uniform locations of the active program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformTable {
    locations: [Option<UniformLocation>; UniformName::ALL.len()],
}

impl UniformTable {
    fn resolve<B: ProgramBackend>(backend: &B, program: &B::Program) -> Self {
        let mut table = Self::default();
        for name in UniformName::ALL {
            let location = backend.uniform_location(program, name);
            if location.is_none() {
                tracing::debug!(uniform = name.glsl_name(), "uniform not present in program");
            }
            table.locations[name.index()] = location;
        }
        table
    }

    pub fn get(&self, name: UniformName) -> Option<UniformLocation> {
        self.locations[name.index()]
    }

    /// Pairs values with their locations, dropping uniforms the program lacks.
    pub fn writes(
        &self,
        values: impl IntoIterator<Item = (UniformName, UniformValue)>,
    ) -> Vec<UniformWrite> {
        values
            .into_iter()
            .filter_map(|(name, value)| {
                self.get(name)
                    .map(|location| UniformWrite { location, value })
            })
            .collect()
    }
}

pub struct ProgramManager<B: ProgramBackend> {
    vertex: B::Unit,
    base: B::Unit,
    active: Option<B::Program>,
    uniforms: UniformTable,
    swaps: u64,
}

impl<B: ProgramBackend> ProgramManager<B> {
    /// Compiles the fixed units. Either failure is fatal for the caller since
    /// no program can ever be linked without them.
    pub fn new(backend: &mut B) -> Result<Self, ProgramError> {
        let vertex = compile_unit(backend, ShaderStage::Vertex, VERTEX_SHADER_GLSL)?;
        let base = match compile_unit(backend, ShaderStage::FragBase, BASE_FRAGMENT_GLSL) {
            Ok(base) => base,
            Err(err) => {
                backend.destroy_unit(vertex);
                return Err(err);
            }
        };
        Ok(Self {
            vertex,
            base,
            active: None,
            uniforms: UniformTable::default(),
            swaps: 0,
        })
    }

    pub fn active(&self) -> Option<&B::Program> {
        self.active.as_ref()
    }

    pub fn uniforms(&self) -> &UniformTable {
        &self.uniforms
    }

    /// Number of programs installed so far.
    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Links the fixed vertex unit with `fragments` in order.
    pub fn link_program(
        &self,
        backend: &mut B,
        fragments: &[&B::Unit],
    ) -> Result<B::Program, ProgramError> {
        backend
            .link_program(&self.vertex, fragments)
            .map_err(|log| ProgramError::Link { log })
    }

    /// Compiles `source` as the user fragment and links it after the base
    /// unit. The user unit is released whether or not the link succeeds.
    pub fn build(&self, backend: &mut B, source: &str) -> Result<B::Program, ProgramError> {
        let user = compile_unit(backend, ShaderStage::Fragment, source)?;
        let linked = self.link_program(backend, &[&self.base, &user]);
        backend.destroy_unit(user);
        linked
    }

    /// Installs `program`, destroying the previous one, and re-resolves the
    /// uniform table. Only called between frames.
    pub fn swap_active(&mut self, backend: &mut B, program: B::Program) {
        self.uniforms = UniformTable::resolve(backend, &program);
        if let Some(previous) = self.active.replace(program) {
            backend.destroy_program(previous);
        }
        self.swaps += 1;
    }

    /// Builds a program from `source` and makes it active on success.
    pub fn reload(&mut self, backend: &mut B, source: &str) -> Result<(), ProgramError> {
        let program = self.build(backend, source)?;
        self.swap_active(backend, program);
        tracing::info!(swaps = self.swaps, "shader program installed");
        Ok(())
    }

    /// Destroys everything the manager owns.
    pub fn release(self, backend: &mut B) {
        if let Some(program) = self.active {
            backend.destroy_program(program);
        }
        backend.destroy_unit(self.base);
        backend.destroy_unit(self.vertex);
    }
}

/// Compiles one unit. Empty sources are rejected up front so an unreadable
/// file can never produce a program.
pub fn compile_unit<B: ProgramBackend>(
    backend: &mut B,
    stage: ShaderStage,
    source: &str,
) -> Result<B::Unit, ProgramError> {
    if source.trim().is_empty() {
        return Err(ProgramError::Compile {
            stage,
            log: "shader source is empty".to_string(),
        });
    }
    backend
        .compile_unit(stage, source)
        .map_err(|log| ProgramError::Compile { stage, log })
}
