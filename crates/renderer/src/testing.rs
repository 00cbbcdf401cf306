//! In-memory backend that records every call, for unit tests.

use std::collections::{BTreeSet, VecDeque};

use crate::backend::{FrameBackend, FrameDraw, ProgramBackend, TimerPoll};
use crate::error::FrameError;
use crate::quad::QUAD_VERTEX_COUNT;
use crate::types::{ShaderStage, UniformLocation, UniformName, UniformWrite};

/// Fragment source that fails to compile.
pub(crate) const BROKEN: &str = "vec3 render( BROKEN";
/// Fragment source that compiles but fails to link.
pub(crate) const UNLINKABLE: &str = "vec3 renderer(vec3 p) { return p; } // UNLINKABLE";

#[derive(Debug)]
pub(crate) struct FakeUnit {
    id: u32,
    source: String,
}

#[derive(Debug)]
pub(crate) struct FakeProgram(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DrawRecord {
    pub program: u32,
    pub uniforms: Vec<UniformWrite>,
    pub measure: bool,
}

#[derive(Debug)]
pub(crate) struct RecordingBackend {
    pub next_id: u32,
    pub compiles: usize,
    pub live_units: BTreeSet<u32>,
    pub live_programs: BTreeSet<u32>,
    pub failing_stage: Option<ShaderStage>,
    pub absent_uniforms: Vec<UniformName>,
    pub draws: Vec<DrawRecord>,
    pub uvs: Vec<[[f32; 2]; QUAD_VERTEX_COUNT]>,
    pub resizes: Vec<(u32, u32)>,
    pub timer_supported: bool,
    /// Results handed out while a window is waiting; defaults to `Ready(1_500_000)`.
    pub timer_script: VecDeque<TimerPoll>,
    pub window_open: bool,
    pub polls: usize,
    pub frame_errors: VecDeque<FrameError>,
    pub releases: usize,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            next_id: 1,
            compiles: 0,
            live_units: BTreeSet::new(),
            live_programs: BTreeSet::new(),
            failing_stage: None,
            absent_uniforms: Vec::new(),
            draws: Vec::new(),
            uvs: Vec::new(),
            resizes: Vec::new(),
            timer_supported: true,
            timer_script: VecDeque::new(),
            window_open: false,
            polls: 0,
            frame_errors: VecDeque::new(),
            releases: 0,
        }
    }
}

impl RecordingBackend {
    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl ProgramBackend for RecordingBackend {
    type Unit = FakeUnit;
    type Program = FakeProgram;

    fn compile_unit(&mut self, stage: ShaderStage, source: &str) -> Result<FakeUnit, String> {
        self.compiles += 1;
        if self.failing_stage == Some(stage) || source.contains("BROKEN") {
            return Err(format!("0:1: {stage} syntax error"));
        }
        let id = self.allocate();
        self.live_units.insert(id);
        Ok(FakeUnit {
            id,
            source: source.to_string(),
        })
    }

    fn link_program(
        &mut self,
        vertex: &FakeUnit,
        fragments: &[&FakeUnit],
    ) -> Result<FakeProgram, String> {
        assert!(self.live_units.contains(&vertex.id), "vertex unit destroyed");
        for unit in fragments {
            assert!(self.live_units.contains(&unit.id), "fragment unit destroyed");
            if unit.source.contains("UNLINKABLE") {
                return Err("undefined reference to render".to_string());
            }
        }
        let id = self.allocate();
        self.live_programs.insert(id);
        Ok(FakeProgram(id))
    }

    fn uniform_location(&self, program: &FakeProgram, name: UniformName) -> Option<UniformLocation> {
        assert!(self.live_programs.contains(&program.0), "program destroyed");
        if self.absent_uniforms.contains(&name) {
            None
        } else {
            Some(UniformLocation(name.index() as u32 * 16))
        }
    }

    fn destroy_unit(&mut self, unit: FakeUnit) {
        assert!(self.live_units.remove(&unit.id), "unit destroyed twice");
    }

    fn destroy_program(&mut self, program: FakeProgram) {
        assert!(self.live_programs.remove(&program.0), "program destroyed twice");
    }
}

impl FrameBackend for RecordingBackend {
    fn resize_surface(&mut self, width: u32, height: u32) {
        self.resizes.push((width, height));
    }

    fn upload_uvs(&mut self, uvs: &[[f32; 2]; QUAD_VERTEX_COUNT]) {
        self.uvs.push(*uvs);
    }

    fn draw_frame(&mut self, frame: FrameDraw<'_, FakeProgram>) -> Result<bool, FrameError> {
        if let Some(err) = self.frame_errors.pop_front() {
            return Err(err);
        }
        assert!(self.live_programs.contains(&frame.program.0), "drawing a destroyed program");
        let measured = frame.measure && self.timer_supported;
        assert!(
            !(measured && self.window_open),
            "opened a window while another is unread"
        );
        self.window_open |= measured;
        self.draws.push(DrawRecord {
            program: frame.program.0,
            uniforms: frame.uniforms.to_vec(),
            measure: frame.measure,
        });
        Ok(measured)
    }

    fn poll_timer(&mut self) -> TimerPoll {
        self.polls += 1;
        if !self.timer_supported {
            return TimerPoll::Unsupported;
        }
        if !self.window_open {
            return TimerPoll::Idle;
        }
        let result = self
            .timer_script
            .pop_front()
            .unwrap_or(TimerPoll::Ready(1_500_000));
        if result != TimerPoll::Pending {
            self.window_open = false;
        }
        result
    }

    fn release(&mut self) {
        self.releases += 1;
    }
}
