//! The render loop: owns the program manager, camera, clock, and watcher, and
//! drives a [`FrameBackend`] once per frame.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::backend::{FrameBackend, FrameDraw, TimerPoll};
use crate::camera::{Camera, MoveAxis};
use crate::compile::DEFAULT_SCENE;
use crate::error::{FrameError, ProgramError, ViewerError};
use crate::program::ProgramManager;
use crate::quad::aspect_uvs;
use crate::surface::{FrameStatus, KeyCode, KeyInput, KeyResponse, RenderSurface};
use crate::telemetry::{nanos_to_micros, FrameClock, ViewerEvents};
use crate::types::{ShaderOrigin, UniformName, UniformValue, ViewerConfig};
use crate::watcher::{read_shader_source, PeriodicTask, ShaderWatcher};

pub struct SdfViewer<B: FrameBackend> {
    backend: B,
    config: ViewerConfig,
    programs: Option<ProgramManager<B>>,
    camera: Camera,
    clock: FrameClock,
    reload_task: PeriodicTask,
    watcher: ShaderWatcher,
    events: ViewerEvents,
    pointer_anchor: Option<(f64, f64)>,
    surface_size: (u32, u32),
    torn_down: bool,
}

impl<B: FrameBackend> SdfViewer<B> {
    pub fn new(backend: B, config: ViewerConfig, events: ViewerEvents, now: Instant) -> Self {
        Self {
            camera: Camera::new(config.camera.fly_speed),
            clock: FrameClock::new(now, config.query_interval),
            reload_task: PeriodicTask::new(config.poll_interval, now),
            surface_size: config.surface_size,
            backend,
            config,
            programs: None,
            watcher: ShaderWatcher::new(),
            events,
            pointer_anchor: None,
            torn_down: false,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    /// When the host should next deliver [`RenderSurface::on_timer`].
    pub fn next_reload_check(&self) -> Instant {
        self.reload_task.next_due()
    }

    pub fn watched_path(&self) -> Option<&Path> {
        self.watcher.path()
    }

    /// Whether a program is available to draw with.
    pub fn is_ready(&self) -> bool {
        self.programs
            .as_ref()
            .is_some_and(|programs| programs.active().is_some())
    }

    fn report(&mut self, err: &ProgramError) {
        tracing::error!(stage = err.stage_label(), "{}", err.log());
        self.events.diagnostic(err.stage_label(), err.log());
    }

    fn reload_from(&mut self, path: &Path) {
        let source = read_shader_source(path);
        let Some(programs) = self.programs.as_mut() else {
            return;
        };
        let result = programs.reload(&mut self.backend, &source);
        match result {
            Ok(()) => tracing::info!(path = %path.display(), "reloaded shader"),
            Err(err) => self.report(&err),
        }
    }

    fn initial_source(&mut self) -> String {
        match self.config.shader.clone() {
            ShaderOrigin::Embedded => DEFAULT_SCENE.to_string(),
            ShaderOrigin::File(path) => {
                self.watcher.watch(&path);
                self.watcher.mark_current();
                read_shader_source(&path)
            }
        }
    }

    fn resolve_pending_sample(&mut self) {
        if !self.clock.has_pending_window() {
            return;
        }
        match self.backend.poll_timer() {
            TimerPoll::Ready(nanoseconds) => {
                let microseconds = nanos_to_micros(nanoseconds);
                tracing::debug!(microseconds, "gpu frame time");
                self.events.frame_time(microseconds);
                self.clock.window_resolved();
            }
            TimerPoll::Pending => {}
            TimerPoll::Idle | TimerPoll::Unsupported => self.clock.window_resolved(),
        }
    }
}

impl<B: FrameBackend> RenderSurface for SdfViewer<B> {
    fn on_init(&mut self, now: Instant) -> Result<(), ViewerError> {
        let mut programs = match ProgramManager::new(&mut self.backend) {
            Ok(programs) => programs,
            Err(err) => {
                self.report(&err);
                return Err(ViewerError::InitialProgram(err));
            }
        };
        let source = self.initial_source();
        if let Err(err) = programs.reload(&mut self.backend, &source) {
            programs.release(&mut self.backend);
            self.report(&err);
            return Err(ViewerError::InitialProgram(err));
        }
        self.programs = Some(programs);

        self.clock = FrameClock::new(now, self.config.query_interval);
        self.reload_task = PeriodicTask::new(self.config.poll_interval, now);
        let (width, height) = self.surface_size;
        self.on_resize(width, height);
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        let Some(uvs) = aspect_uvs(width, height) else {
            tracing::debug!(width, height, "ignoring degenerate resize");
            return;
        };
        self.surface_size = (width, height);
        self.backend.resize_surface(width, height);
        self.backend.upload_uvs(&uvs);
    }

    fn on_frame(&mut self, now: Instant) -> FrameStatus {
        if !self.is_ready() {
            return FrameStatus::Skipped;
        }

        let tick = self.clock.tick(now);
        self.camera.integrate(tick.delta);
        if tick.sample_due {
            self.resolve_pending_sample();
        }
        let measure = tick.sample_due && !self.clock.has_pending_window();

        let Some(programs) = self.programs.as_ref() else {
            return FrameStatus::Skipped;
        };
        let Some(program) = programs.active() else {
            return FrameStatus::Skipped;
        };
        let basis = self.camera.ray_basis();
        let uniforms = programs.uniforms().writes([
            (UniformName::CamPos, UniformValue::Vec3(basis.origin.to_array())),
            (UniformName::CamDir, UniformValue::Vec3(basis.direction.to_array())),
            (UniformName::CamU, UniformValue::Vec3(basis.right.to_array())),
            (UniformName::CamV, UniformValue::Vec3(basis.up.to_array())),
            (UniformName::Time, UniformValue::Float(tick.elapsed.as_secs_f32())),
        ]);

        let drawn = self.backend.draw_frame(FrameDraw {
            program,
            uniforms: &uniforms,
            measure,
        });
        match drawn {
            Ok(window_closed) => {
                if window_closed {
                    self.clock.window_closed(now);
                }
                FrameStatus::Continue
            }
            Err(FrameError::SurfaceLost) => FrameStatus::Reconfigure,
            Err(FrameError::OutOfMemory) => FrameStatus::Fatal(FrameError::OutOfMemory),
            Err(err) => {
                tracing::warn!(error = %err, "dropped frame");
                FrameStatus::Skipped
            }
        }
    }

    fn on_pointer_move(&mut self, x: f64, y: f64) {
        if let Some((anchor_x, anchor_y)) = self.pointer_anchor {
            let sensitivity = self.config.camera.mouse_sensitivity;
            self.camera.look(
                (x - anchor_x) as f32 * sensitivity,
                (y - anchor_y) as f32 * sensitivity,
            );
        }
        self.pointer_anchor = Some((x, y));
    }

    fn on_pointer_release(&mut self) {
        self.pointer_anchor = None;
    }

    fn on_key(&mut self, key: KeyInput) -> KeyResponse {
        let axis = match key.code {
            KeyCode::W => Some(MoveAxis::Forward),
            KeyCode::S => Some(MoveAxis::Backward),
            KeyCode::D => Some(MoveAxis::Right),
            KeyCode::A => Some(MoveAxis::Left),
            KeyCode::E => Some(MoveAxis::Up),
            KeyCode::Q => Some(MoveAxis::Down),
            _ => None,
        };
        if let Some(axis) = axis {
            if !key.repeat {
                if key.pressed {
                    self.camera.press(axis);
                } else {
                    self.camera.release(axis);
                }
            }
            return KeyResponse::Handled;
        }

        match key.code {
            KeyCode::C => {
                if key.pressed {
                    self.camera.recenter();
                }
                KeyResponse::Handled
            }
            KeyCode::T => {
                if key.pressed {
                    self.clock.request_reset();
                }
                KeyResponse::Handled
            }
            KeyCode::O if key.pressed && !key.repeat => KeyResponse::OpenShader,
            KeyCode::O => KeyResponse::Handled,
            _ => KeyResponse::Ignored,
        }
    }

    fn on_wheel(&mut self, delta: f32) {
        self.camera
            .scale_speed(delta, self.config.camera.wheel_speed_factor);
    }

    fn on_timer(&mut self, now: Instant) {
        if !self.reload_task.poll(now) {
            return;
        }
        if let Some(path) = self.watcher.check() {
            self.reload_from(&path);
        }
    }

    fn open_shader(&mut self, path: PathBuf) {
        if self.programs.is_none() {
            tracing::warn!(path = %path.display(), "viewer not initialised; ignoring shader");
            return;
        }
        self.watcher.watch(&path);
        self.watcher.mark_current();
        self.reload_from(&path);
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        if let Some(programs) = self.programs.take() {
            programs.release(&mut self.backend);
        }
        self.backend.release();
        self.torn_down = true;
    }
}

impl<B: FrameBackend> Drop for SdfViewer<B> {
    fn drop(&mut self) {
        if !self.torn_down {
            tracing::warn!("viewer dropped without teardown; releasing GPU objects late");
            self.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    use crossbeam_channel::Receiver;
    use glam::Vec3;
    use tempfile::TempDir;

    use crate::camera::CAM_FORWARD;
    use crate::testing::{RecordingBackend, BROKEN};
    use crate::types::{UniformLocation, ViewerEvent};

    fn viewer_with(
        backend: RecordingBackend,
        config: ViewerConfig,
        start: Instant,
    ) -> (SdfViewer<RecordingBackend>, Receiver<ViewerEvent>) {
        let (events, receiver) = ViewerEvents::channel(16);
        (SdfViewer::new(backend, config, events, start), receiver)
    }

    fn started(start: Instant) -> (SdfViewer<RecordingBackend>, Receiver<ViewerEvent>) {
        let (mut viewer, receiver) =
            viewer_with(RecordingBackend::default(), ViewerConfig::default(), start);
        viewer.on_init(start).expect("init");
        (viewer, receiver)
    }

    fn diagnostics(receiver: &Receiver<ViewerEvent>) -> Vec<&'static str> {
        receiver
            .try_iter()
            .filter_map(|event| match event {
                ViewerEvent::Diagnostic { stage, .. } => Some(stage),
                _ => None,
            })
            .collect()
    }

    fn key(code: KeyCode, pressed: bool) -> KeyInput {
        KeyInput {
            code,
            pressed,
            repeat: false,
        }
    }

    fn time_uniform(viewer: &SdfViewer<RecordingBackend>) -> Option<UniformValue> {
        let time = UniformLocation(UniformName::Time.index() as u32 * 16);
        viewer
            .backend()
            .draws
            .last()?
            .uniforms
            .iter()
            .find(|write| write.location == time)
            .map(|write| write.value)
    }

    #[test]
    fn failed_first_build_is_fatal_and_never_draws() {
        let dir = TempDir::new().expect("temp dir");
        let start = Instant::now();
        let config = ViewerConfig {
            shader: ShaderOrigin::File(dir.path().join("missing.frag")),
            ..ViewerConfig::default()
        };
        let (mut viewer, receiver) = viewer_with(RecordingBackend::default(), config, start);
        let err = viewer.on_init(start).expect_err("must fail");
        assert!(matches!(err, ViewerError::InitialProgram(_)));
        assert_eq!(
            viewer.on_frame(start + Duration::from_millis(16)),
            FrameStatus::Skipped
        );
        assert!(viewer.backend().draws.is_empty());
        assert!(viewer.backend().live_units.is_empty());
        assert_eq!(diagnostics(&receiver), vec!["Fragment"]);
    }

    #[test]
    fn failed_reload_keeps_drawing_prior_program() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("broken.frag");
        std::fs::write(&path, BROKEN).expect("write");
        let start = Instant::now();
        let (mut viewer, receiver) = started(start);
        viewer.on_frame(start + Duration::from_millis(16));
        let program = viewer.backend().draws[0].program;

        viewer.open_shader(path);
        assert_eq!(diagnostics(&receiver), vec!["Fragment"]);
        assert_eq!(
            viewer.on_frame(start + Duration::from_millis(32)),
            FrameStatus::Continue
        );
        assert_eq!(viewer.backend().draws.len(), 2);
        assert_eq!(viewer.backend().draws[1].program, program);
        // the timestamp was refreshed, so polling does not retry
        viewer.on_timer(start + Duration::from_secs(1));
        assert!(diagnostics(&receiver).is_empty());
    }

    #[test]
    fn modified_file_is_reloaded_on_poll() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("scene.frag");
        let written = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        std::fs::write(&path, "vec3 render(vec3 p, vec3 d, float t) { return d; }")
            .expect("write");
        std::fs::File::options()
            .write(true)
            .open(&path)
            .and_then(|file| file.set_modified(written))
            .expect("mtime");

        let start = Instant::now();
        let (mut viewer, _receiver) = started(start);
        viewer.open_shader(path.clone());
        assert_eq!(viewer.watched_path(), Some(path.as_path()));
        viewer.on_frame(start + Duration::from_millis(16));
        let before = viewer.backend().draws[0].program;

        std::fs::File::options()
            .write(true)
            .open(&path)
            .and_then(|file| file.set_modified(written + Duration::from_secs(5)))
            .expect("mtime");
        viewer.on_timer(start + Duration::from_millis(100));
        viewer.on_frame(start + Duration::from_millis(200));
        assert_eq!(viewer.backend().draws[1].program, before);

        viewer.on_timer(start + Duration::from_millis(600));
        viewer.on_frame(start + Duration::from_millis(616));
        let after = viewer.backend().draws[2].program;
        assert_ne!(after, before);
        assert!(!viewer.backend().live_programs.contains(&before));
    }

    #[test]
    fn samples_are_read_only_after_their_window_closed() {
        let start = Instant::now();
        let (mut viewer, receiver) = started(start);
        viewer.on_frame(start + Duration::from_millis(500));
        assert!(!viewer.backend().draws[0].measure);

        viewer.on_frame(start + Duration::from_millis(1100));
        assert!(viewer.backend().draws[1].measure);
        assert_eq!(viewer.backend().polls, 0);

        viewer.on_frame(start + Duration::from_millis(1200));
        assert!(!viewer.backend().draws[2].measure);
        assert_eq!(viewer.backend().polls, 0);
        assert!(receiver.try_recv().is_err());

        viewer.on_frame(start + Duration::from_millis(2200));
        assert_eq!(viewer.backend().polls, 1);
        assert!(viewer.backend().draws[3].measure);
        assert_eq!(
            receiver.try_recv().expect("sample"),
            ViewerEvent::FrameTime {
                sequence: 0,
                microseconds: 1500
            }
        );
    }

    #[test]
    fn pending_readback_postpones_next_window() {
        let start = Instant::now();
        let (mut viewer, receiver) = started(start);
        viewer.on_frame(start + Duration::from_millis(1100));
        viewer
            .backend
            .timer_script
            .extend([TimerPoll::Pending, TimerPoll::Ready(2_000_000)]);

        viewer.on_frame(start + Duration::from_millis(2200));
        assert!(!viewer.backend().draws[1].measure);
        assert!(receiver.try_recv().is_err());

        viewer.on_frame(start + Duration::from_millis(2216));
        assert!(viewer.backend().draws[2].measure);
        assert_eq!(
            receiver.try_recv().expect("sample"),
            ViewerEvent::FrameTime {
                sequence: 0,
                microseconds: 2000
            }
        );
    }

    #[test]
    fn resize_uploads_aspect_scaled_uvs() {
        let start = Instant::now();
        let (mut viewer, _receiver) = started(start);
        viewer.on_resize(200, 100);
        let uvs = viewer.backend().uvs.last().expect("uvs");
        assert!(uvs.iter().all(|[x, y]| x.abs() == 2.0 && y.abs() == 1.0));
        assert_eq!(viewer.surface_size(), (200, 100));

        let uploads = viewer.backend().uvs.len();
        viewer.on_resize(0, 100);
        assert_eq!(viewer.backend().uvs.len(), uploads);
        assert_eq!(viewer.surface_size(), (200, 100));
    }

    #[test]
    fn movement_keys_filter_auto_repeat() {
        let start = Instant::now();
        let (mut viewer, _receiver) = started(start);
        assert_eq!(viewer.on_key(key(KeyCode::W, true)), KeyResponse::Handled);
        viewer.on_key(KeyInput {
            repeat: true,
            ..key(KeyCode::W, true)
        });
        assert_eq!(viewer.camera().velocity(), CAM_FORWARD);
        viewer.on_key(key(KeyCode::W, false));
        assert_eq!(viewer.camera().velocity(), Vec3::ZERO);
    }

    #[test]
    fn command_keys() {
        let start = Instant::now();
        let (mut viewer, _receiver) = started(start);
        viewer.on_key(key(KeyCode::W, true));
        viewer.on_frame(start + Duration::from_millis(1000));
        assert!(viewer.camera().position().y > 0.0);

        viewer.on_key(key(KeyCode::C, true));
        assert_eq!(viewer.camera().position(), Vec3::ZERO);

        viewer.on_frame(start + Duration::from_millis(3000));
        assert_eq!(time_uniform(&viewer), Some(UniformValue::Float(3.0)));
        viewer.on_key(key(KeyCode::T, true));
        viewer.on_frame(start + Duration::from_millis(3016));
        assert_eq!(time_uniform(&viewer), Some(UniformValue::Float(0.0)));

        assert_eq!(viewer.on_key(key(KeyCode::O, true)), KeyResponse::OpenShader);
        assert_eq!(viewer.on_key(key(KeyCode::Other, true)), KeyResponse::Ignored);
    }

    #[test]
    fn first_pointer_move_after_release_only_anchors() {
        let start = Instant::now();
        let (mut viewer, _receiver) = started(start);
        viewer.on_pointer_move(100.0, 100.0);
        assert_eq!(viewer.camera().yaw(), 0.0);
        viewer.on_pointer_move(110.0, 100.0);
        assert!((viewer.camera().yaw() + 4.0_f32.to_radians()).abs() < 1e-6);

        viewer.on_pointer_release();
        let yaw = viewer.camera().yaw();
        viewer.on_pointer_move(500.0, 500.0);
        assert_eq!(viewer.camera().yaw(), yaw);
        assert_eq!(viewer.camera().pitch(), 0.0);
    }

    #[test]
    fn absent_uniforms_are_not_uploaded() {
        let start = Instant::now();
        let backend = RecordingBackend {
            absent_uniforms: vec![UniformName::Time, UniformName::CamPos],
            ..RecordingBackend::default()
        };
        let (mut viewer, _receiver) = viewer_with(backend, ViewerConfig::default(), start);
        viewer.on_init(start).expect("init");
        viewer.on_frame(start + Duration::from_millis(16));
        assert_eq!(viewer.backend().draws[0].uniforms.len(), 3);
        assert_eq!(time_uniform(&viewer), None);
    }

    #[test]
    fn surface_errors_map_to_status() {
        let start = Instant::now();
        let (mut viewer, _receiver) = started(start);
        viewer.backend.frame_errors.extend([
            FrameError::SurfaceLost,
            FrameError::Timeout,
            FrameError::OutOfMemory,
        ]);
        assert_eq!(
            viewer.on_frame(start + Duration::from_millis(16)),
            FrameStatus::Reconfigure
        );
        assert_eq!(
            viewer.on_frame(start + Duration::from_millis(32)),
            FrameStatus::Skipped
        );
        assert_eq!(
            viewer.on_frame(start + Duration::from_millis(48)),
            FrameStatus::Fatal(FrameError::OutOfMemory)
        );
    }

    #[test]
    fn teardown_releases_once() {
        let start = Instant::now();
        let (mut viewer, _receiver) = started(start);
        viewer.teardown();
        viewer.teardown();
        assert_eq!(viewer.backend().releases, 1);
        assert!(viewer.backend().live_units.is_empty());
        assert!(viewer.backend().live_programs.is_empty());
        assert_eq!(
            viewer.on_frame(start + Duration::from_millis(16)),
            FrameStatus::Skipped
        );
    }
}
