use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{KeyCode as PhysicalCode, PhysicalKey};
use winit::window::WindowBuilder;

use tracing::{debug, error, info};

use crate::error::FrameError;
use crate::gpu::WgpuBackend;
use crate::surface::{FrameStatus, KeyCode, KeyInput, KeyResponse, RenderSurface};
use crate::telemetry::ViewerEvents;
use crate::types::{ViewerConfig, ViewerEvent};
use crate::viewer::SdfViewer;

/// Wheel units per scroll line, matching one 15 degree notch in eighths of a degree.
const WHEEL_UNITS_PER_LINE: f32 = 120.0;
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Commands delivered to the event loop from other threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowCommand {
    OpenShader(PathBuf),
}

/// Supplies a shader path chosen by the user.
///
/// Runs on its own thread, so implementations may block.
pub trait ShaderPicker: Send + 'static {
    /// Returns `None` when the user cancels.
    fn pick(&mut self) -> Option<PathBuf>;
}

/// Runs the picker on a background thread, one request at a time.
struct PickerThread {
    requests: Sender<()>,
}

impl PickerThread {
    fn spawn(
        mut picker: Box<dyn ShaderPicker>,
        proxy: EventLoopProxy<WindowCommand>,
    ) -> Result<Self> {
        let (requests, incoming) = bounded::<()>(1);
        thread::Builder::new()
            .name("sdfview-picker".into())
            .spawn(move || {
                for () in incoming.iter() {
                    let Some(path) = picker.pick() else {
                        debug!("shader selection cancelled");
                        continue;
                    };
                    if proxy.send_event(WindowCommand::OpenShader(path)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|err| anyhow!("failed to spawn picker thread: {err}"))?;
        Ok(Self { requests })
    }

    fn request(&self) {
        match self.requests.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => debug!("shader selection already in progress"),
            Err(TrySendError::Disconnected(())) => error!("shader picker thread has exited"),
        }
    }
}

/// Opens the viewer window and runs the event loop until it is closed.
///
/// Returns an error when no initial program can be built or when rendering
/// hits an unrecoverable surface error.
pub fn run(config: ViewerConfig, picker: Option<Box<dyn ShaderPicker>>) -> Result<()> {
    let event_loop = EventLoopBuilder::<WindowCommand>::with_user_event()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let proxy = event_loop.create_proxy();

    let (width, height) = config.surface_size;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(width, height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create viewer window: {err}"))?;
    let window = Arc::new(window);

    let size = window.inner_size();
    let backend = WgpuBackend::new(window.as_ref(), size)?;
    let title = config.title.clone();
    let (events, event_rx) = ViewerEvents::channel(EVENT_QUEUE_CAPACITY);
    let mut viewer = SdfViewer::new(
        backend,
        ViewerConfig {
            surface_size: (size.width, size.height),
            ..config
        },
        events,
        Instant::now(),
    );
    if let Err(err) = viewer.on_init(Instant::now()) {
        viewer.teardown();
        return Err(err.into());
    }
    info!(width = size.width, height = size.height, "viewer ready");

    let picker = picker
        .map(|picker| PickerThread::spawn(picker, proxy))
        .transpose()?;
    let (fatal_tx, fatal_rx) = bounded::<FrameError>(1);
    let mut primary_down = false;

    window.request_redraw();
    event_loop
        .run(move |event, elwt| match event {
            Event::UserEvent(WindowCommand::OpenShader(path)) => {
                info!(path = %path.display(), "opening shader");
                viewer.open_shader(path);
            }
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                WindowEvent::Resized(new_size) => {
                    viewer.on_resize(new_size.width, new_size.height);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    match viewer.on_key(key_input(&event)) {
                        KeyResponse::OpenShader => match picker.as_ref() {
                            Some(picker) => picker.request(),
                            None => debug!("no shader picker configured"),
                        },
                        KeyResponse::Handled | KeyResponse::Ignored => {}
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    if primary_down {
                        viewer.on_pointer_move(position.x, position.y);
                    }
                }
                WindowEvent::MouseInput {
                    state,
                    button: MouseButton::Left,
                    ..
                } => {
                    primary_down = state == ElementState::Pressed;
                    if !primary_down {
                        viewer.on_pointer_release();
                    }
                }
                WindowEvent::MouseWheel { delta, .. } => viewer.on_wheel(wheel_units(delta)),
                WindowEvent::RedrawRequested => {
                    match viewer.on_frame(Instant::now()) {
                        FrameStatus::Continue | FrameStatus::Skipped => {}
                        FrameStatus::Reconfigure => {
                            let size = window.inner_size();
                            viewer.on_resize(size.width, size.height);
                        }
                        FrameStatus::Fatal(err) => {
                            error!(error = %err, "rendering stopped");
                            let _ = fatal_tx.try_send(err);
                            elwt.exit();
                            return;
                        }
                    }
                    if let Some(microseconds) = latest_frame_time(&event_rx) {
                        window.set_title(&format!("{title} {microseconds} us"));
                    }
                    window.request_redraw();
                }
                _ => {}
            },
            Event::AboutToWait => {
                let now = Instant::now();
                viewer.on_timer(now);
                elwt.set_control_flow(ControlFlow::WaitUntil(viewer.next_reload_check()));
            }
            Event::LoopExiting => viewer.teardown(),
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))?;

    match fatal_rx.try_recv() {
        Ok(err) => Err(anyhow!(err).context("viewer stopped after a surface failure")),
        Err(_) => Ok(()),
    }
}

/// Drains pending notifications, returning the newest frame time.
fn latest_frame_time(events: &Receiver<ViewerEvent>) -> Option<u32> {
    events
        .try_iter()
        .filter_map(|event| match event {
            ViewerEvent::FrameTime { microseconds, .. } => Some(microseconds),
            ViewerEvent::Diagnostic { .. } => None,
        })
        .last()
}

fn key_input(event: &KeyEvent) -> KeyInput {
    KeyInput {
        code: key_code(event.physical_key),
        pressed: event.state == ElementState::Pressed,
        repeat: event.repeat,
    }
}

fn key_code(key: PhysicalKey) -> KeyCode {
    match key {
        PhysicalKey::Code(PhysicalCode::KeyW) => KeyCode::W,
        PhysicalKey::Code(PhysicalCode::KeyA) => KeyCode::A,
        PhysicalKey::Code(PhysicalCode::KeyS) => KeyCode::S,
        PhysicalKey::Code(PhysicalCode::KeyD) => KeyCode::D,
        PhysicalKey::Code(PhysicalCode::KeyQ) => KeyCode::Q,
        PhysicalKey::Code(PhysicalCode::KeyE) => KeyCode::E,
        PhysicalKey::Code(PhysicalCode::KeyC) => KeyCode::C,
        PhysicalKey::Code(PhysicalCode::KeyT) => KeyCode::T,
        PhysicalKey::Code(PhysicalCode::KeyO) => KeyCode::O,
        _ => KeyCode::Other,
    }
}

fn wheel_units(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, lines) => lines * WHEEL_UNITS_PER_LINE,
        MouseScrollDelta::PixelDelta(position) => position.y as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn movement_keys_map_by_position() {
        assert_eq!(key_code(PhysicalKey::Code(PhysicalCode::KeyW)), KeyCode::W);
        assert_eq!(key_code(PhysicalKey::Code(PhysicalCode::KeyO)), KeyCode::O);
        assert_eq!(key_code(PhysicalKey::Code(PhysicalCode::Space)), KeyCode::Other);
    }

    #[test]
    fn wheel_lines_convert_to_eighths_of_a_degree() {
        assert_eq!(wheel_units(MouseScrollDelta::LineDelta(0.0, 1.0)), 120.0);
        assert_eq!(wheel_units(MouseScrollDelta::LineDelta(0.0, -2.0)), -240.0);
        assert_eq!(
            wheel_units(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 36.0))),
            36.0
        );
    }

    #[test]
    fn title_shows_newest_frame_time() {
        let (mut events, receiver) = ViewerEvents::channel(8);
        events.frame_time(900);
        events.diagnostic("Program", "link failed");
        events.frame_time(1200);
        assert_eq!(latest_frame_time(&receiver), Some(1200));
        assert_eq!(latest_frame_time(&receiver), None);
    }
}
