//! wgpu implementation of the backend traits.
//!
//! - `context` owns the instance/adapter/device/surface wiring and rebuilds the
//!   swapchain configuration on resize.
//! - `program` checks GLSL with naga and builds render pipelines under a
//!   validation error scope.
//! - `uniforms` mirrors the `SdfParams` block on the CPU.
//! - `timer` measures the draw pass with timestamp queries.

mod context;
mod program;
mod timer;
mod uniforms;

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::backend::{FrameBackend, FrameDraw, ProgramBackend, TimerPoll};
use crate::compile::{PARAMS_BINDING, PARAMS_GROUP};
use crate::error::FrameError;
use crate::quad::{aspect_uvs, QUAD_POSITIONS, QUAD_VERTEX_COUNT};
use crate::types::{ShaderStage, UniformLocation, UniformName};

use self::context::GpuContext;
use self::program::{PipelineTarget, DRAW_VERTICES};
use self::timer::FrameTimer;
use self::uniforms::SdfUniforms;

pub use self::program::{WgpuProgram, WgpuUnit};

// Fields drop in declaration order, so the context (device and surface) goes last.
struct GpuResources {
    pipeline_layout: wgpu::PipelineLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    position_buffer: wgpu::Buffer,
    uv_buffer: wgpu::Buffer,
    uniforms: SdfUniforms,
    timer: Option<FrameTimer>,
    context: GpuContext,
}

/// Renders into a window surface. Every GPU object lives in `resources`
/// until [`FrameBackend::release`] drops them.
pub struct WgpuBackend {
    resources: Option<GpuResources>,
}

impl WgpuBackend {
    pub fn new<T>(target: &T, size: PhysicalSize<u32>) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size)?;
        let device = &context.device;

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sdf params layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: PARAMS_BINDING,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sdf pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        let uniforms = SdfUniforms::default();
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sdf params"),
            contents: uniforms.as_bytes(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sdf params bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: PARAMS_BINDING,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let position_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad positions"),
            contents: bytemuck::cast_slice(&QUAD_POSITIONS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let initial_uvs =
            aspect_uvs(context.size.width, context.size.height).unwrap_or(QUAD_POSITIONS);
        let uv_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad uvs"),
            contents: bytemuck::cast_slice(&initial_uvs),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let timer = context
            .supports_timestamps
            .then(|| FrameTimer::new(&context.device, &context.queue));

        Ok(Self {
            resources: Some(GpuResources {
                pipeline_layout,
                uniform_buffer,
                uniform_bind_group,
                position_buffer,
                uv_buffer,
                uniforms,
                timer,
                context,
            }),
        })
    }
}

const RELEASED: &str = "GPU resources already released";

impl ProgramBackend for WgpuBackend {
    type Unit = WgpuUnit;
    type Program = WgpuProgram;

    fn compile_unit(&mut self, stage: ShaderStage, source: &str) -> Result<WgpuUnit, String> {
        if self.resources.is_none() {
            return Err(RELEASED.to_string());
        }
        program::compile_unit(stage, source)
    }

    fn link_program(
        &mut self,
        vertex: &WgpuUnit,
        fragments: &[&WgpuUnit],
    ) -> Result<WgpuProgram, String> {
        let resources = self.resources.as_ref().ok_or_else(|| RELEASED.to_string())?;
        let target = PipelineTarget {
            device: &resources.context.device,
            layout: &resources.pipeline_layout,
            format: resources.context.surface_format,
        };
        program::link_program(&target, vertex, fragments)
    }

    fn uniform_location(&self, program: &WgpuProgram, name: UniformName) -> Option<UniformLocation> {
        program.offset(name).map(UniformLocation)
    }

    fn destroy_unit(&mut self, unit: WgpuUnit) {
        drop(unit);
    }

    fn destroy_program(&mut self, program: WgpuProgram) {
        drop(program);
    }
}

impl FrameBackend for WgpuBackend {
    fn resize_surface(&mut self, width: u32, height: u32) {
        if let Some(resources) = self.resources.as_mut() {
            resources.context.resize(PhysicalSize::new(width, height));
        }
    }

    fn upload_uvs(&mut self, uvs: &[[f32; 2]; QUAD_VERTEX_COUNT]) {
        if let Some(resources) = self.resources.as_ref() {
            resources
                .context
                .queue
                .write_buffer(&resources.uv_buffer, 0, bytemuck::cast_slice(uvs));
        }
    }

    fn draw_frame(&mut self, frame: FrameDraw<'_, WgpuProgram>) -> Result<bool, FrameError> {
        let resources = self
            .resources
            .as_mut()
            .ok_or_else(|| FrameError::Other(RELEASED.to_string()))?;

        resources.uniforms.apply(frame.uniforms);
        resources.context.queue.write_buffer(
            &resources.uniform_buffer,
            0,
            resources.uniforms.as_bytes(),
        );

        let surface_texture = resources
            .context
            .surface
            .get_current_texture()
            .map_err(map_surface_error)?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            resources
                .context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("sdf frame"),
                });

        let measured = frame.measure
            && resources
                .timer
                .as_mut()
                .is_some_and(|timer| timer.open_window());
        {
            let timestamp_writes = if measured {
                resources.timer.as_ref().map(FrameTimer::timestamp_writes)
            } else {
                None
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sdf pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes,
            });
            pass.set_pipeline(&frame.program.pipeline);
            pass.set_bind_group(PARAMS_GROUP, &resources.uniform_bind_group, &[]);
            pass.set_vertex_buffer(0, resources.position_buffer.slice(..));
            pass.set_vertex_buffer(1, resources.uv_buffer.slice(..));
            pass.draw(0..DRAW_VERTICES, 0..1);
        }

        if measured {
            if let Some(timer) = resources.timer.as_ref() {
                timer.close_window(&mut encoder);
            }
        }
        resources
            .context
            .queue
            .submit(std::iter::once(encoder.finish()));
        if let Some(timer) = resources.timer.as_mut() {
            if measured {
                timer.submitted();
            } else {
                timer.abandon();
            }
        }
        surface_texture.present();
        Ok(measured)
    }

    fn poll_timer(&mut self) -> TimerPoll {
        match self.resources.as_mut() {
            Some(GpuResources {
                context,
                timer: Some(timer),
                ..
            }) => timer.poll(&context.device),
            Some(_) => TimerPoll::Unsupported,
            None => TimerPoll::Idle,
        }
    }

    fn release(&mut self) {
        let Some(resources) = self.resources.take() else {
            return;
        };
        if let Some(timer) = resources.timer.as_ref() {
            timer.destroy();
        }
        resources.uniform_buffer.destroy();
        resources.position_buffer.destroy();
        resources.uv_buffer.destroy();
        drop(resources);
        tracing::debug!("released GPU resources");
    }
}

fn map_surface_error(err: wgpu::SurfaceError) -> FrameError {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => FrameError::SurfaceLost,
        wgpu::SurfaceError::OutOfMemory => FrameError::OutOfMemory,
        wgpu::SurfaceError::Timeout => FrameError::Timeout,
        other => FrameError::Other(other.to_string()),
    }
}
