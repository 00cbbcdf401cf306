use std::borrow::Cow;

use wgpu::naga::{self, ShaderStage as NagaStage};

use crate::compile::{
    check_base, check_glsl, check_user_fragment, link_fragment, sanitize_user_fragment,
    uniform_offset,
};
use crate::quad::QUAD_VERTEX_COUNT;
use crate::types::{ShaderStage, UniformName};

/// A compiled unit. Every unit is checked when compiled; fragment units keep
/// their text so the base unit can splice the user unit in at link time.
pub enum WgpuUnit {
    Vertex(naga::Module),
    Base { header: String, footer: String },
    User { source: String },
}

/// A linked render pipeline plus the reflected uniform offsets.
pub struct WgpuProgram {
    pub(crate) pipeline: wgpu::RenderPipeline,
    offsets: [Option<u32>; UniformName::ALL.len()],
}

impl WgpuProgram {
    pub(crate) fn offset(&self, name: UniformName) -> Option<u32> {
        self.offsets[name.index()]
    }
}

pub(crate) fn compile_unit(stage: ShaderStage, source: &str) -> Result<WgpuUnit, String> {
    match stage {
        ShaderStage::Vertex => check_glsl(NagaStage::Vertex, source).map(WgpuUnit::Vertex),
        ShaderStage::FragBase => {
            check_base(source).map(|(header, footer)| WgpuUnit::Base { header, footer })
        }
        ShaderStage::Fragment => {
            let source = sanitize_user_fragment(source);
            if source.trim().is_empty() {
                return Err("shader source is empty".to_string());
            }
            check_user_fragment(&source)?;
            Ok(WgpuUnit::User { source })
        }
    }
}

pub(crate) struct PipelineTarget<'a> {
    pub device: &'a wgpu::Device,
    pub layout: &'a wgpu::PipelineLayout,
    pub format: wgpu::TextureFormat,
}

pub(crate) fn link_program(
    target: &PipelineTarget<'_>,
    vertex: &WgpuUnit,
    fragments: &[&WgpuUnit],
) -> Result<WgpuProgram, String> {
    let WgpuUnit::Vertex(vertex_module) = vertex else {
        return Err("program must start with a vertex unit".to_string());
    };
    let mut base = None;
    let mut users = Vec::with_capacity(fragments.len());
    for unit in fragments {
        match unit {
            WgpuUnit::Base { header, footer } if base.is_none() => {
                base = Some((header.as_str(), footer.as_str()))
            }
            WgpuUnit::Base { .. } => return Err("more than one base fragment unit".to_string()),
            WgpuUnit::User { source } => users.push(source.as_str()),
            WgpuUnit::Vertex(_) => return Err("vertex unit in fragment list".to_string()),
        }
    }
    let Some((header, footer)) = base else {
        return Err("program has no base fragment unit".to_string());
    };
    let fragment_module = link_fragment(header, &users, footer)?;

    let mut offsets = [None; UniformName::ALL.len()];
    for name in UniformName::ALL {
        offsets[name.index()] = uniform_offset(&fragment_module, name)
            .or_else(|| uniform_offset(vertex_module, name));
    }

    let pipeline = build_pipeline(target, vertex_module.clone(), fragment_module)?;
    Ok(WgpuProgram { pipeline, offsets })
}

const QUAD_ATTRIBUTES: [[wgpu::VertexAttribute; 1]; 2] = [
    wgpu::vertex_attr_array![0 => Float32x2],
    wgpu::vertex_attr_array![1 => Float32x2],
];

fn build_pipeline(
    target: &PipelineTarget<'_>,
    vertex: naga::Module,
    fragment: naga::Module,
) -> Result<wgpu::RenderPipeline, String> {
    let device = target.device;
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("sdf vertex"),
        source: wgpu::ShaderSource::Naga(Cow::Owned(vertex)),
    });
    let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("sdf fragment"),
        source: wgpu::ShaderSource::Naga(Cow::Owned(fragment)),
    });

    let stride = std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress;
    let buffers = [
        wgpu::VertexBufferLayout {
            array_stride: stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &QUAD_ATTRIBUTES[0],
        },
        wgpu::VertexBufferLayout {
            array_stride: stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &QUAD_ATTRIBUTES[1],
        },
    ];

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("sdf pipeline"),
        layout: Some(target.layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some("main"),
            buffers: &buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target.format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });

    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(err.to_string()),
        None => Ok(pipeline),
    }
}

/// Number of vertices drawn per frame.
pub(crate) const DRAW_VERTICES: u32 = QUAD_VERTEX_COUNT as u32;
