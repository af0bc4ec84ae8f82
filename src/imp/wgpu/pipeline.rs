// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use wgpu::{
    BindGroupLayoutEntry, BindingType, BlendState, BufferBindingType, ColorTargetState,
    MultisampleState, PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology,
    RenderPipelineDescriptor, ShaderStages, TextureFormat, VertexBufferLayout, VertexState,
    VertexStepMode,
};

use crate::geometry::VERTEX_SIZE;

const SHADER: &str = r#"
struct Globals {
    interpolation: f32,
    texel_scale: f32,
    _pad0: f32,
    _pad1: f32,
}

@group(0) @binding(0) var<uniform> globals: Globals;
@group(0) @binding(1) var atlas: texture_2d<f32>;
@group(0) @binding(2) var atlas_sampler: sampler;

struct VertexIn {
    @location(0) position: vec2<f32>,
    @location(1) delta: vec2<f32>,
    @location(2) texel: vec2<i32>,
    @location(3) color: vec4<f32>,
}

struct VertexOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
}

@vertex
fn vs_main(v: VertexIn) -> VertexOut {
    var out: VertexOut;
    let p = v.position + v.delta * globals.interpolation;
    out.clip = vec4<f32>(p, 0.0, 1.0);
    out.uv = vec2<f32>(v.texel) * globals.texel_scale;
    out.color = v.color;
    return out;
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    let c = textureSample(atlas, atlas_sampler, in.uv) * in.color;
    if (c.a == 0.0) {
        discard;
    }
    return c;
}
"#;

/// Byte size of the `Globals` uniform.
pub(super) const GLOBALS_SIZE: u64 = 16;

const ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Sint16x2, 3 => Unorm8x4];

pub(super) fn globals_bytes(interpolation: f32, atlas_size: u32) -> [u8; GLOBALS_SIZE as usize] {
    let mut bytes = [0; GLOBALS_SIZE as usize];
    bytes[0..4].copy_from_slice(&interpolation.to_le_bytes());
    bytes[4..8].copy_from_slice(&(1.0 / atlas_size as f32).to_le_bytes());
    bytes
}

pub(super) struct QuadPipeline {
    pub(super) pipeline: wgpu::RenderPipeline,
    pub(super) bind_group_layout: wgpu::BindGroupLayout,
}

impl QuadPipeline {
    pub(super) fn new(device: &wgpu::Device, format: TextureFormat) -> QuadPipeline {
        let entries = [
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(GLOBALS_SIZE),
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad bind group"),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("quad pipeline"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quad shader"),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(SHADER)),
        });
        let buffers = [VertexBufferLayout {
            array_stride: VERTEX_SIZE as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }];
        let descriptor = RenderPipelineDescriptor {
            label: Some("quad pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                //negative scales flip winding
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(ColorTargetState {
                    format,
                    blend: Some(BlendState::ALPHA_BLENDING),
                    write_mask: Default::default(),
                })],
            }),
            multiview: None,
            cache: None,
        };
        let pipeline = device.create_render_pipeline(&descriptor);
        logwise::trace_sync!("Created quad pipeline");
        QuadPipeline {
            pipeline,
            bind_group_layout,
        }
    }
}
