// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The wgpu backend.

One render pipeline, one atlas texture, one vertex buffer sized for the largest
geometry the main side can produce.  Each frame writes the interpolation scalar
into a small uniform, then draws the whole vertex buffer as a triangle list.
*/

mod device;
mod pipeline;

use crate::atlas::AtlasPatch;
use crate::geometry::{Endian, QUAD_SIZE, VERTEX_SIZE, decode_vertices};
use crate::imp::{Backend, BackendFactory, Error};
use crate::renderer::RenderSurface;
use pipeline::{GLOBALS_SIZE, QuadPipeline, globals_bytes};

/// Offscreen targets use this format.
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

enum Target {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

fn offscreen_target(device: &wgpu::Device, width: u32, height: u32) -> Target {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen target"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Target::Offscreen { texture, view }
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: Target,
    pipeline: QuadPipeline,
    bind_group: wgpu::BindGroup,
    globals: wgpu::Buffer,
    atlas: wgpu::Texture,
    atlas_size: u32,
    vertices: wgpu::Buffer,
    vertex_capacity: u32,
    draw_length: u32,
    scratch: Vec<u8>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("atlas_size", &self.atlas_size)
            .field("vertex_capacity", &self.vertex_capacity)
            .field("draw_length", &self.draw_length)
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    pub async fn new(surface: RenderSurface, atlas_size: u32, max_quads: usize) -> Result<Self, Error> {
        let (width, height) = surface.size();
        let gpu = device::open(&surface, atlas_size).await?;
        let device = gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let (target, format) = match gpu.surface {
            Some(wgpu_surface) => {
                let capabilities = wgpu_surface.get_capabilities(&gpu.adapter);
                //atlas texels go to the screen as-is, like a 2d canvas
                let format = capabilities
                    .formats
                    .iter()
                    .copied()
                    .find(|f| !f.is_srgb())
                    .or_else(|| capabilities.formats.first().copied())
                    .ok_or(Error::UnsupportedSurface)?;
                let config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format,
                    width: width.max(1),
                    height: height.max(1),
                    present_mode: wgpu::PresentMode::Fifo,
                    desired_maximum_frame_latency: 1,
                    alpha_mode: wgpu::CompositeAlphaMode::Opaque,
                    view_formats: vec![],
                };
                wgpu_surface.configure(&device, &config);
                (
                    Target::Surface {
                        surface: wgpu_surface,
                        config,
                    },
                    format,
                )
            }
            None => (offscreen_target(&device, width, height), OFFSCREEN_FORMAT),
        };

        let atlas = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("atlas"),
            size: wgpu::Extent3d {
                width: atlas_size,
                height: atlas_size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let atlas_view = atlas.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("atlas sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 0.0,
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        });
        let globals = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals"),
            size: GLOBALS_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let vertex_bytes = (max_quads * QUAD_SIZE) as u64;
        let vertices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quad vertices"),
            size: vertex_bytes.max(VERTEX_SIZE as u64),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let pipeline = QuadPipeline::new(&device, format);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad bind group"),
            layout: &pipeline.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&atlas_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });
        if let Some(error) = device.pop_error_scope().await {
            return Err(Error::Validation(error.to_string()));
        }
        logwise::info_sync!(
            "wgpu backend ready: {format} target, {atlas}px atlas",
            format = logwise::privacy::LogIt(&format),
            atlas = atlas_size
        );
        Ok(WgpuBackend {
            device,
            queue: gpu.queue,
            target,
            pipeline,
            bind_group,
            globals,
            atlas,
            atlas_size,
            vertices,
            vertex_capacity: (vertex_bytes / VERTEX_SIZE as u64) as u32,
            draw_length: 0,
            scratch: Vec::new(),
        })
    }

    fn encode_pass(&self, view: &wgpu::TextureView) -> wgpu::CommandBuffer {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quads"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if self.draw_length > 0 {
                pass.set_pipeline(&self.pipeline.pipeline);
                pass.set_bind_group(0, &self.bind_group, &[]);
                pass.set_vertex_buffer(
                    0,
                    self.vertices
                        .slice(..self.draw_length as u64 * VERTEX_SIZE as u64),
                );
                pass.draw(0..self.draw_length, 0..1);
            }
        }
        encoder.finish()
    }
}

/// A factory for [WgpuBackend].  `max_quads` sizes the vertex buffer.
pub fn factory(max_quads: usize) -> BackendFactory {
    Box::new(move |surface, atlas_size| {
        let backend = test_executors::spin_on(WgpuBackend::new(surface, atlas_size, max_quads))?;
        Ok(Box::new(backend) as Box<dyn Backend>)
    })
}

impl Backend for WgpuBackend {
    fn write_atlas(&mut self, patch: &AtlasPatch) -> Result<(), Error> {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.atlas,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: patch.x,
                    y: patch.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &patch.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(patch.width * 4),
                rows_per_image: Some(patch.height),
            },
            wgpu::Extent3d {
                width: patch.width,
                height: patch.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn load_geometry(&mut self, bytes: &[u8], vertex_count: u32, endian: Endian) -> Result<(), Error> {
        if vertex_count > self.vertex_capacity {
            return Err(Error::TooManyVertices {
                vertex_count,
                capacity: self.vertex_capacity,
            });
        }
        if vertex_count > 0 {
            match endian {
                //vertex attributes are read little-endian
                Endian::Little => self.queue.write_buffer(&self.vertices, 0, bytes),
                Endian::Big => {
                    let decoded = decode_vertices(bytes, vertex_count, endian)?;
                    self.scratch.clear();
                    self.scratch.resize(bytes.len(), 0);
                    for (vertex, out) in decoded.iter().zip(self.scratch.chunks_exact_mut(VERTEX_SIZE)) {
                        vertex.write(out, Endian::Little);
                    }
                    self.queue.write_buffer(&self.vertices, 0, &self.scratch);
                }
            }
        }
        self.draw_length = vertex_count;
        Ok(())
    }

    fn render(&mut self, interpolation: f32) -> Result<(), Error> {
        let _perf = logwise::perfwarn_begin!("wgpu render frame");
        self.queue
            .write_buffer(&self.globals, 0, &globals_bytes(interpolation, self.atlas_size));
        match &self.target {
            Target::Surface { surface, config } => {
                let frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                        surface.configure(&self.device, config);
                        surface.get_current_texture()?
                    }
                    Err(e) => return Err(e.into()),
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let commands = self.encode_pass(&view);
                self.queue.submit(std::iter::once(commands));
                frame.present();
            }
            Target::Offscreen { view, .. } => {
                let commands = self.encode_pass(view);
                self.queue.submit(std::iter::once(commands));
            }
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        match &mut self.target {
            Target::Surface { surface, config } => {
                config.width = width.max(1);
                config.height = height.max(1);
                surface.configure(&self.device, config);
            }
            Target::Offscreen { texture, .. } => {
                if texture.width() != width.max(1) || texture.height() != height.max(1) {
                    self.target = offscreen_target(&self.device, width, height);
                }
            }
        }
        logwise::trace_sync!(
            "Resized render target to {width}x{height}",
            width = width,
            height = height
        );
        Ok(())
    }
}
