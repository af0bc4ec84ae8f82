// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use wgpu::{Limits, Trace};

use crate::imp::Error;
use crate::renderer::RenderSurface;

/// An opened device, plus the surface it was chosen for.
pub(super) struct Gpu {
    pub(super) surface: Option<wgpu::Surface<'static>>,
    pub(super) adapter: wgpu::Adapter,
    pub(super) device: wgpu::Device,
    pub(super) queue: wgpu::Queue,
}

pub(super) async fn open(target: &RenderSurface, atlas_size: u32) -> Result<Gpu, Error> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
    let surface = match target {
        RenderSurface::Offscreen { .. } => None,
        RenderSurface::Window(window) => {
            //the WindowSurface constructor makes the caller vouch for these handles
            let surface = unsafe {
                instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                    raw_display_handle: window.display_handle(),
                    raw_window_handle: window.window_handle(),
                })
            }?;
            Some(surface)
        }
    };
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: surface.as_ref(),
        })
        .await
        .map_err(|_| Error::NoSuchAdapter)?;
    logwise::info_sync!(
        "Using adapter {info}",
        info = logwise::privacy::LogIt(&adapter.get_info())
    );

    let mut limits = Limits::downlevel_webgl2_defaults();
    //webGL enforces these, and the defaults are small
    limits.max_texture_dimension_1d = 4096;
    limits.max_texture_dimension_2d = 4096;
    if atlas_size > limits.max_texture_dimension_2d {
        return Err(Error::AtlasTooLarge {
            size: atlas_size,
            limit: limits.max_texture_dimension_2d,
        });
    }
    let descriptor = wgpu::DeviceDescriptor {
        label: Some("smooth_canvas device"),
        required_features: Default::default(),
        required_limits: limits,
        memory_hints: Default::default(),
        trace: Trace::Off,
    };
    let (device, queue) = adapter.request_device(&descriptor).await?;
    Ok(Gpu {
        surface,
        adapter,
        device,
        queue,
    })
}
