//! GPU device setup for the `wgpu` backend.
//!
//! [`GpuContext`] owns the device, the queue and, when rendering to a window, the surface.
//! A headless context (no surface) is enough to record GI frames into offscreen targets.
//!
//! ```no_run
//! use gilight2d::GpuContext;
//!
//! let gpu = GpuContext::headless(640, 360)?;
//! println!("{}x{} (aspect: {})", gpu.width(), gpu.height(), gpu.aspect());
//! # Ok::<(), gilight2d::GiError>(())
//! ```

use std::sync::Arc;

use winit::window::Window;

use crate::error::{GiError, Result};

/// Device, queue and the (optional) presentation surface.
///
/// `config` describes the camera target either way: the surface configuration when a
/// window is attached, the offscreen target format and size otherwise.
pub struct GpuContext {
    /// The window surface; `None` for headless contexts.
    pub surface: Option<wgpu::Surface<'static>>,
    /// The logical device for creating GPU resources.
    pub device: wgpu::Device,
    /// Command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Format and size of the camera target.
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Creates a context presenting to `window`.
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        let instance = Self::instance();
        let surface = instance.create_surface(window)?;

        let adapter = Self::adapter(&instance, Some(&surface))?;
        let (device, queue) = Self::device(&adapter)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| GiError::AdapterRequestFailed("surface has no formats".into()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        log::info!(
            "GPU ready: {} ({:?}), surface {:?}",
            adapter.get_info().name,
            adapter.get_info().backend,
            surface_format
        );

        Ok(Self {
            surface: Some(surface),
            device,
            queue,
            config,
        })
    }

    /// Creates a context without a window, for offscreen rendering.
    pub fn headless(width: u32, height: u32) -> Result<Self> {
        let instance = Self::instance();
        let adapter = Self::adapter(&instance, None)?;
        let (device, queue) = Self::device(&adapter)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        log::info!("Headless GPU ready: {}", adapter.get_info().name);

        Ok(Self {
            surface: None,
            device,
            queue,
            config,
        })
    }

    fn instance() -> wgpu::Instance {
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        })
    }

    fn adapter(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<wgpu::Adapter> {
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: surface,
            force_fallback_adapter: false,
        }))
        .map_err(|err| GiError::AdapterRequestFailed(err.to_string()))
    }

    fn device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
        // Rgba32Float targets are sampled with a filtering sampler
        let required_features = adapter.features() & wgpu::Features::FLOAT32_FILTERABLE;
        let device = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("GI Device"),
            required_features,
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))?;
        Ok(device)
    }

    /// Resizes the surface. Zero sizes (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            if let Some(surface) = &self.surface {
                surface.configure(&self.device, &self.config);
            }
        }
    }

    /// Returns the current camera target width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Returns the current camera target height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Returns width divided by height.
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }
}
