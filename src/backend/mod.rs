//! `wgpu` implementation of the [`CommandRecorder`](crate::CommandRecorder) seam.
//!
//! A [`WgpuBackend`] lives as long as the device. Each camera frame borrows it as a
//! [`WgpuRecorder`] bound to a command encoder, the camera's color target and the host's
//! [`SceneRenderer`]:
//!
//! ```no_run
//! # use gilight2d::*;
//! # use gilight2d::backend::*;
//! # fn frame(gpu: &GpuContext, backend: &mut WgpuBackend, gi: &mut GiLightFeature<GpuTexture>,
//! #          scene: &mut dyn SceneRenderer, view: &wgpu::TextureView) -> gilight2d::Result<()> {
//! let mut encoder = gpu.device.create_command_encoder(&Default::default());
//! let camera = CameraContext::new(CameraKind::Game, gpu.width(), gpu.height(), 5.0);
//! let target = CameraTarget {
//!     view,
//!     format: gpu.config.format,
//!     size: camera.target_size,
//! };
//!
//! let mut recorder = backend.recorder(&gpu.device, &gpu.queue, &mut encoder, target, scene);
//! let result = gi.record_frame(&camera, &mut recorder);
//! recorder.finish();
//! result?;
//! gpu.queue.submit(std::iter::once(encoder.finish()));
//! # Ok(())
//! # }
//! ```

mod pool;
mod programs;
mod recorder;
mod texture;

pub use pool::{PooledTexture, TexturePool};
pub use programs::{ProgramLibrary, ProgramUniforms, entry_point};
pub use recorder::{CameraTarget, SceneRenderer, SceneTarget, WgpuBackend, WgpuRecorder};
pub use texture::GpuTexture;

use crate::targets::PixelFormat;

/// Depth-stencil format of the scene capture pass.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// The `wgpu` format for a pipeline pixel format.
pub fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        PixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        PixelFormat::Depth24Stencil8 => DEPTH_FORMAT,
    }
}
