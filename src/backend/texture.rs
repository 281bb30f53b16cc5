//! Long-lived sampled textures.
//!
//! Unlike the pooled render targets these are created once, uploaded from the CPU and
//! only ever sampled: the generated noise texture and the 1x1 fallback inputs bound to
//! any texture property a draw leaves unset.

use glam::UVec2;
use wgpu::util::DeviceExt;

use crate::error::{GiError, Result};

/// A texture that lives across frames: the noise texture and the fallback inputs.
#[derive(Debug, Clone)]
pub struct GpuTexture {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// Default view, bound through the shared texture slots of the program layout.
    pub view: wgpu::TextureView,
    /// Size in texels.
    pub size: UVec2,
}

impl GpuTexture {
    /// Uploads a single-channel texture. Sampling wraps and filters through the noise
    /// sampler of the program library.
    ///
    /// # Arguments
    ///
    /// * `device` - Device the texture is created on
    /// * `queue` - Queue used for the initial upload
    /// * `size` - Texture size in texels; both sides must be within the device limit
    /// * `texels` - Exactly `size.x * size.y` bytes, row by row
    /// * `label` - Debug label for the texture
    ///
    /// # Errors
    ///
    /// [`GiError::TextureCreation`] when the size is out of range or `texels` has the
    /// wrong length.
    pub fn from_r8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        size: UVec2,
        texels: &[u8],
        label: &str,
    ) -> Result<Self> {
        Self::upload(device, queue, size, texels, wgpu::TextureFormat::R8Unorm, label)
    }

    /// A 1x1 texture of one RGBA color.
    pub fn solid(device: &wgpu::Device, queue: &wgpu::Queue, rgba: [u8; 4], label: &str) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &Self::descriptor(UVec2::ONE, wgpu::TextureFormat::Rgba8Unorm, label),
            wgpu::util::TextureDataOrder::LayerMajor,
            &rgba,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            size: UVec2::ONE,
        }
    }

    fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        size: UVec2,
        texels: &[u8],
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Result<Self> {
        let max = device.limits().max_texture_dimension_2d;
        if size.x == 0 || size.y == 0 || size.x > max || size.y > max {
            return Err(GiError::TextureCreation(format!(
                "{label}: {}x{} outside 1..={max}",
                size.x, size.y
            )));
        }
        let texel_size = format.block_copy_size(None).unwrap_or(1) as usize;
        let expected = size.x as usize * size.y as usize * texel_size;
        if texels.len() != expected {
            return Err(GiError::TextureCreation(format!(
                "{label}: expected {expected} bytes, got {}",
                texels.len()
            )));
        }

        let texture = device.create_texture_with_data(
            queue,
            &Self::descriptor(size, format, label),
            wgpu::util::TextureDataOrder::LayerMajor,
            texels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            texture,
            view,
            size,
        })
    }

    fn descriptor(size: UVec2, format: wgpu::TextureFormat, label: &str) -> wgpu::TextureDescriptor<'_> {
        wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        }
    }
}
