//! Transient texture pool.

use std::collections::{HashMap, HashSet};

use crate::backend::texture_format;
use crate::targets::{BindSlot, TargetDescriptor};

/// A pooled texture and its default view.
pub struct PooledTexture {
    /// The render target texture.
    pub texture: wgpu::Texture,
    /// A view used both as color attachment and as sampled input.
    pub view: wgpu::TextureView,
    /// The descriptor the texture was created for. It is also its free-list key.
    pub desc: TargetDescriptor,
}

/// Hands out render targets by descriptor and takes them back on release.
///
/// Textures are never destroyed between frames: a released texture waits in the free list
/// of its descriptor and is handed out again by the next matching acquire. Resizing the
/// window therefore leaves textures of the old size behind; [`trim`](Self::trim) drops them.
///
/// A published texture must keep its contents after the frame that wrote it. Marking its
/// slot with [`hold`](Self::hold) keeps it out of the free list on release; it is handed
/// back only to the next acquire of that same slot.
#[derive(Default)]
pub struct TexturePool {
    free: HashMap<TargetDescriptor, Vec<PooledTexture>>,
    live: HashMap<BindSlot, PooledTexture>,
    /// Slots to hold back on their next release.
    holds: HashSet<BindSlot>,
    /// Released textures still published under their slot.
    held: HashMap<BindSlot, PooledTexture>,
    created: usize,
}

impl TexturePool {
    /// Creates an empty pool. Textures are created lazily by [`acquire`](Self::acquire).
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a texture matching `desc` to `slot`, reusing a free one when possible.
    ///
    /// A texture held for `slot` is preferred over the free list. Acquiring a slot that is
    /// still live logs an error and recycles the old texture first.
    ///
    /// # Arguments
    ///
    /// * `device` - Device used when no free texture matches
    /// * `slot` - The slot draws will address the texture by
    /// * `desc` - Size, format and sample count of the target
    pub fn acquire(&mut self, device: &wgpu::Device, slot: BindSlot, desc: &TargetDescriptor) {
        if let Some(previous) = self.live.remove(&slot) {
            log::error!("{slot} acquired while still live");
            self.free.entry(previous.desc).or_default().push(previous);
        }

        let reused = self
            .take_held(slot, desc)
            .or_else(|| self.free.get_mut(desc).and_then(Vec::pop));
        let texture = match reused {
            Some(texture) => texture,
            None => {
                self.created += 1;
                log::debug!(
                    "Creating {}x{} {:?} target for {slot}",
                    desc.width,
                    desc.height,
                    desc.format
                );
                Self::create(device, desc)
            }
        };
        self.live.insert(slot, texture);
    }

    /// The texture held for `slot`, when it still matches `desc`. A stale one is freed.
    fn take_held(&mut self, slot: BindSlot, desc: &TargetDescriptor) -> Option<PooledTexture> {
        let texture = self.held.remove(&slot)?;
        if texture.desc == *desc {
            return Some(texture);
        }
        self.free.entry(texture.desc).or_default().push(texture);
        None
    }

    fn create(device: &wgpu::Device, desc: &TargetDescriptor) -> PooledTexture {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("GI Transient Target"),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: desc.sample_count.max(1),
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        PooledTexture {
            texture,
            view,
            desc: *desc,
        }
    }

    /// Keeps the texture behind `slot` out of the free list on its next release.
    pub fn hold(&mut self, slot: BindSlot) {
        self.holds.insert(slot);
    }

    /// Returns the texture behind `slot` to the free list, or holds it back when
    /// [`hold`](Self::hold) was called since it was acquired.
    ///
    /// Returns `true` when the texture was held.
    pub fn release(&mut self, slot: BindSlot) -> bool {
        let Some(texture) = self.live.remove(&slot) else {
            log::warn!("{slot} released but not live");
            return false;
        };
        if self.holds.remove(&slot) {
            self.held.insert(slot, texture);
            true
        } else {
            self.free.entry(texture.desc).or_default().push(texture);
            false
        }
    }

    /// Number of released textures held back for their slot.
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// The live texture bound to `slot`.
    pub fn get(&self, slot: BindSlot) -> Option<&PooledTexture> {
        self.live.get(&slot)
    }

    /// The view of the live texture bound to `slot`.
    pub fn view(&self, slot: BindSlot) -> Option<&wgpu::TextureView> {
        self.live.get(&slot).map(|texture| &texture.view)
    }

    /// Whether `slot` is acquired and not yet released.
    pub fn is_live(&self, slot: BindSlot) -> bool {
        self.live.contains_key(&slot)
    }

    /// Number of acquired textures. Zero between frames.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of released textures waiting for reuse, over all descriptors.
    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Textures created over the pool's lifetime.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Checks that every texture acquired this frame was released.
    ///
    /// Leaked targets are a programming error: this panics in debug builds and logs and
    /// reclaims them otherwise. Returns the number of leaked targets.
    pub fn end_frame(&mut self) -> usize {
        let leaked = self.live.len();
        debug_assert!(
            leaked == 0,
            "transient targets leaked: {:?}",
            self.live.keys().collect::<Vec<_>>()
        );
        if leaked > 0 {
            log::error!("{leaked} transient targets leaked this frame, reclaiming");
            for (_, texture) in self.live.drain() {
                self.free.entry(texture.desc).or_default().push(texture);
            }
        }
        leaked
    }

    /// Drops every free texture whose descriptor is not `keep`. Held textures stay.
    pub fn trim(&mut self, keep: Option<&TargetDescriptor>) {
        self.free.retain(|desc, _| Some(desc) == keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::GpuContext;
    use crate::targets::{PixelFormat, ids};

    /// A device when the machine has an adapter; these tests are skipped otherwise.
    fn device() -> Option<wgpu::Device> {
        match GpuContext::headless(4, 4) {
            Ok(gpu) => Some(gpu.device),
            Err(err) => {
                eprintln!("skipping pool test without a GPU: {err}");
                None
            }
        }
    }

    fn desc(size: u32) -> TargetDescriptor {
        TargetDescriptor::new(size, size, PixelFormat::Rgba16Float)
    }

    #[test]
    fn released_textures_are_reused_by_any_slot() {
        let Some(device) = device() else { return };
        let mut pool = TexturePool::new();

        pool.acquire(&device, ids::GI_RESULT_TEX, &desc(8));
        assert!(!pool.release(ids::GI_RESULT_TEX));
        pool.acquire(&device, ids::OBJECTS_TEX, &desc(8));

        assert_eq!(pool.created(), 1);
        assert!(!pool.release(ids::OBJECTS_TEX));
        assert_eq!(pool.end_frame(), 0);
    }

    #[test]
    fn held_output_survives_the_next_frame() {
        let Some(device) = device() else { return };
        let mut pool = TexturePool::new();
        let output = BindSlot::named("_GiTex");

        pool.acquire(&device, output, &desc(8));
        pool.hold(output);
        assert!(pool.release(output));
        assert_eq!((pool.held_count(), pool.free_count()), (1, 0));

        // Next frame: scene capture must not get the published texture
        pool.acquire(&device, ids::OBJECTS_TEX, &desc(8));
        assert_eq!(pool.created(), 2);
        pool.acquire(&device, output, &desc(8));
        assert_eq!(pool.created(), 2);
        assert_eq!(pool.held_count(), 0);

        pool.release(ids::OBJECTS_TEX);
        // Not published again this frame
        assert!(!pool.release(output));
        assert_eq!((pool.held_count(), pool.free_count()), (0, 2));
    }

    #[test]
    fn stale_held_texture_is_freed_on_resize() {
        let Some(device) = device() else { return };
        let mut pool = TexturePool::new();
        let output = BindSlot::named("_GiTex");

        pool.acquire(&device, output, &desc(8));
        pool.hold(output);
        pool.release(output);
        pool.acquire(&device, output, &desc(16));

        assert_eq!(pool.held_count(), 0);
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.created(), 2);
    }
}
