//! [`CommandRecorder`] over a `wgpu` command encoder.

use std::collections::HashMap;

use glam::UVec2;
use wgpu::util::DeviceExt;

use crate::backend::programs::{ProgramLibrary, ProgramUniforms};
use crate::backend::texture::GpuTexture;
use crate::backend::{DEPTH_FORMAT, TexturePool, texture_format};
use crate::error::{GiError, Result};
use crate::material::Material;
use crate::recorder::{CommandRecorder, RenderDest, SceneDraw};
use crate::targets::{BindSlot, TargetDescriptor, ids};

/// Format and size of the target a scene draw renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTarget {
    /// Color format the scene pipeline must be built for.
    pub format: wgpu::TextureFormat,
    /// Target size in pixels.
    pub size: UVec2,
    /// Set when the pass has a depth-stencil attachment.
    pub depth_format: Option<wgpu::TextureFormat>,
}

/// The host side of scene capture: draws light sources and occluders.
///
/// Emissive objects write their light color, occluders write black, and both write a
/// non-zero alpha. Empty space must stay at zero alpha.
pub trait SceneRenderer {
    /// Draws the scene into `pass`, which is already cleared to transparent black.
    ///
    /// # Arguments
    ///
    /// * `pass` - The open render pass over the capture target
    /// * `draw` - What to capture. `draw.capture_scale` is the world extent of the target
    ///   relative to the camera view; a renderer with a border must shrink its projection
    ///   by it so the camera view lands in the center of the target
    /// * `target` - Format and size of the attachment, for pipeline selection
    fn render(&mut self, pass: &mut wgpu::RenderPass<'_>, draw: &SceneDraw<'_>, target: SceneTarget);
}

/// The camera color target of a frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraTarget<'a> {
    /// The view the final composite renders into, usually the surface texture.
    pub view: &'a wgpu::TextureView,
    /// Format of `view`.
    pub format: wgpu::TextureFormat,
    /// Size of `view` in pixels.
    pub size: UVec2,
}

/// State that outlives frames: programs, pooled targets, published textures.
pub struct WgpuBackend {
    programs: ProgramLibrary,
    pool: TexturePool,
    fallback: GpuTexture,
    /// Published name to the slot it was published from and its view.
    published: HashMap<BindSlot, (BindSlot, wgpu::TextureView)>,
    depth: Option<(UVec2, wgpu::TextureView)>,
}

impl WgpuBackend {
    /// Compiles the programs and creates the fallback texture. Pipelines and targets are
    /// created on first use.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            programs: ProgramLibrary::new(device),
            pool: TexturePool::new(),
            fallback: GpuTexture::solid(device, queue, [0, 0, 0, 0], "GI Fallback Texture"),
            published: HashMap::new(),
            depth: None,
        }
    }

    /// Starts recording one camera frame into `encoder`.
    ///
    /// The returned recorder borrows the backend for the frame. Submitting `encoder` is up
    /// to the caller.
    ///
    /// # Arguments
    ///
    /// * `device` - Device for pipelines, bind groups and uniform buffers
    /// * `queue` - Queue the scene renderer and the pool may upload through
    /// * `encoder` - Encoder every pass of the frame is recorded into
    /// * `camera` - The camera color target
    /// * `scene` - Draws the scene when the frame captures it
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut encoder = gpu.device.create_command_encoder(&Default::default());
    /// let mut recorder = backend.recorder(&gpu.device, &gpu.queue, &mut encoder, camera, &mut scene);
    /// feature.record_frame(&mut recorder, &camera_context)?;
    /// backend.pool_mut().end_frame();
    /// gpu.queue.submit(Some(encoder.finish()));
    /// ```
    pub fn recorder<'a>(
        &'a mut self,
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        encoder: &'a mut wgpu::CommandEncoder,
        camera: CameraTarget<'a>,
        scene: &'a mut dyn SceneRenderer,
    ) -> WgpuRecorder<'a> {
        WgpuRecorder {
            backend: self,
            device,
            queue,
            encoder,
            camera,
            scene,
            globals: HashMap::new(),
            draws: 0,
        }
    }

    /// The texture last published under `name`, for stages running after the GI passes.
    pub fn global_texture(&self, name: &str) -> Option<&wgpu::TextureView> {
        self.published
            .get(&BindSlot::named(name))
            .map(|(_, view)| view)
    }

    /// The transient target pool.
    pub fn pool(&self) -> &TexturePool {
        &self.pool
    }

    /// Mutable pool access, for [`TexturePool::end_frame`] and [`TexturePool::trim`].
    pub fn pool_mut(&mut self) -> &mut TexturePool {
        &mut self.pool
    }

    /// The compiled programs and their pipeline cache.
    pub fn programs(&self) -> &ProgramLibrary {
        &self.programs
    }

    fn depth_view(&mut self, device: &wgpu::Device, size: UVec2) -> wgpu::TextureView {
        if let Some((current, view)) = &self.depth {
            if *current == size {
                return view.clone();
            }
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("GI Scene Depth"),
            size: wgpu::Extent3d {
                width: size.x.max(1),
                height: size.y.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.depth = Some((size, view.clone()));
        view
    }
}

enum Global {
    Slot(BindSlot),
    External(wgpu::TextureView),
}

/// Records one camera frame. Call [`finish`](Self::finish) when the frame is recorded.
pub struct WgpuRecorder<'a> {
    backend: &'a mut WgpuBackend,
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    encoder: &'a mut wgpu::CommandEncoder,
    camera: CameraTarget<'a>,
    scene: &'a mut dyn SceneRenderer,
    globals: HashMap<BindSlot, Global>,
    draws: u32,
}

impl WgpuRecorder<'_> {
    /// Render passes recorded so far.
    pub fn draws(&self) -> u32 {
        self.draws
    }

    /// Ends the frame and checks that every transient target was released.
    /// Returns the number of leaked targets.
    pub fn finish(self) -> usize {
        self.backend.pool.end_frame()
    }

    fn input(&self, material: &Material, id: BindSlot) -> Result<wgpu::TextureView> {
        let pool = &self.backend.pool;
        if let Some(slot) = material.texture(id) {
            return pool
                .view(slot)
                .cloned()
                .ok_or_else(|| GiError::UnboundTexture(slot.to_string()));
        }
        let view = match self.globals.get(&id) {
            Some(Global::Slot(slot)) => pool.view(*slot).cloned(),
            Some(Global::External(view)) => Some(view.clone()),
            None => None,
        };
        Ok(view.unwrap_or_else(|| self.backend.fallback.view.clone()))
    }
}

impl CommandRecorder for WgpuRecorder<'_> {
    type Texture = GpuTexture;

    fn acquire(&mut self, slot: BindSlot, desc: &TargetDescriptor) {
        self.backend.pool.acquire(self.device, slot, desc);
    }

    fn release(&mut self, slot: BindSlot) {
        if !self.backend.pool.release(slot) {
            // Back in the free list: whatever was published from it is gone
            self.backend
                .published
                .retain(|_, (source, _)| *source != slot);
        }
    }

    fn create_noise_texture(&mut self, size: UVec2, texels: &[u8]) -> Result<GpuTexture> {
        GpuTexture::from_r8(self.device, self.queue, size, texels, "GI Noise Texture")
    }

    fn set_global_texture(&mut self, name: BindSlot, source: BindSlot) {
        // Pipeline names are frame-local; any other name is an output for later stages
        if !ids::RESERVED_TEXTURES.contains(&name) {
            if let Some(view) = self.backend.pool.view(source) {
                self.backend.published.insert(name, (source, view.clone()));
                self.backend.pool.hold(source);
            }
        }
        self.globals.insert(name, Global::Slot(source));
    }

    fn set_global_external(&mut self, name: BindSlot, texture: &GpuTexture) {
        self.globals
            .insert(name, Global::External(texture.view.clone()));
    }

    fn draw_scene(&mut self, draw: &SceneDraw<'_>) -> Result<()> {
        let target = self
            .backend
            .pool
            .get(draw.target)
            .ok_or_else(|| GiError::UnboundTexture(draw.target.to_string()))?;
        let view = target.view.clone();
        let size = target.desc.size();
        let format = texture_format(target.desc.format);

        let depth = draw
            .depth_stencil
            .then(|| self.backend.depth_view(self.device, size));
        let depth_attachment = depth.as_ref().map(|view| wgpu::RenderPassDepthStencilAttachment {
            view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Discard,
            }),
            stencil_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(0),
                store: wgpu::StoreOp::Discard,
            }),
        });

        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("GI Scene Capture"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: depth_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.scene.render(
            &mut pass,
            draw,
            SceneTarget {
                format,
                size,
                depth_format: depth.as_ref().map(|_| DEPTH_FORMAT),
            },
        );
        drop(pass);

        self.draws += 1;
        Ok(())
    }

    fn draw_fullscreen(&mut self, material: &Material, pass: u32, target: RenderDest) -> Result<()> {
        let (view, format, size, load) = match target {
            RenderDest::Target(slot) => {
                let texture = self
                    .backend
                    .pool
                    .get(slot)
                    .ok_or_else(|| GiError::UnboundTexture(slot.to_string()))?;
                (
                    texture.view.clone(),
                    texture_format(texture.desc.format),
                    texture.desc.size(),
                    wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                )
            }
            RenderDest::Camera => (
                self.camera.view.clone(),
                self.camera.format,
                self.camera.size,
                wgpu::LoadOp::Load,
            ),
        };

        let main = self.input(material, ids::MAIN_TEX)?;
        let color = self.input(material, ids::COLOR_TEX)?;
        let dist = self.input(material, ids::DIST_TEX)?;
        let noise = self.input(material, ids::NOISE_TEX)?;
        let alpha = self.input(material, ids::ALPHA_TEX)?;

        let pipeline = self
            .backend
            .programs
            .pipeline(self.device, material, pass, format)?
            .clone();

        // One buffer per draw: several draws of one program share an encoder
        let uniforms = ProgramUniforms::from_material(material, size);
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("GI Program Uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let programs = &self.backend.programs;
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("GI Program Bind Group"),
            layout: programs.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&main),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&color),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&dist),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&noise),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&alpha),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&programs.linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::Sampler(&programs.point_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 8,
                    resource: wgpu::BindingResource::Sampler(&programs.noise_sampler),
                },
            ],
        });

        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(material.program().name()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        drop(render_pass);

        self.draws += 1;
        Ok(())
    }
}
