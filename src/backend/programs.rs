//! The five GI programs compiled for `wgpu`.
//!
//! All programs share one WGSL prelude and one bind group layout:
//!
//! | binding | resource                                   |
//! |---------|--------------------------------------------|
//! | 0       | [`ProgramUniforms`]                        |
//! | 1-5     | `_MainTex`, `_ColorTex`, `_DistTex`, `_NoiseTex`, `_AlphaTex` |
//! | 6       | linear clamp sampler                       |
//! | 7       | point clamp sampler                        |
//! | 8       | linear repeat sampler (noise)              |
//!
//! Capability keywords become WGSL `override` constants named after the flag, and each pass
//! is a fragment entry point. A render pipeline is built the first time a
//! (program, keywords, pass, format) combination is drawn and cached afterwards.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use glam::{UVec2, Vec4};

use crate::error::{GiError, Result};
use crate::material::{Keywords, Material, ProgramKind};
use crate::targets::ids;

const PRELUDE: &str = include_str!("../shaders/prelude.wgsl");

fn program_source(program: ProgramKind) -> &'static str {
    match program {
        ProgramKind::Blit => include_str!("../shaders/blit.wgsl"),
        ProgramKind::JumpFlood => include_str!("../shaders/jump_flood.wgsl"),
        ProgramKind::Gi => include_str!("../shaders/gi.wgsl"),
        ProgramKind::Blur => include_str!("../shaders/blur.wgsl"),
        ProgramKind::Distance => include_str!("../shaders/distance.wgsl"),
    }
}

/// Fragment entry point of each pass.
pub fn entry_point(program: ProgramKind, pass: u32) -> Option<&'static str> {
    let entries: &[&'static str] = match program {
        ProgramKind::Blit => &["fs_copy", "fs_alpha"],
        ProgramKind::JumpFlood => &["fs_seed", "fs_flood"],
        ProgramKind::Gi => &["fs_gather", "fs_bounce", "fs_bounce_clean"],
        ProgramKind::Blur => &["fs_blur"],
        ProgramKind::Distance => &["fs_distance"],
    };
    entries.get(pass as usize).copied()
}

/// Constants block shared by every program.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ProgramUniforms {
    /// Target width, height and their reciprocals.
    pub resolution: [f32; 4],
    /// Working size over camera size in `xy`.
    pub scale: [f32; 4],
    /// Jump flood step in texels.
    pub step_size: [f32; 4],
    /// Blur step in uv.
    pub step: [f32; 4],
    pub noise_offset: [f32; 4],
    pub noise_tiling: [f32; 4],
    /// Rays per pixel.
    pub samples: f32,
    pub falloff: f32,
    pub intensity: f32,
    pub intensity_bounce: f32,
    /// Distance field offset.
    pub offset: f32,
    pub aspect: f32,
    /// Composite crop, `1 / uv_scale` of the resolution plan.
    pub uv_scale: f32,
    pub _padding: f32,
}

impl ProgramUniforms {
    /// Gathers the material's constants; unset ones take neutral values.
    pub fn from_material(material: &Material, target: UVec2) -> Self {
        let size = target.max(UVec2::ONE).as_vec2();
        let vector = |id| material.vector(id).unwrap_or(Vec4::ZERO).to_array();
        let float = |id, default| material.float(id).unwrap_or(default);

        Self {
            resolution: [size.x, size.y, 1.0 / size.x, 1.0 / size.y],
            scale: material
                .vector(ids::SCALE)
                .unwrap_or(Vec4::ONE)
                .to_array(),
            step_size: vector(ids::STEP_SIZE),
            step: vector(ids::STEP),
            noise_offset: vector(ids::NOISE_OFFSET),
            noise_tiling: material
                .vector(ids::NOISE_TILING)
                .unwrap_or(Vec4::ONE)
                .to_array(),
            samples: float(ids::SAMPLES, 1.0),
            falloff: float(ids::FALLOFF, 1.0),
            intensity: float(ids::INTENSITY, 1.0),
            intensity_bounce: float(ids::INTENSITY_BOUNCE, 1.0),
            offset: float(ids::OFFSET, 0.0),
            aspect: float(ids::ASPECT, size.x / size.y),
            uv_scale: float(ids::UV_SCALE, 1.0),
            _padding: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramKind,
    keywords: Keywords,
    pass: u32,
    format: wgpu::TextureFormat,
}

/// Shader modules, the shared layout and samplers, and the pipeline cache.
pub struct ProgramLibrary {
    modules: HashMap<ProgramKind, wgpu::ShaderModule>,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    /// Clamped bilinear sampling of render targets.
    pub linear_sampler: wgpu::Sampler,
    /// Clamped nearest sampling, used by the jump flood.
    pub point_sampler: wgpu::Sampler,
    /// Repeating sampler for the tiled noise texture.
    pub noise_sampler: wgpu::Sampler,
}

impl ProgramLibrary {
    /// Compiles one shader module per program. Pipelines are built lazily by
    /// [`pipeline`](Self::pipeline).
    pub fn new(device: &wgpu::Device) -> Self {
        let modules = ProgramKind::ALL
            .into_iter()
            .map(|program| {
                let source = format!("{PRELUDE}\n{}", program_source(program));
                let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(program.name()),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                });
                (program, module)
            })
            .collect();

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding, ty| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(ty),
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GI Program Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
                texture_entry(5),
                sampler_entry(6, wgpu::SamplerBindingType::Filtering),
                sampler_entry(7, wgpu::SamplerBindingType::NonFiltering),
                sampler_entry(8, wgpu::SamplerBindingType::Filtering),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("GI Program Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let sampler = |label, address_mode, filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: address_mode,
                address_mode_v: address_mode,
                address_mode_w: address_mode,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        };

        Self {
            modules,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            linear_sampler: sampler(
                "GI Linear Sampler",
                wgpu::AddressMode::ClampToEdge,
                wgpu::FilterMode::Linear,
            ),
            point_sampler: sampler(
                "GI Point Sampler",
                wgpu::AddressMode::ClampToEdge,
                wgpu::FilterMode::Nearest,
            ),
            noise_sampler: sampler(
                "GI Noise Sampler",
                wgpu::AddressMode::Repeat,
                wgpu::FilterMode::Linear,
            ),
        }
    }

    /// Layout shared by all programs: uniforms at 0, five texture slots, then the samplers.
    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// Number of pipelines built so far.
    pub fn cached_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    /// The pipeline drawing `pass` of `material` into a `format` target.
    pub fn pipeline(
        &mut self,
        device: &wgpu::Device,
        material: &Material,
        pass: u32,
        format: wgpu::TextureFormat,
    ) -> Result<&wgpu::RenderPipeline> {
        let program = material.program();
        let entry = entry_point(program, pass).ok_or(GiError::UnknownPass {
            program: program.name(),
            pass,
        })?;
        let key = PipelineKey {
            program,
            keywords: material.keywords() & program.supported_keywords(),
            pass,
            format,
        };

        match self.pipelines.entry(key) {
            Entry::Occupied(cached) => Ok(&*cached.into_mut()),
            Entry::Vacant(slot) => {
                let module = self.modules.get(&program).ok_or(GiError::UnknownPass {
                    program: program.name(),
                    pass,
                })?;
                log::debug!(
                    "Building {} pipeline: {entry}, {:?}, {format:?}",
                    program.name(),
                    key.keywords
                );
                let pipeline = build_pipeline(device, &self.pipeline_layout, module, &key, entry);
                Ok(&*slot.insert(pipeline))
            }
        }
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    key: &PipelineKey,
    entry: &str,
) -> wgpu::RenderPipeline {
    let constants: Vec<(&str, f64)> = key
        .program
        .supported_keywords()
        .iter_names()
        .map(|(name, flag)| (name, if key.keywords.contains(flag) { 1.0 } else { 0.0 }))
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(entry),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions {
                constants: &constants,
                zero_initialize_workgroup_memory: true,
            },
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
