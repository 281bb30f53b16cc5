//! Demo: a handful of orbiting emissive discs lit by 2D GI.
//!
//! Keys: `1`-`4` pick the debug output (none, objects, flood, distance), `N` cycles the
//! noise mode, `B` toggles blur, `T` toggles texture output.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use gilight2d::backend::{CameraTarget, GpuTexture, SceneRenderer, SceneTarget, WgpuBackend};
use gilight2d::{
    BlurMode, CameraContext, CameraKind, DebugOutput, FinalBlit, GiLightFeature, GiSettings,
    GpuContext, NoiseMode, NoiseProvider, SceneDraw, ScaleMode,
};

const ORTHOGRAPHIC_SIZE: f32 = 5.0;
const DISC_LAYER: u32 = 1;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct DiscInstance {
    center: [f32; 2],
    radius: [f32; 2],
    color: [f32; 4],
}

impl DiscInstance {
    const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<DiscInstance>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            wgpu::VertexAttribute {
                offset: 8,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
            wgpu::VertexAttribute {
                offset: 16,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x4,
            },
        ],
    };
}

/// Lights and occluders: (orbit radius, speed, size, color). Black discs only block light.
const DISCS: [(f32, f32, f32, [f32; 4]); 6] = [
    (0.00, 0.0, 0.05, [0.0, 0.0, 0.0, 1.0]),
    (0.25, 0.6, 0.04, [1.0, 0.55, 0.2, 1.0]),
    (0.30, -0.4, 0.03, [0.2, 0.6, 1.0, 1.0]),
    (0.18, 1.1, 0.02, [0.4, 1.0, 0.4, 1.0]),
    (0.36, 0.25, 0.06, [0.0, 0.0, 0.0, 1.0]),
    (0.12, -0.8, 0.025, [1.0, 0.2, 0.6, 1.0]),
];

struct Discs {
    module: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    pipelines: HashMap<(wgpu::TextureFormat, Option<wgpu::TextureFormat>), wgpu::RenderPipeline>,
    instances: wgpu::Buffer,
    device: wgpu::Device,
    queue: wgpu::Queue,
    time: f32,
    aspect: f32,
}

impl Discs {
    fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Disc Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/discs.wgsl").into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Disc Pipeline Layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });
        let instances = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Disc Instances"),
            size: (std::mem::size_of::<DiscInstance>() * DISCS.len()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            module,
            layout,
            pipelines: HashMap::new(),
            instances,
            device: device.clone(),
            queue: gpu.queue.clone(),
            time: 0.0,
            aspect: 1.0,
        }
    }

    fn update(&mut self, time: f32, aspect: f32) {
        self.time = time;
        self.aspect = aspect;
    }

    /// Disc positions in target UV space. A bordered capture shows more of the world, so
    /// the camera view shrinks to the center `1 / capture_scale` of the target.
    fn placed(&self, capture_scale: f32) -> Vec<DiscInstance> {
        let aspect = self.aspect;
        DISCS
            .iter()
            .map(|&(orbit, speed, size, color)| {
                let angle = self.time * speed + orbit * 10.0;
                let offset = [angle.cos() * orbit / aspect, angle.sin() * orbit];
                DiscInstance {
                    center: [
                        0.5 + offset[0] / capture_scale,
                        0.5 + offset[1] / capture_scale,
                    ],
                    radius: [size / aspect / capture_scale, size / capture_scale],
                    color,
                }
            })
            .collect()
    }

    fn pipeline(&mut self, target: SceneTarget) -> &wgpu::RenderPipeline {
        let (module, layout, device) = (&self.module, &self.layout, &self.device);
        self.pipelines
            .entry((target.format, target.depth_format))
            .or_insert_with(|| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("Disc Pipeline"),
                    layout: Some(layout),
                    vertex: wgpu::VertexState {
                        module,
                        entry_point: Some("vs"),
                        buffers: &[DiscInstance::LAYOUT],
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module,
                        entry_point: Some("fs"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: target.format,
                            blend: Some(wgpu::BlendState::REPLACE),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleStrip,
                        ..Default::default()
                    },
                    depth_stencil: target.depth_format.map(|format| wgpu::DepthStencilState {
                        format,
                        depth_write_enabled: false,
                        depth_compare: wgpu::CompareFunction::Always,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                })
            })
    }
}

impl SceneRenderer for Discs {
    fn render(&mut self, pass: &mut wgpu::RenderPass<'_>, draw: &SceneDraw<'_>, target: SceneTarget) {
        if draw.layer_mask & DISC_LAYER == 0 {
            return;
        }
        let instances = self.placed(draw.capture_scale);
        self.queue
            .write_buffer(&self.instances, 0, bytemuck::cast_slice(&instances));

        let pipeline = self.pipeline(target).clone();
        pass.set_pipeline(&pipeline);
        pass.set_vertex_buffer(0, self.instances.slice(..));
        pass.draw(0..4, 0..DISCS.len() as u32);
    }
}

enum Demo {
    Pending,
    Running {
        window: Arc<Window>,
        gpu: GpuContext,
        backend: WgpuBackend,
        gi: GiLightFeature<GpuTexture>,
        discs: Discs,
        start_time: Instant,
    },
}

impl Demo {
    fn settings() -> GiSettings {
        GiSettings::new()
            .rays(48)
            .bounces(1)
            .scale_mode(ScaleMode::Ratio)
            .noise_mode(NoiseMode::Dynamic)
            .border(0.5)
    }
}

impl ApplicationHandler for Demo {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !matches!(self, Demo::Pending) {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title("gilight2d")
            .with_inner_size(winit::dpi::LogicalSize::new(960, 540));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };
        let gpu = match GpuContext::new(window.clone()) {
            Ok(gpu) => gpu,
            Err(err) => {
                log::error!("{err}");
                event_loop.exit();
                return;
            }
        };

        let mut settings = Self::settings();
        settings.scale.ratio = 0.5;
        let gi = match GiLightFeature::create(settings, NoiseProvider::new().shared()) {
            Ok(gi) => gi,
            Err(err) => {
                log::error!("{err}");
                event_loop.exit();
                return;
            }
        };

        *self = Demo::Running {
            backend: WgpuBackend::new(&gpu.device, &gpu.queue),
            discs: Discs::new(&gpu),
            window,
            gpu,
            gi,
            start_time: Instant::now(),
        };
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Demo::Running {
            window,
            gpu,
            backend,
            gi,
            discs,
            start_time,
        } = self
        else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                gpu.resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                if let PhysicalKey::Code(key) = event.physical_key {
                    handle_key(gi, key);
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(surface) = gpu.surface.as_ref() else {
                    return;
                };
                let output = match surface.get_current_texture() {
                    Ok(output) => output,
                    Err(err) => {
                        log::warn!("Skipping frame: {err}");
                        window.request_redraw();
                        return;
                    }
                };
                let view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());

                discs.update(start_time.elapsed().as_secs_f32(), gpu.aspect());

                let mut encoder = gpu
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("GI Frame"),
                    });
                let camera = CameraContext::new(
                    CameraKind::Game,
                    gpu.width(),
                    gpu.height(),
                    ORTHOGRAPHIC_SIZE,
                );
                let target = CameraTarget {
                    view: &view,
                    format: gpu.config.format,
                    size: camera.target_size,
                };

                if gi.should_run(&camera) {
                    let mut recorder =
                        backend.recorder(&gpu.device, &gpu.queue, &mut encoder, target, discs);
                    let result = gi.record_frame(&camera, &mut recorder);
                    recorder.finish();
                    if let Err(err) = result {
                        log::error!("GI frame failed: {err}");
                    }
                }

                gpu.queue.submit(std::iter::once(encoder.finish()));
                output.present();
                window.request_redraw();
            }
            _ => {}
        }
    }
}

fn handle_key(gi: &mut GiLightFeature<GpuTexture>, key: KeyCode) {
    let debug = match key {
        KeyCode::Digit1 => Some(DebugOutput::None),
        KeyCode::Digit2 => Some(DebugOutput::Objects),
        KeyCode::Digit3 => Some(DebugOutput::Flood),
        KeyCode::Digit4 => Some(DebugOutput::Distance),
        _ => None,
    };

    let result = match (key, debug) {
        (_, Some(debug)) => gi.configure(|s| s.debug_output = debug),
        (KeyCode::KeyN, _) => {
            let next = match gi.settings().noise.mode {
                NoiseMode::Dynamic => NoiseMode::Static,
                NoiseMode::Static => NoiseMode::Shader,
                NoiseMode::Shader => NoiseMode::None,
                NoiseMode::None => NoiseMode::Dynamic,
            };
            gi.set_noise_mode(next);
            Ok(())
        }
        (KeyCode::KeyB, _) => gi.configure(|s| {
            s.blur.enabled = !s.blur.enabled;
            s.blur.mode = BlurMode::Cross;
        }),
        (KeyCode::KeyT, _) => gi.configure(|s| {
            s.output.destination = match s.output.destination {
                FinalBlit::Camera => FinalBlit::Texture,
                FinalBlit::Texture => FinalBlit::Camera,
            };
        }),
        _ => return,
    };

    match result {
        Ok(()) => log::info!(
            "debug {:?}, noise {:?}, blur {}, output {:?}",
            gi.settings().debug_output,
            gi.settings().noise.mode,
            gi.settings().blur.enabled,
            gi.settings().output.destination
        ),
        Err(err) => log::warn!("{err}"),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = Demo::Pending;
    event_loop.run_app(&mut app)?;
    Ok(())
}
