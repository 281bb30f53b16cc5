//! # gilight2d
//!
//! **Real-time 2D global illumination from a jump-flood distance field.**
//!
//! Emissive sprites light the scene around them: every frame the scene is captured into an
//! objects buffer, a jump flood turns it into a distance field, and each pixel ray-marches
//! that field to gather light, optionally bouncing it and blurring the result.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gilight2d::*;
//!
//! # fn frame<R: CommandRecorder<Texture = ()>>(recorder: &mut R) -> gilight2d::Result<()> {
//! let settings = GiSettings::new()
//!     .rays(64)
//!     .bounces(1)
//!     .noise_mode(NoiseMode::Dynamic)
//!     .blur(BlurMode::Cross);
//! let mut gi = GiLightFeature::create(settings, NoiseProvider::new().shared())?;
//!
//! let camera = CameraContext::new(CameraKind::Game, 1280, 720, 5.0);
//! if gi.should_run(&camera) {
//!     gi.record_frame(&camera, recorder)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Layout
//!
//! - [`GiLightFeature`]: per-camera gating and the frame entry point.
//! - [`GiPass`] and [`FramePlan`]: the ordered pass sequence of one frame.
//! - [`targets`]: transient targets, ping-pong pairs and post-process sessions.
//! - [`MaterialStateManager`]: program instances and their capability keywords.
//! - [`NoiseProvider`]: the shared noise texture.
//! - [`CommandRecorder`]: the seam to a GPU backend; [`backend`] implements it on `wgpu`.

pub mod backend;
mod error;
mod feature;
mod gi_pass;
mod gpu;
mod material;
mod noise;
mod recorder;
mod resolution;
mod settings;
pub mod targets;

pub use error::{GiError, Result};
pub use feature::GiLightFeature;
pub use gi_pass::{FramePlan, GiPass, NoiseFrame};
pub use gpu::GpuContext;
pub use material::{Keywords, Material, MaterialStateManager, ProgramKind, Property};
pub use noise::{NoiseProvider, SharedNoise};
pub use recorder::{CameraContext, CommandRecorder, RenderDest, SCENE_SHADER_TAGS, SceneDraw};
pub use resolution::ResolutionPlan;
pub use settings::{
    BLUR_STEP_RANGE, BORDER_RANGE, BlurMode, BlurOptions, CameraKind, DISTANCE_OFFSET_RANGE,
    DebugOutput, FALLOFF_RANGE, FinalBlit, GiSettings, INTENSITY_RANGE, MAX_BOUNCES,
    NOISE_SCALE_RANGE, NoiseMode, NoiseOptions, OutputOptions, Ranged, RenderEvent, ScaleMode,
    ScaleOptions, Toggled, TraceOptions,
};
pub use targets::{BindSlot, PixelFormat, TargetDescriptor};

// Re-export glam math types for convenience
pub use glam::{UVec2, Vec2, Vec4};
