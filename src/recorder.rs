//! The command-recording seam between the GI pipeline and a GPU backend.
//!
//! The pipeline never talks to a graphics API directly. It records its frame through a
//! [`CommandRecorder`], which a backend implements on top of whatever command encoder it
//! owns. The [`backend`](crate::backend) module provides the `wgpu` implementation; the
//! integration tests use a recorder that only logs calls.

use glam::UVec2;

use crate::error::Result;
use crate::material::Material;
use crate::settings::CameraKind;
use crate::targets::{BindSlot, TargetDescriptor};

/// Shader tags whose passes are drawn during scene capture.
pub const SCENE_SHADER_TAGS: [&str; 3] = ["SRPDefaultUnlit", "UniversalForward", "UniversalForwardOnly"];

/// Where a full-screen draw writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderDest {
    /// A transient (or published) target bound to a slot.
    Target(BindSlot),
    /// The camera's own color target.
    Camera,
}

/// A request to render the host's scene objects into a target.
///
/// With a border the target covers more of the world than the camera does. The host then
/// draws with its orthographic size multiplied by `capture_scale`, keeping the camera
/// centered, so objects just outside the frame still cast light into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneDraw<'a> {
    /// Only objects on these layers are drawn.
    pub layer_mask: u32,
    /// Only shader passes with one of these tags are drawn.
    pub shader_tags: &'a [&'a str],
    pub target: BindSlot,
    /// Attach a depth-stencil buffer while drawing.
    pub depth_stencil: bool,
    /// World extent of the target relative to the camera view, `1.0` without a border.
    pub capture_scale: f32,
}

/// What the pipeline needs to know about the camera it renders for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraContext {
    pub kind: CameraKind,
    /// Camera color target size in pixels.
    pub target_size: UVec2,
    /// Orthographic half-height in world units.
    pub orthographic_size: f32,
}

impl CameraContext {
    pub fn new(kind: CameraKind, width: u32, height: u32, orthographic_size: f32) -> Self {
        Self {
            kind,
            target_size: UVec2::new(width, height),
            orthographic_size,
        }
    }
}

/// Records GPU work for one camera frame.
///
/// Calls arrive in the exact order the work must execute. Implementations may record
/// lazily but must preserve that order.
pub trait CommandRecorder {
    /// Backend texture type for textures that outlive a frame (the noise texture).
    type Texture;

    /// Binds a temporary texture matching `desc` to `slot` until [`release`](Self::release).
    fn acquire(&mut self, slot: BindSlot, desc: &TargetDescriptor);

    /// Returns the texture bound to `slot` to the backend.
    fn release(&mut self, slot: BindSlot);

    /// Creates a single-channel, repeat-wrapped, bilinear-filtered texture from `texels`.
    fn create_noise_texture(&mut self, size: UVec2, texels: &[u8]) -> Result<Self::Texture>;

    /// Makes the texture behind `source` visible to every program under `name`.
    ///
    /// Names of the pipeline's own slots (see [`ids::RESERVED_TEXTURES`]) only live for
    /// the frame. Any other name publishes `source` to stages running after the GI passes:
    /// its contents must survive the release of `source` until it is published again.
    ///
    /// [`ids::RESERVED_TEXTURES`]: crate::targets::ids::RESERVED_TEXTURES
    fn set_global_texture(&mut self, name: BindSlot, source: BindSlot);

    /// Makes a persistent texture visible to every program under `name`.
    fn set_global_external(&mut self, name: BindSlot, texture: &Self::Texture);

    /// Renders the host's scene objects into a target.
    fn draw_scene(&mut self, draw: &SceneDraw<'_>) -> Result<()>;

    /// Draws a full-screen triangle with one pass of `material`'s program.
    fn draw_fullscreen(&mut self, material: &Material, pass: u32, target: RenderDest) -> Result<()>;
}
