//! Backend-neutral description of a 2D render target.

use glam::UVec2;
use serde::{Deserialize, Serialize};

/// Pixel formats the pipeline can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    R8Unorm,
    Rgba8Unorm,
    #[default]
    Rgba16Float,
    Rgba32Float,
    Depth24Stencil8,
}

impl PixelFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, PixelFormat::Depth24Stencil8)
    }
}

/// Size, format and sample count of a transient target.
///
/// The planner rewrites the descriptor once per frame before any pass is recorded;
/// passes only read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub sample_count: u32,
}

impl TargetDescriptor {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            sample_count: 1,
        }
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    pub fn with_format(self, format: PixelFormat) -> Self {
        Self { format, ..self }
    }

    /// Width over height.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}
