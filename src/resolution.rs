//! Working resolution and border padding.

use glam::UVec2;

use crate::error::{GiError, Result};
use crate::settings::{ScaleMode, ScaleOptions};
use crate::targets::{PixelFormat, TargetDescriptor};

/// The resolution every intermediate target of a frame is allocated at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionPlan {
    /// Working size in texels, border included.
    pub size: UVec2,
    /// How much larger the captured area is than the camera frame; 1 without a border.
    pub uv_scale: f32,
}

impl ResolutionPlan {
    /// Plans the working resolution for a camera.
    ///
    /// - [`ScaleMode::None`]: the camera resolution.
    /// - [`ScaleMode::Ratio`]: `floor(camera * ratio)` per axis.
    /// - [`ScaleMode::FixedHeight`]: the fixed height, and `floor(aspect * height)` as width.
    ///
    /// With a border of `b` world units around an orthographic half-size `o`, the UV scale
    /// is `(o + b) / o` and both axes grow by the same factor so the margin keeps the
    /// texel density of the frame. Every axis is at least one texel.
    pub fn new(
        camera: UVec2,
        orthographic_size: f32,
        scale: &ScaleOptions,
        border: Option<f32>,
    ) -> Result<Self> {
        let invalid = || GiError::InvalidCamera {
            width: camera.x,
            height: camera.y,
            orthographic_size,
        };
        if camera.x == 0 || camera.y == 0 {
            return Err(invalid());
        }

        let size = match scale.mode {
            ScaleMode::None => camera,
            ScaleMode::Ratio => UVec2::new(
                (camera.x as f32 * scale.ratio).floor() as u32,
                (camera.y as f32 * scale.ratio).floor() as u32,
            ),
            ScaleMode::FixedHeight => {
                let aspect = camera.x as f32 / camera.y as f32;
                UVec2::new((aspect * scale.height as f32).floor() as u32, scale.height)
            }
        };

        let uv_scale = match border {
            Some(border) => {
                if !(orthographic_size.is_finite() && orthographic_size > 0.0) {
                    return Err(invalid());
                }
                (orthographic_size + border) / orthographic_size
            }
            None => 1.0,
        };

        let size = if border.is_some() {
            UVec2::new(
                (size.x as f32 * uv_scale).floor() as u32,
                (size.y as f32 * uv_scale).floor() as u32,
            )
        } else {
            size
        };

        Ok(Self {
            size: size.max(UVec2::ONE),
            uv_scale,
        })
    }

    pub fn descriptor(&self, format: PixelFormat) -> TargetDescriptor {
        TargetDescriptor::new(self.size.x, self.size.y, format)
    }

    /// Jump flood steps needed to cover the longest axis: `ceil(log2(max(w, h)))`.
    pub fn flood_steps(&self) -> u32 {
        let longest = self.size.max_element();
        if longest <= 1 {
            0
        } else {
            u32::BITS - (longest - 1).leading_zeros()
        }
    }
}
