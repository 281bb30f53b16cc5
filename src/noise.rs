//! The shared noise texture used to jitter GI rays.
//!
//! One [`NoiseProvider`] is shared by every camera running the feature (see
//! [`SharedNoise`]). The texture is created lazily, regenerated whenever the requested
//! resolution changes, and filled with fresh uniform random bytes each time.
//!
//! Creation failures never abort a frame: the provider logs, drops to the "absent" state
//! and the GI program falls back to its keyword-gated code path. [`NoiseMode::Shader`] and
//! [`NoiseMode::None`] never depend on the texture.
//!
//! [`NoiseMode::Shader`]: crate::NoiseMode::Shader
//! [`NoiseMode::None`]: crate::NoiseMode::None

use std::cell::RefCell;
use std::rc::Rc;

use glam::{UVec2, Vec2};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::recorder::CommandRecorder;

/// A noise provider shared between feature instances.
pub type SharedNoise<T> = Rc<RefCell<NoiseProvider<T>>>;

struct NoiseTexture<T> {
    texture: T,
    size: UVec2,
}

/// Owns the noise texture and the random source that fills it.
pub struct NoiseProvider<T> {
    current: Option<NoiseTexture<T>>,
    failed: Option<UVec2>,
    rng: StdRng,
    allocations: u32,
}

impl<T> NoiseProvider<T> {
    /// Creates an empty provider seeded from the thread-local entropy source.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_rng(&mut rand::rng()))
    }

    /// Creates an empty provider with a deterministic random source.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            current: None,
            failed: None,
            rng,
            allocations: 0,
        }
    }

    /// Wraps the provider for sharing between features.
    pub fn shared(self) -> SharedNoise<T> {
        Rc::new(RefCell::new(self))
    }

    /// Noise resolution for a screen: `ceil(screen * scale)` per axis, at least one texel.
    pub fn target_size(screen: UVec2, scale: f32) -> UVec2 {
        UVec2::new(
            (screen.x as f32 * scale).ceil() as u32,
            (screen.y as f32 * scale).ceil() as u32,
        )
        .max(UVec2::ONE)
    }

    /// Makes sure a noise texture for `screen * scale` exists.
    ///
    /// Does nothing when the current texture already has that resolution, or when creating
    /// one at that resolution already failed. Returns whether a texture is available.
    pub fn ensure<R>(&mut self, recorder: &mut R, screen: UVec2, scale: f32) -> bool
    where
        R: CommandRecorder<Texture = T> + ?Sized,
    {
        let size = Self::target_size(screen, scale);
        if self.current.as_ref().is_some_and(|noise| noise.size == size) {
            return true;
        }
        if self.failed == Some(size) {
            return false;
        }

        let mut texels = vec![0u8; (size.x as usize) * (size.y as usize)];
        for texel in &mut texels {
            *texel = self.rng.random_range(0..=u8::MAX);
        }

        self.allocations += 1;
        match recorder.create_noise_texture(size, &texels) {
            Ok(texture) => {
                log::info!("Noise texture allocated at {}x{}", size.x, size.y);
                self.current = Some(NoiseTexture { texture, size });
                self.failed = None;
                true
            }
            Err(err) => {
                log::warn!(
                    "Noise texture unavailable at {}x{}, falling back: {err}",
                    size.x,
                    size.y
                );
                self.current = None;
                self.failed = Some(size);
                false
            }
        }
    }

    /// The current noise texture, if one is available.
    pub fn texture(&self) -> Option<&T> {
        self.current.as_ref().map(|noise| &noise.texture)
    }

    pub fn size(&self) -> Option<UVec2> {
        self.current.as_ref().map(|noise| noise.size)
    }

    pub fn is_available(&self) -> bool {
        self.current.is_some()
    }

    /// Number of texture creations attempted so far.
    pub fn allocations(&self) -> u32 {
        self.allocations
    }

    /// A uniformly random UV offset for dynamic noise.
    pub fn random_offset(&mut self) -> Vec2 {
        Vec2::new(
            self.rng.random_range(0.0..1.0f32),
            self.rng.random_range(0.0..1.0f32),
        )
    }

    /// Drops the texture, e.g. at shutdown or device loss.
    pub fn clear(&mut self) {
        self.current = None;
        self.failed = None;
    }
}

impl<T> Default for NoiseProvider<T> {
    fn default() -> Self {
        Self::new()
    }
}
