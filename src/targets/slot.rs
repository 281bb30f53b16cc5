//! Stable bind slot ids derived from names.

use std::fmt;

/// A stable id naming a texture or constant binding.
///
/// Slots are derived from their name with 32-bit FNV-1a, so the same name always maps to
/// the same slot in every module and backend, and well-known slots can be `const`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindSlot(u32);

impl BindSlot {
    /// Derives the slot for `name`.
    pub const fn named(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash: u32 = 0x811c_9dc5;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(0x0100_0193);
            i += 1;
        }
        Self(hash)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for BindSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindSlot({:#010x})", self.0)
    }
}

impl fmt::Display for BindSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<&str> for BindSlot {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

/// Well-known slots shared by the pipeline and the GPU programs.
pub mod ids {
    use super::BindSlot;

    // Program inputs
    pub const MAIN_TEX: BindSlot = BindSlot::named("_MainTex");
    pub const COLOR_TEX: BindSlot = BindSlot::named("_ColorTex");
    pub const DIST_TEX: BindSlot = BindSlot::named("_DistTex");
    pub const NOISE_TEX: BindSlot = BindSlot::named("_NoiseTex");
    pub const ALPHA_TEX: BindSlot = BindSlot::named("_AlphaTex");

    // Constants
    pub const SCALE: BindSlot = BindSlot::named("_Scale");
    pub const UV_SCALE: BindSlot = BindSlot::named("_UvScale");
    pub const SAMPLES: BindSlot = BindSlot::named("_Samples");
    pub const FALLOFF: BindSlot = BindSlot::named("_Falloff");
    pub const INTENSITY: BindSlot = BindSlot::named("_Intensity");
    pub const INTENSITY_BOUNCE: BindSlot = BindSlot::named("_IntensityBounce");
    pub const OFFSET: BindSlot = BindSlot::named("_Offset");
    pub const STEP_SIZE: BindSlot = BindSlot::named("_StepSize");
    pub const STEP: BindSlot = BindSlot::named("_Step");
    pub const ASPECT: BindSlot = BindSlot::named("_Aspect");
    pub const NOISE_OFFSET: BindSlot = BindSlot::named("_NoiseOffset");
    pub const NOISE_TILING: BindSlot = BindSlot::named("_NoiseTiling");

    // Transient targets
    pub const OBJECTS_TEX: BindSlot = BindSlot::named("_GiObjectsTex");
    pub const JFA_A_TEX: BindSlot = BindSlot::named("_JfaATex");
    pub const JFA_B_TEX: BindSlot = BindSlot::named("_JfaBTex");
    pub const GI_A_TEX: BindSlot = BindSlot::named("_GiATex");
    pub const GI_B_TEX: BindSlot = BindSlot::named("_GiBTex");
    pub const BLUR_A_TEX: BindSlot = BindSlot::named("_BlurATex");
    pub const BLUR_B_TEX: BindSlot = BindSlot::named("_BlurBTex");
    pub const GI_RESULT_TEX: BindSlot = BindSlot::named("_GiResultTex");
    pub const BLUR_RESULT_TEX: BindSlot = BindSlot::named("_BlurResultTex");

    /// Texture slots the pipeline binds or acquires itself. A published output must not
    /// reuse one of them.
    pub const RESERVED_TEXTURES: [BindSlot; 14] = [
        MAIN_TEX,
        COLOR_TEX,
        DIST_TEX,
        NOISE_TEX,
        ALPHA_TEX,
        OBJECTS_TEX,
        JFA_A_TEX,
        JFA_B_TEX,
        GI_A_TEX,
        GI_B_TEX,
        BLUR_A_TEX,
        BLUR_B_TEX,
        GI_RESULT_TEX,
        BLUR_RESULT_TEX,
    ];
}
