//! Configuration surface for the GI feature.
//!
//! [`GiSettings`] is the complete set of tunables a host hands to
//! [`GiLightFeature::create`](crate::GiLightFeature::create). It can be built in code with
//! the chainable methods or loaded from JSON:
//!
//! ```
//! use gilight2d::{GiSettings, NoiseMode};
//!
//! let settings = GiSettings::from_json(r#"{ "rays": 64, "noise": { "mode": "dynamic" } }"#)?;
//! assert_eq!(settings.rays, 64);
//! assert_eq!(settings.noise.mode, NoiseMode::Dynamic);
//! # Ok::<(), gilight2d::GiError>(())
//! ```
//!
//! Mode enums can also be produced from raw integers (editor enums, FFI) through
//! `TryFrom<i32>`; an unknown value is a fatal configuration error.

use serde::{Deserialize, Serialize};

use crate::error::{GiError, Result};
use crate::targets::{BindSlot, PixelFormat, ids};

macro_rules! raw_mode {
    ($ty:ident, $err:ident, { $($raw:literal => $variant:ident),+ $(,)? }) => {
        impl TryFrom<i32> for $ty {
            type Error = GiError;

            fn try_from(raw: i32) -> Result<Self> {
                match raw {
                    $($raw => Ok($ty::$variant),)+
                    other => Err(GiError::$err(other)),
                }
            }
        }

        impl From<$ty> for i32 {
            fn from(mode: $ty) -> i32 {
                match mode {
                    $($ty::$variant => $raw,)+
                }
            }
        }
    };
}

/// How the working resolution is derived from the camera target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Work at the camera resolution.
    #[default]
    None,
    /// Multiply both camera axes by a ratio.
    Ratio,
    /// Fix the height and derive the width from the camera aspect.
    FixedHeight,
}

raw_mode!(ScaleMode, UnknownScaleMode, { 0 => None, 1 => Ratio, 2 => FixedHeight });

/// Source of per-pixel ray jitter in the GI program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseMode {
    /// Noise texture sampled with a fresh random offset every frame.
    Dynamic,
    /// Noise texture sampled at a fixed offset.
    Static,
    /// Pseudo-random hash evaluated in the program.
    #[default]
    Shader,
    /// No jitter.
    None,
}

raw_mode!(NoiseMode, UnknownNoiseMode, { 0 => Dynamic, 1 => Static, 2 => Shader, 3 => None });

impl NoiseMode {
    /// Whether this mode samples the shared noise texture.
    pub fn uses_texture(self) -> bool {
        matches!(self, NoiseMode::Dynamic | NoiseMode::Static)
    }
}

/// Direction pattern of the blur program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurMode {
    Horizontal,
    Vertical,
    #[default]
    Cross,
    Box,
}

raw_mode!(BlurMode, UnknownBlurMode, { 0 => Horizontal, 1 => Vertical, 2 => Cross, 3 => Box });

/// Replaces the final output with an intermediate buffer for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugOutput {
    #[default]
    None,
    /// The captured scene (objects buffer).
    Objects,
    /// The jump flood seed field.
    Flood,
    /// The distance field.
    Distance,
}

raw_mode!(DebugOutput, UnknownDebugOutput, { 0 => None, 1 => Objects, 2 => Flood, 3 => Distance });

/// Where the final GI result is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalBlit {
    /// A global texture other stages can sample.
    Texture,
    /// The camera target.
    #[default]
    Camera,
}

raw_mode!(FinalBlit, UnknownFinalBlit, { 0 => Texture, 1 => Camera });

/// The kind of view a camera renders for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraKind {
    #[default]
    Game,
    SceneView,
    Preview,
    Reflection,
}

raw_mode!(CameraKind, UnknownCameraKind, { 0 => Game, 1 => SceneView, 2 => Preview, 3 => Reflection });

/// Point in the host frame at which the GI passes are scheduled.
///
/// The feature only carries this tag; the host's scheduler interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderEvent {
    BeforeRenderingShadows,
    #[default]
    BeforeRenderingOpaques,
    AfterRenderingOpaques,
    BeforeRenderingTransparents,
    AfterRenderingTransparents,
    BeforeRenderingPostProcessing,
    AfterRendering,
}

/// An inclusive range a tunable is clamped into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranged {
    pub min: f32,
    pub max: f32,
}

impl Ranged {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Clamps `value` into the range. NaN collapses to `min`.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Range of [`GiSettings::falloff`].
pub const FALLOFF_RANGE: Ranged = Ranged::new(0.01, 1.0);
/// Range of [`GiSettings::intensity`].
pub const INTENSITY_RANGE: Ranged = Ranged::new(0.0, 3.0);
/// Range of [`GiSettings::distance_offset`].
pub const DISTANCE_OFFSET_RANGE: Ranged = Ranged::new(0.0, 0.1);
/// Range of [`GiSettings::border`].
pub const BORDER_RANGE: Ranged = Ranged::new(0.0, 3.0);
/// Range of [`NoiseOptions::scale`].
pub const NOISE_SCALE_RANGE: Ranged = Ranged::new(0.01, 1.0);
/// Range of [`BlurOptions::step`].
pub const BLUR_STEP_RANGE: Ranged = Ranged::new(0.0, 0.01);
/// Maximum number of light bounces.
pub const MAX_BOUNCES: u32 = 3;

/// A value paired with an enabled flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Toggled<T> {
    pub enabled: bool,
    pub value: T,
}

impl<T> Toggled<T> {
    pub const fn on(value: T) -> Self {
        Self {
            enabled: true,
            value,
        }
    }

    pub const fn off(value: T) -> Self {
        Self {
            enabled: false,
            value,
        }
    }

    /// The value when enabled.
    pub fn get(&self) -> Option<&T> {
        self.enabled.then_some(&self.value)
    }
}

/// Ray tracing and bounce options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceOptions {
    pub enabled: bool,
    /// Re-mask the last bounce with the scene alpha.
    pub clean_edges: bool,
    /// Additional light bounces, `0..=3`.
    pub bounces: u32,
    /// Light contribution of each bounce.
    pub intensity: f32,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            clean_edges: false,
            bounces: 1,
            intensity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseOptions {
    pub mode: NoiseMode,
    /// Noise texture resolution relative to the screen.
    pub scale: f32,
}

impl Default for NoiseOptions {
    fn default() -> Self {
        Self {
            mode: NoiseMode::Shader,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleOptions {
    pub mode: ScaleMode,
    /// Used by [`ScaleMode::Ratio`].
    pub ratio: f32,
    /// Used by [`ScaleMode::FixedHeight`].
    pub height: u32,
}

impl Default for ScaleOptions {
    fn default() -> Self {
        Self {
            mode: ScaleMode::None,
            ratio: 1.0,
            height: 240,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    pub destination: FinalBlit,
    /// Global name the result is published under when the destination is a texture.
    pub global_texture: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            destination: FinalBlit::Camera,
            global_texture: "_GiTex".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurOptions {
    pub enabled: bool,
    pub mode: BlurMode,
    /// Sampling step in UV units; one texel when disabled.
    pub step: Toggled<f32>,
    /// Number of blur draws, at least one.
    pub passes: u32,
}

impl Default for BlurOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: BlurMode::Cross,
            step: Toggled::on(0.003),
            passes: 1,
        }
    }
}

/// All tunables of the GI feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GiSettings {
    pub render_event: RenderEvent,
    /// Layers whose objects are captured as light sources and occluders.
    pub layer_mask: u32,
    /// Capture the scene with a depth-stencil attachment.
    pub depth_stencil: bool,
    /// Rays emitted from each pixel.
    pub rays: u32,
    pub trace: TraceOptions,
    pub falloff: Toggled<f32>,
    pub intensity: Toggled<f32>,
    pub distance_offset: Toggled<f32>,
    pub noise: NoiseOptions,
    /// Extra orthographic camera space, so objects just outside the frame still emit.
    pub border: Toggled<f32>,
    pub scale: ScaleOptions,
    pub output: OutputOptions,
    pub blur: BlurOptions,
    pub debug_output: DebugOutput,
    /// Also run for scene view cameras, not only game cameras.
    pub run_in_scene_view: bool,
    /// Pixel format of every intermediate target.
    pub target_format: PixelFormat,
}

impl Default for GiSettings {
    fn default() -> Self {
        Self {
            render_event: RenderEvent::BeforeRenderingOpaques,
            layer_mask: u32::MAX,
            depth_stencil: true,
            rays: 100,
            trace: TraceOptions::default(),
            falloff: Toggled::off(1.0),
            intensity: Toggled::off(1.0),
            distance_offset: Toggled::off(0.0),
            noise: NoiseOptions::default(),
            border: Toggled::off(0.0),
            scale: ScaleOptions::default(),
            output: OutputOptions::default(),
            blur: BlurOptions::default(),
            debug_output: DebugOutput::None,
            run_in_scene_view: false,
            target_format: PixelFormat::Rgba16Float,
        }
    }
}

impl GiSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses settings from JSON; missing fields take their defaults.
    ///
    /// The result is clamped and validated.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: GiSettings = serde_json::from_str(json)?;
        let settings = settings.normalized();
        settings.validate()?;
        Ok(settings)
    }

    /// Serializes the settings as pretty-printed JSON, the format [`from_json`](Self::from_json) reads.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Set the number of rays per pixel.
    pub fn rays(mut self, rays: u32) -> Self {
        self.rays = rays;
        self
    }

    /// Set the number of light bounces after the first gather.
    pub fn bounces(mut self, bounces: u32) -> Self {
        self.trace.bounces = bounces;
        self
    }

    /// Set how the working resolution derives from the camera.
    pub fn scale_mode(mut self, mode: ScaleMode) -> Self {
        self.scale.mode = mode;
        self
    }

    /// Set the ray jitter source.
    pub fn noise_mode(mut self, mode: NoiseMode) -> Self {
        self.noise.mode = mode;
        self
    }

    /// Enable blurring of the GI result with the given mode.
    pub fn blur(mut self, mode: BlurMode) -> Self {
        self.blur.enabled = true;
        self.blur.mode = mode;
        self
    }

    /// Set the border margin in world units. Zero or less disables it.
    pub fn border(mut self, border: f32) -> Self {
        self.border = Toggled {
            enabled: border > 0.0,
            value: border,
        };
        self
    }

    /// Publish the result as a global texture named `name` instead of drawing to the camera.
    ///
    /// The name must not be one of the textures the passes use internally, such as
    /// `_MainTex` or `_DistTex`; [`validate`](Self::validate) rejects it.
    ///
    /// # Example
    ///
    /// ```
    /// use gilight2d::GiSettings;
    ///
    /// let settings = GiSettings::new().output_texture("_GiLightTex");
    /// assert!(settings.validate().is_ok());
    /// ```
    pub fn output_texture(mut self, name: impl Into<String>) -> Self {
        self.output.destination = FinalBlit::Texture;
        self.output.global_texture = name.into();
        self
    }

    /// Replace the final image with an intermediate buffer.
    pub fn debug_output(mut self, debug: DebugOutput) -> Self {
        self.debug_output = debug;
        self
    }

    /// Bounces that actually run: zero when tracing is disabled.
    pub fn effective_bounces(&self) -> u32 {
        if self.trace.enabled {
            self.trace.bounces.min(MAX_BOUNCES)
        } else {
            0
        }
    }

    /// Clean edges only applies when at least one bounce runs.
    pub fn clean_edges(&self) -> bool {
        self.trace.clean_edges && self.effective_bounces() > 0
    }

    /// Clamps every ranged tunable into its range.
    pub fn normalized(mut self) -> Self {
        self.falloff.value = FALLOFF_RANGE.clamp(self.falloff.value);
        self.intensity.value = INTENSITY_RANGE.clamp(self.intensity.value);
        self.distance_offset.value = DISTANCE_OFFSET_RANGE.clamp(self.distance_offset.value);
        self.border.value = BORDER_RANGE.clamp(self.border.value);
        self.noise.scale = NOISE_SCALE_RANGE.clamp(self.noise.scale);
        self.blur.step.value = BLUR_STEP_RANGE.clamp(self.blur.step.value);
        self.trace.bounces = self.trace.bounces.min(MAX_BOUNCES);
        self
    }

    /// Checks the settings for values no frame could be planned with.
    pub fn validate(&self) -> Result<()> {
        if self.rays == 0 {
            return Err(GiError::InvalidSettings("rays must be at least 1".into()));
        }
        match self.scale.mode {
            ScaleMode::Ratio if !(self.scale.ratio.is_finite() && self.scale.ratio > 0.0) => {
                return Err(GiError::InvalidSettings(format!(
                    "scale ratio must be positive, got {}",
                    self.scale.ratio
                )));
            }
            ScaleMode::FixedHeight if self.scale.height == 0 => {
                return Err(GiError::InvalidSettings(
                    "fixed height must be at least 1".into(),
                ));
            }
            _ => {}
        }
        if self.output.destination == FinalBlit::Texture && self.output.global_texture.is_empty()
        {
            return Err(GiError::InvalidSettings(
                "output global texture name is empty".into(),
            ));
        }
        if self.output.destination == FinalBlit::Texture
            && ids::RESERVED_TEXTURES.contains(&BindSlot::named(&self.output.global_texture))
        {
            return Err(GiError::InvalidSettings(format!(
                "output global texture name {:?} is used by the pipeline",
                self.output.global_texture
            )));
        }
        if self.blur.enabled && self.blur.passes == 0 {
            return Err(GiError::InvalidSettings(
                "blur needs at least one pass".into(),
            ));
        }
        if self.target_format.is_depth() {
            return Err(GiError::InvalidSettings(
                "intermediate targets need a color format".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_modes_round_trip_and_reject_unknown() {
        assert_eq!(ScaleMode::try_from(2).unwrap(), ScaleMode::FixedHeight);
        assert_eq!(i32::from(NoiseMode::None), 3);
        assert!(matches!(
            ScaleMode::try_from(7),
            Err(GiError::UnknownScaleMode(7))
        ));
        assert!(matches!(
            BlurMode::try_from(-1),
            Err(GiError::UnknownBlurMode(-1))
        ));
        assert!(matches!(
            NoiseMode::try_from(4),
            Err(GiError::UnknownNoiseMode(4))
        ));
    }

    #[test]
    fn json_missing_fields_take_defaults() {
        let settings = GiSettings::from_json("{}").unwrap();
        assert_eq!(settings, GiSettings::default());
    }

    #[test]
    fn json_unknown_mode_is_an_error() {
        let err = GiSettings::from_json(r#"{ "scale": { "mode": "stretch" } }"#).unwrap_err();
        assert!(matches!(err, GiError::Settings(_)));
    }

    #[test]
    fn json_values_are_clamped() {
        let settings = GiSettings::from_json(
            r#"{ "intensity": { "enabled": true, "value": 9.0 }, "trace": { "bounces": 8 } }"#,
        )
        .unwrap();
        assert_eq!(settings.intensity.value, 3.0);
        assert_eq!(settings.trace.bounces, MAX_BOUNCES);
    }

    #[test]
    fn validation_rejects_unplannable_values() {
        assert!(GiSettings::new().rays(0).validate().is_err());

        let mut ratio = GiSettings::new().scale_mode(ScaleMode::Ratio);
        ratio.scale.ratio = 0.0;
        assert!(ratio.validate().is_err());

        let mut fixed = GiSettings::new().scale_mode(ScaleMode::FixedHeight);
        fixed.scale.height = 0;
        assert!(fixed.validate().is_err());

        assert!(GiSettings::new().output_texture("").validate().is_err());
    }

    #[test]
    fn output_name_cannot_alias_a_pipeline_slot() {
        for name in ["_DistTex", "_GiObjectsTex", "_AlphaTex", "_JfaATex", "_MainTex"] {
            let err = GiSettings::new().output_texture(name).validate().unwrap_err();
            assert!(matches!(err, GiError::InvalidSettings(_)), "{name}");
        }
        assert!(GiSettings::new().output_texture("_GiTex").validate().is_ok());

        // Only a texture destination publishes the name
        let mut camera = GiSettings::new().output_texture("_DistTex");
        camera.output.destination = FinalBlit::Camera;
        assert!(camera.validate().is_ok());
    }

    #[test]
    fn tracing_disabled_means_no_bounces() {
        let mut settings = GiSettings::new().bounces(2);
        settings.trace.clean_edges = true;
        assert_eq!(settings.effective_bounces(), 2);
        assert!(settings.clean_edges());

        settings.trace.enabled = false;
        assert_eq!(settings.effective_bounces(), 0);
        assert!(!settings.clean_edges());
    }

    #[test]
    fn settings_survive_json() {
        let settings = GiSettings::new()
            .rays(12)
            .blur(BlurMode::Box)
            .output_texture("_Light");
        let json = settings.to_json().unwrap();
        assert_eq!(GiSettings::from_json(&json).unwrap(), settings);
    }
}
