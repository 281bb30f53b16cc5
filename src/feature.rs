//! The per-camera entry point an embedding drives.

use glam::Vec2;

use crate::error::{GiError, Result};
use crate::gi_pass::{FramePlan, GiPass, NoiseFrame};
use crate::material::MaterialStateManager;
use crate::noise::{NoiseProvider, SharedNoise};
use crate::recorder::{CameraContext, CommandRecorder};
use crate::settings::{
    BlurMode, CameraKind, FALLOFF_RANGE, GiSettings, INTENSITY_RANGE, NoiseMode, RenderEvent,
    BORDER_RANGE, NOISE_SCALE_RANGE,
};
use crate::targets::ids;

/// 2D global illumination for one camera pipeline.
///
/// The embedding creates the feature once, asks [`should_run`](Self::should_run) for every
/// camera it renders and then hands a [`CommandRecorder`] to
/// [`record_frame`](Self::record_frame):
///
/// ```no_run
/// # use gilight2d::*;
/// # fn frame<R: CommandRecorder<Texture = ()>>(recorder: &mut R) -> gilight2d::Result<()> {
/// let noise = NoiseProvider::new().shared();
/// let mut gi = GiLightFeature::create(GiSettings::new().bounces(2), noise)?;
///
/// let camera = CameraContext::new(CameraKind::Game, 1280, 720, 5.0);
/// if gi.should_run(&camera) {
///     gi.record_frame(&camera, recorder)?;
/// }
/// # Ok(())
/// # }
/// ```
///
/// Several features may share one [`NoiseProvider`]; the noise texture is then allocated
/// once for all of them.
pub struct GiLightFeature<T> {
    settings: GiSettings,
    materials: MaterialStateManager,
    pass: GiPass,
    noise: SharedNoise<T>,
}

impl<T> GiLightFeature<T> {
    /// Validates `settings` and builds the program instances.
    pub fn create(settings: GiSettings, noise: SharedNoise<T>) -> Result<Self> {
        let settings = settings.normalized();
        settings.validate()?;

        let materials = MaterialStateManager::new(&settings);
        log::info!(
            "GI feature created: {} rays, {} bounces, noise {:?}, blur {}, output {:?}",
            settings.rays,
            settings.effective_bounces(),
            settings.noise.mode,
            if settings.blur.enabled { "on" } else { "off" },
            settings.output.destination,
        );

        Ok(Self {
            settings,
            materials,
            pass: GiPass::new(),
            noise,
        })
    }

    /// Like [`create`](Self::create) with a noise provider of its own.
    pub fn standalone(settings: GiSettings) -> Result<Self> {
        Self::create(settings, NoiseProvider::new().shared())
    }

    /// The current settings, as normalized by the last edit.
    pub fn settings(&self) -> &GiSettings {
        &self.settings
    }

    pub fn materials(&self) -> &MaterialStateManager {
        &self.materials
    }

    /// The noise provider, shared with any other feature created from the same handle.
    pub fn noise(&self) -> &SharedNoise<T> {
        &self.noise
    }

    /// When the host should schedule the GI passes.
    pub fn render_event(&self) -> RenderEvent {
        self.settings.render_event
    }

    /// The plan of the last recorded frame.
    pub fn last_plan(&self) -> Option<&FramePlan> {
        self.pass.last_plan()
    }

    /// Whether GI should be recorded for this camera.
    ///
    /// Game cameras always run, scene view cameras only when enabled in the settings,
    /// every other kind never does.
    pub fn should_run(&self, camera: &CameraContext) -> bool {
        let wanted = match camera.kind {
            CameraKind::Game => true,
            CameraKind::SceneView => self.settings.run_in_scene_view,
            CameraKind::Preview | CameraKind::Reflection => false,
        };
        if wanted && (camera.target_size.x == 0 || camera.target_size.y == 0) {
            log::warn!("Skipping GI for {:?} camera with an empty target", camera.kind);
            return false;
        }
        wanted
    }

    /// Records the whole GI frame for one camera.
    ///
    /// Configuration errors are returned before any target is acquired. Recording errors
    /// are returned after every acquired target has been released.
    pub fn record_frame<R>(&mut self, camera: &CameraContext, recorder: &mut R) -> Result<()>
    where
        R: CommandRecorder<Texture = T> + ?Sized,
    {
        let plan = FramePlan::new(&self.settings, camera)?;
        let noise = self.prepare_noise(camera, recorder);
        self.pass
            .record(recorder, plan, &self.settings, &mut self.materials, noise)
    }

    fn prepare_noise<R>(&self, camera: &CameraContext, recorder: &mut R) -> NoiseFrame
    where
        R: CommandRecorder<Texture = T> + ?Sized,
    {
        let mode = self.settings.noise.mode;
        if !mode.uses_texture() {
            return NoiseFrame {
                size: None,
                offset: Vec2::ZERO,
            };
        }

        let mut noise = self.noise.borrow_mut();
        noise.ensure(recorder, camera.target_size, self.settings.noise.scale);
        if let Some(texture) = noise.texture() {
            recorder.set_global_external(ids::NOISE_TEX, texture);
        }
        let offset = if mode == NoiseMode::Dynamic {
            noise.random_offset()
        } else {
            Vec2::ZERO
        };
        NoiseFrame {
            size: noise.size(),
            offset,
        }
    }

    /// Switches the noise source. Returns whether anything changed.
    pub fn set_noise_mode(&mut self, mode: NoiseMode) -> bool {
        self.settings.noise.mode = mode;
        self.materials.set_noise_mode(mode)
    }

    /// [`set_noise_mode`](Self::set_noise_mode) from a raw mode value.
    pub fn set_noise_mode_raw(&mut self, raw: i32) -> Result<bool> {
        Ok(self.set_noise_mode(NoiseMode::try_from(raw)?))
    }

    /// Switches the blur direction. Returns whether anything changed.
    pub fn set_blur_mode(&mut self, mode: BlurMode) -> bool {
        self.settings.blur.mode = mode;
        self.materials.set_blur_mode(mode)
    }

    /// [`set_blur_mode`](Self::set_blur_mode) from a raw mode value.
    pub fn set_blur_mode_raw(&mut self, raw: i32) -> Result<bool> {
        Ok(self.set_blur_mode(BlurMode::try_from(raw)?))
    }

    /// Noise resolution relative to the screen; the texture follows on the next frame.
    pub fn set_noise_scale(&mut self, scale: f32) {
        self.settings.noise.scale = NOISE_SCALE_RANGE.clamp(scale);
    }

    pub fn noise_scale(&self) -> f32 {
        self.settings.noise.scale
    }

    /// Rays per pixel for the gather passes.
    ///
    /// # Errors
    ///
    /// [`GiError::InvalidSettings`] for zero rays.
    pub fn set_samples(&mut self, rays: u32) -> Result<()> {
        if rays == 0 {
            return Err(GiError::InvalidSettings("rays must be at least 1".into()));
        }
        self.settings.rays = rays;
        Ok(())
    }

    pub fn samples(&self) -> u32 {
        self.settings.rays
    }

    /// Sets the falloff value. Whether it applies is fixed until
    /// [`reinitialize_materials`](Self::reinitialize_materials).
    pub fn set_falloff(&mut self, falloff: f32) {
        self.settings.falloff.value = FALLOFF_RANGE.clamp(falloff);
    }

    pub fn falloff(&self) -> f32 {
        self.settings.falloff.value
    }

    /// Sets the intensity value. Whether it applies is fixed until
    /// [`reinitialize_materials`](Self::reinitialize_materials).
    pub fn set_intensity(&mut self, intensity: f32) {
        self.settings.intensity.value = INTENSITY_RANGE.clamp(intensity);
    }

    pub fn intensity(&self) -> f32 {
        self.settings.intensity.value
    }

    /// Working resolution ratio, used by [`ScaleMode::Ratio`](crate::ScaleMode::Ratio).
    pub fn set_scale_ratio(&mut self, ratio: f32) -> Result<()> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(GiError::InvalidSettings(format!(
                "scale ratio must be positive, got {ratio}"
            )));
        }
        self.settings.scale.ratio = ratio;
        Ok(())
    }

    pub fn scale_ratio(&self) -> f32 {
        self.settings.scale.ratio
    }

    /// Sets the border margin in world units; a positive value enables it.
    pub fn set_border(&mut self, border: f32) {
        let border = BORDER_RANGE.clamp(border);
        self.settings.border.value = border;
        self.settings.border.enabled = border > 0.0;
    }

    /// The border margin, `None` when disabled.
    pub fn border(&self) -> Option<f32> {
        self.settings.border.get().copied()
    }

    /// Edits the settings as a whole.
    ///
    /// The edited copy is clamped and validated before it replaces the current settings;
    /// on error nothing changes. Mode changes go through the usual transitions and the
    /// enabled-state flags are re-applied.
    pub fn configure(&mut self, edit: impl FnOnce(&mut GiSettings)) -> Result<()> {
        let mut settings = self.settings.clone();
        edit(&mut settings);
        let settings = settings.normalized();
        settings.validate()?;

        self.settings = settings;
        self.reinitialize_materials();
        Ok(())
    }

    /// Re-applies every capability flag from the current settings.
    pub fn reinitialize_materials(&mut self) {
        self.materials.set_noise_mode(self.settings.noise.mode);
        self.materials.set_blur_mode(self.settings.blur.mode);
        self.materials.reinitialize(&self.settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Keywords, ProgramKind};

    fn feature(settings: GiSettings) -> GiLightFeature<()> {
        GiLightFeature::create(settings, NoiseProvider::with_seed(3).shared()).unwrap()
    }

    #[test]
    fn camera_gating() {
        let mut gi = feature(GiSettings::new());
        let camera = |kind| CameraContext::new(kind, 320, 180, 5.0);
        assert!(gi.should_run(&camera(CameraKind::Game)));
        assert!(!gi.should_run(&camera(CameraKind::SceneView)));
        assert!(!gi.should_run(&camera(CameraKind::Preview)));
        assert!(!gi.should_run(&camera(CameraKind::Reflection)));

        gi.configure(|s| s.run_in_scene_view = true).unwrap();
        assert!(gi.should_run(&camera(CameraKind::SceneView)));
        assert!(!gi.should_run(&CameraContext::new(CameraKind::Game, 0, 180, 5.0)));
    }

    #[test]
    fn create_rejects_invalid_settings() {
        let result = GiLightFeature::<()>::create(
            GiSettings::new().rays(0),
            NoiseProvider::with_seed(1).shared(),
        );
        assert!(matches!(result, Err(GiError::InvalidSettings(_))));
    }

    #[test]
    fn setters_clamp_and_transition() {
        let mut gi = feature(GiSettings::new());
        gi.set_intensity(10.0);
        assert_eq!(gi.intensity(), 3.0);
        gi.set_border(-1.0);
        assert_eq!(gi.border(), None);
        gi.set_border(0.5);
        assert_eq!(gi.border(), Some(0.5));
        assert!(gi.set_scale_ratio(0.0).is_err());
        assert!(gi.set_samples(0).is_err());

        assert!(gi.set_noise_mode(NoiseMode::Static));
        assert!(!gi.set_noise_mode(NoiseMode::Static));
        assert_eq!(gi.settings().noise.mode, NoiseMode::Static);
        assert!(
            gi.materials()
                .material(ProgramKind::Gi)
                .is_enabled(Keywords::TEXTURE_RANDOM)
        );
        assert!(gi.set_blur_mode_raw(7).is_err());
    }

    #[test]
    fn configure_is_all_or_nothing() {
        let mut gi = feature(GiSettings::new());
        assert!(gi.configure(|s| {
            s.rays = 0;
            s.noise.mode = NoiseMode::None;
        })
        .is_err());
        assert_eq!(gi.settings().rays, 100);
        assert_eq!(gi.materials().noise_mode(), NoiseMode::Shader);

        gi.configure(|s| {
            s.falloff.enabled = true;
            s.blur.mode = BlurMode::Vertical;
        })
        .unwrap();
        let materials = gi.materials();
        assert!(materials.material(ProgramKind::Gi).is_enabled(Keywords::FALLOFF_IMPACT));
        assert_eq!(materials.material(ProgramKind::Blur).keywords(), Keywords::VERTICAL);
    }
}
