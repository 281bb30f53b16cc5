//! Per-frame orchestration of the GI passes.
//!
//! A frame runs strictly in this order, and every step consumes the output of an earlier
//! one:
//!
//! ```text
//! setup ─▶ acquire ─▶ scene capture ─▶ [alpha mask] ─▶ jump flood ×(1 + k)
//!       ─▶ distance ─▶ gi (+ bounces) ─▶ [blur] ─▶ [composite / debug] ─▶ release
//! ```
//!
//! Setup plans the frame (resolution, which optional buffers exist, where each chain
//! writes) and can fail; nothing is acquired before it succeeds. Release runs after the
//! passes whatever they returned, so a frame never leaks a transient target.

use glam::{UVec2, Vec2, Vec4};

use crate::error::Result;
use crate::material::{Keywords, Material, MaterialStateManager, ProgramKind};
use crate::recorder::{CameraContext, CommandRecorder, RenderDest, SCENE_SHADER_TAGS, SceneDraw};
use crate::resolution::ResolutionPlan;
use crate::settings::{DebugOutput, FinalBlit, GiSettings, NoiseMode};
use crate::targets::{
    BindSlot, PingPong, PostProcessSession, TargetDescriptor, TransientTarget, ids,
};

/// Blit pass copying `_MainTex`.
const BLIT_COPY: u32 = 0;
/// Blit pass extracting the alpha mask of `_MainTex`.
const BLIT_ALPHA: u32 = 1;
const FLOOD_SEED: u32 = 0;
const FLOOD_STEP: u32 = 1;
const GI_GATHER: u32 = 0;
const GI_BOUNCE: u32 = 1;
const GI_BOUNCE_CLEAN: u32 = 2;

/// Noise state handed to a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseFrame {
    /// Size of the bound noise texture, `None` when it is unavailable.
    pub size: Option<UVec2>,
    /// UV offset applied when sampling the texture.
    pub offset: Vec2,
}

/// Everything decided about a frame before any GPU work is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub resolution: ResolutionPlan,
    pub descriptor: TargetDescriptor,
    /// Flood steps after the seed pass.
    pub flood_steps: u32,
    pub bounces: u32,
    pub clean_edges: bool,
    /// Blur draws; zero when blur is disabled.
    pub blur_passes: u32,
    pub debug: DebugOutput,
    /// Final destination of the frame.
    pub destination: RenderDest,
    /// The published output target when the destination is a texture.
    pub output: Option<BindSlot>,
}

impl FramePlan {
    pub fn new(settings: &GiSettings, camera: &CameraContext) -> Result<Self> {
        let border = settings.border.get().copied();
        let resolution = ResolutionPlan::new(
            camera.target_size,
            camera.orthographic_size,
            &settings.scale,
            border,
        )?;
        let descriptor = resolution.descriptor(settings.target_format);

        let output = match settings.output.destination {
            FinalBlit::Texture => Some(BindSlot::named(&settings.output.global_texture)),
            FinalBlit::Camera => None,
        };
        let destination = output.map_or(RenderDest::Camera, RenderDest::Target);

        Ok(Self {
            flood_steps: resolution.flood_steps(),
            resolution,
            descriptor,
            bounces: settings.effective_bounces(),
            clean_edges: settings.clean_edges(),
            blur_passes: if settings.blur.enabled {
                settings.blur.passes.max(1)
            } else {
                0
            },
            debug: settings.debug_output,
            destination,
            output,
        })
    }

    /// Whether the camera only shows the center of the bordered buffers.
    pub fn crops(&self) -> bool {
        self.destination == RenderDest::Camera && self.resolution.uv_scale != 1.0
    }

    /// Whether a final blit into the destination is needed.
    pub fn composites(&self) -> bool {
        self.debug != DebugOutput::None || self.crops()
    }

    pub fn blurs(&self) -> bool {
        self.blur_passes > 0
    }

    /// Where the GI chain writes.
    pub fn gi_output(&self) -> RenderDest {
        if self.blurs() || self.composites() {
            RenderDest::Target(ids::GI_RESULT_TEX)
        } else {
            self.destination
        }
    }

    /// Where the blur chain writes.
    pub fn blur_output(&self) -> RenderDest {
        if self.composites() {
            RenderDest::Target(ids::BLUR_RESULT_TEX)
        } else {
            self.destination
        }
    }

    /// The buffer the final composite reads.
    pub fn composite_source(&self) -> BindSlot {
        match self.debug {
            DebugOutput::Objects => ids::OBJECTS_TEX,
            DebugOutput::Flood => flood_result(self.flood_steps),
            DebugOutput::Distance => ids::DIST_TEX,
            DebugOutput::None if self.blurs() => ids::BLUR_RESULT_TEX,
            DebugOutput::None => ids::GI_RESULT_TEX,
        }
    }
}

/// The flood target holding the final seed field after `steps` flood steps.
///
/// The seed pass writes target A and every step flips the pair before writing.
fn flood_result(steps: u32) -> BindSlot {
    if steps % 2 == 0 {
        ids::JFA_A_TEX
    } else {
        ids::JFA_B_TEX
    }
}

/// Records the GI frame for one camera.
#[derive(Debug)]
pub struct GiPass {
    objects: TransientTarget,
    alpha: TransientTarget,
    flood: PingPong,
    distance: TransientTarget,
    gi_result: TransientTarget,
    blur_result: TransientTarget,
    output: Option<TransientTarget>,
    gi: PostProcessSession,
    blur: PostProcessSession,
    last_plan: Option<FramePlan>,
}

impl Default for GiPass {
    fn default() -> Self {
        Self::new()
    }
}

impl GiPass {
    pub fn new() -> Self {
        Self {
            objects: TransientTarget::from_slot(ids::OBJECTS_TEX),
            alpha: TransientTarget::from_slot(ids::ALPHA_TEX),
            flood: PingPong::new(
                TransientTarget::from_slot(ids::JFA_A_TEX),
                TransientTarget::from_slot(ids::JFA_B_TEX),
            ),
            distance: TransientTarget::from_slot(ids::DIST_TEX),
            gi_result: TransientTarget::from_slot(ids::GI_RESULT_TEX),
            blur_result: TransientTarget::from_slot(ids::BLUR_RESULT_TEX),
            output: None,
            gi: PostProcessSession::new(PingPong::new(
                TransientTarget::from_slot(ids::GI_A_TEX),
                TransientTarget::from_slot(ids::GI_B_TEX),
            )),
            blur: PostProcessSession::new(PingPong::new(
                TransientTarget::from_slot(ids::BLUR_A_TEX),
                TransientTarget::from_slot(ids::BLUR_B_TEX),
            )),
            last_plan: None,
        }
    }

    /// The plan of the most recently recorded frame.
    pub fn last_plan(&self) -> Option<&FramePlan> {
        self.last_plan.as_ref()
    }

    /// Records a planned frame: constants, acquire, passes, release.
    ///
    /// Planning (see [`FramePlan::new`]) is the only step that can fail with a
    /// configuration error, and it runs before this is called.
    pub fn record<R: CommandRecorder + ?Sized>(
        &mut self,
        recorder: &mut R,
        plan: FramePlan,
        settings: &GiSettings,
        materials: &mut MaterialStateManager,
        noise: NoiseFrame,
    ) -> Result<()> {
        if self.last_plan.as_ref() != Some(&plan) {
            log::debug!(
                "GI plan: {}x{} (uv scale {}), {} flood steps, {} bounces, {} blur passes, debug {:?}",
                plan.descriptor.width,
                plan.descriptor.height,
                plan.resolution.uv_scale,
                plan.flood_steps,
                plan.bounces,
                plan.blur_passes,
                plan.debug,
            );
        }
        self.apply_constants(&plan, settings, materials, noise);

        self.acquire(recorder, &plan);
        let outcome = self.record_passes(recorder, &plan, settings, materials, noise);
        self.release(recorder);

        self.last_plan = Some(plan);
        outcome
    }

    fn apply_constants(
        &self,
        plan: &FramePlan,
        settings: &GiSettings,
        materials: &mut MaterialStateManager,
        noise: NoiseFrame,
    ) {
        let size = plan.descriptor.size().as_vec2();
        let uv_scale = plan.resolution.uv_scale;

        let gi = materials.material_mut(ProgramKind::Gi);
        gi.set_vector(ids::SCALE, Vec4::new(uv_scale, uv_scale, 1.0, 1.0));
        gi.set_float(ids::SAMPLES, settings.rays as f32);
        gi.set_float(ids::ASPECT, plan.descriptor.aspect());
        gi.set_float(ids::INTENSITY_BOUNCE, settings.trace.intensity);
        match settings.falloff.get() {
            Some(falloff) => gi.set_float(ids::FALLOFF, *falloff),
            None => gi.clear_property(ids::FALLOFF),
        }
        match settings.intensity.get() {
            Some(intensity) => gi.set_float(ids::INTENSITY, *intensity),
            None => gi.clear_property(ids::INTENSITY),
        }
        gi.set_vector(
            ids::NOISE_OFFSET,
            Vec4::new(noise.offset.x, noise.offset.y, 0.0, 0.0),
        );
        let tiling = noise.size.map_or(Vec2::ONE, |noise| size / noise.as_vec2());
        gi.set_vector(ids::NOISE_TILING, Vec4::new(tiling.x, tiling.y, 0.0, 0.0));
        gi.set_texture(ids::COLOR_TEX, ids::OBJECTS_TEX);
        gi.set_texture(ids::DIST_TEX, ids::DIST_TEX);
        if plan.bounces > 0 {
            gi.set_texture(ids::ALPHA_TEX, ids::ALPHA_TEX);
        } else {
            gi.clear_property(ids::ALPHA_TEX);
        }

        let step = match settings.blur.step.get() {
            Some(step) => Vec2::splat(*step),
            None => Vec2::ONE / size,
        };
        materials
            .material_mut(ProgramKind::Blur)
            .set_vector(ids::STEP, Vec4::new(step.x, step.y, 0.0, 0.0));
    }

    fn acquire<R: CommandRecorder + ?Sized>(&mut self, recorder: &mut R, plan: &FramePlan) {
        let desc = &plan.descriptor;

        self.objects.acquire(recorder, desc);
        if plan.bounces > 0 {
            self.alpha.acquire(recorder, desc);
        }
        self.flood.acquire(recorder, desc);
        self.distance.acquire(recorder, desc);
        if plan.bounces > 0 {
            self.gi.pair_mut().acquire(recorder, desc);
        }
        if plan.gi_output() == RenderDest::Target(ids::GI_RESULT_TEX) {
            self.gi_result.acquire(recorder, desc);
        }
        if plan.blurs() {
            if plan.blur_passes > 1 {
                self.blur.pair_mut().acquire(recorder, desc);
            }
            if plan.blur_output() == RenderDest::Target(ids::BLUR_RESULT_TEX) {
                self.blur_result.acquire(recorder, desc);
            }
        }

        self.output = plan.output.map(TransientTarget::from_slot);
        if let Some(output) = self.output.as_mut() {
            output.acquire(recorder, desc);
        }
    }

    fn record_passes<R: CommandRecorder + ?Sized>(
        &mut self,
        recorder: &mut R,
        plan: &FramePlan,
        settings: &GiSettings,
        materials: &mut MaterialStateManager,
        noise: NoiseFrame,
    ) -> Result<()> {
        // Scene capture
        recorder.draw_scene(&SceneDraw {
            layer_mask: settings.layer_mask,
            shader_tags: &SCENE_SHADER_TAGS,
            target: self.objects.slot(),
            depth_stencil: settings.depth_stencil,
            capture_scale: plan.resolution.uv_scale,
        })?;

        if plan.bounces > 0 {
            let blit = materials.material_mut(ProgramKind::Blit);
            blit.set_float(ids::UV_SCALE, 1.0);
            recorder.set_global_texture(ids::MAIN_TEX, self.objects.slot());
            recorder.draw_fullscreen(blit, BLIT_ALPHA, RenderDest::Target(self.alpha.slot()))?;
        }

        self.record_flood(recorder, plan, materials.material_mut(ProgramKind::JumpFlood))?;

        // Distance field
        recorder.set_global_texture(ids::MAIN_TEX, self.flood.to().slot());
        recorder.draw_fullscreen(
            materials.material(ProgramKind::Distance),
            0,
            RenderDest::Target(self.distance.slot()),
        )?;

        // Gather and bounces
        let fallback;
        let gi = if settings.noise.mode.uses_texture() && noise.size.is_none() {
            fallback = without_noise_texture(materials.material(ProgramKind::Gi));
            &fallback
        } else {
            materials.material(ProgramKind::Gi)
        };
        self.gi
            .setup(recorder, plan.gi_output(), plan.bounces, gi, GI_GATHER)?;
        for _ in 0..plan.bounces {
            let pass = if plan.clean_edges && self.gi.is_last_pass() {
                GI_BOUNCE_CLEAN
            } else {
                GI_BOUNCE
            };
            self.gi.apply(recorder, gi, pass)?;
        }

        if plan.blurs() {
            let blur = materials.material(ProgramKind::Blur);
            recorder.set_global_texture(ids::MAIN_TEX, ids::GI_RESULT_TEX);
            self.blur
                .setup(recorder, plan.blur_output(), plan.blur_passes - 1, blur, 0)?;
            for _ in 1..plan.blur_passes {
                self.blur.apply(recorder, blur, 0)?;
            }
        }

        if plan.composites() {
            let blit = materials.material_mut(ProgramKind::Blit);
            let crop = if plan.crops() {
                1.0 / plan.resolution.uv_scale
            } else {
                1.0
            };
            blit.set_float(ids::UV_SCALE, crop);
            recorder.set_global_texture(ids::MAIN_TEX, plan.composite_source());
            recorder.draw_fullscreen(blit, BLIT_COPY, plan.destination)?;
        }

        if let Some(output) = plan.output {
            recorder.set_global_texture(output, output);
        }
        Ok(())
    }

    /// Seed pass into the pair, then `flood_steps` steps of halving size down to one texel.
    fn record_flood<R: CommandRecorder + ?Sized>(
        &mut self,
        recorder: &mut R,
        plan: &FramePlan,
        jfa: &mut Material,
    ) -> Result<()> {
        let size = plan.descriptor.size().as_vec2();
        self.flood.reset();

        recorder.set_global_texture(ids::MAIN_TEX, self.objects.slot());
        recorder.draw_fullscreen(jfa, FLOOD_SEED, RenderDest::Target(self.flood.to().slot()))?;

        for i in 0..plan.flood_steps {
            let step = (1u32 << (plan.flood_steps - 1 - i)) as f32;
            self.flood.flip();
            jfa.set_vector(
                ids::STEP_SIZE,
                Vec4::new(step / size.x, step / size.y, step, 0.0),
            );
            recorder.set_global_texture(ids::MAIN_TEX, self.flood.from().slot());
            recorder.draw_fullscreen(jfa, FLOOD_STEP, RenderDest::Target(self.flood.to().slot()))?;
        }
        debug_assert_eq!(self.flood.to().slot(), flood_result(plan.flood_steps));
        Ok(())
    }

    /// Releases every target this pass may have acquired.
    fn release<R: CommandRecorder + ?Sized>(&mut self, recorder: &mut R) {
        self.objects.release(recorder);
        self.alpha.release(recorder);
        self.flood.release(recorder);
        self.distance.release(recorder);
        self.gi.pair_mut().release(recorder);
        self.gi_result.release(recorder);
        self.blur.pair_mut().release(recorder);
        self.blur_result.release(recorder);
        if let Some(mut output) = self.output.take() {
            output.release(recorder);
        }
    }
}

/// A frame-local GI variant using the in-program hash instead of the missing texture.
fn without_noise_texture(gi: &Material) -> Material {
    let mut fallback = gi.clone();
    fallback.disable_keyword(Keywords::for_noise(NoiseMode::Dynamic));
    fallback.enable_keyword(Keywords::for_noise(NoiseMode::Shader));
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::CameraKind;

    fn camera(width: u32, height: u32) -> CameraContext {
        CameraContext::new(CameraKind::Game, width, height, 5.0)
    }

    #[test]
    fn plain_frame_writes_camera_directly() {
        let plan = FramePlan::new(&GiSettings::new().bounces(0), &camera(64, 64)).unwrap();
        assert_eq!(plan.gi_output(), RenderDest::Camera);
        assert!(!plan.composites());
        assert_eq!(plan.flood_steps, 6);
    }

    #[test]
    fn border_on_camera_composites_with_crop() {
        let plan = FramePlan::new(&GiSettings::new().border(1.0), &camera(100, 100)).unwrap();
        assert!(plan.crops());
        assert_eq!(plan.gi_output(), RenderDest::Target(ids::GI_RESULT_TEX));
        assert_eq!(plan.composite_source(), ids::GI_RESULT_TEX);
    }

    #[test]
    fn border_on_texture_output_keeps_the_margin() {
        let settings = GiSettings::new().border(1.0).output_texture("_GiTex");
        let plan = FramePlan::new(&settings, &camera(100, 100)).unwrap();
        assert!(!plan.crops());
        assert_eq!(plan.gi_output(), plan.destination);
        assert_eq!(plan.output, Some(BindSlot::named("_GiTex")));
    }

    #[test]
    fn debug_flood_reads_the_last_written_target() {
        let settings = GiSettings::new().debug_output(DebugOutput::Flood);
        let even = FramePlan::new(&settings, &camera(4, 4)).unwrap();
        assert_eq!(even.flood_steps, 2);
        assert_eq!(even.composite_source(), ids::JFA_A_TEX);
        let odd = FramePlan::new(&settings, &camera(8, 8)).unwrap();
        assert_eq!(odd.flood_steps, 3);
        assert_eq!(odd.composite_source(), ids::JFA_B_TEX);
    }

    #[test]
    fn blur_chains_after_gi() {
        let plan = FramePlan::new(&GiSettings::new().blur(crate::settings::BlurMode::Box), &camera(32, 32))
            .unwrap();
        assert_eq!(plan.gi_output(), RenderDest::Target(ids::GI_RESULT_TEX));
        assert_eq!(plan.blur_output(), RenderDest::Camera);
        assert_eq!(plan.blur_passes, 1);
    }

    #[test]
    fn noise_fallback_swaps_variant_on_a_copy() {
        let mut materials =
            MaterialStateManager::new(&GiSettings::new().noise_mode(NoiseMode::Dynamic));
        let fallback = without_noise_texture(materials.material(ProgramKind::Gi));
        assert!(fallback.is_enabled(Keywords::FRAGMENT_RANDOM));
        assert!(!fallback.is_enabled(Keywords::TEXTURE_RANDOM));
        assert!(
            materials
                .material_mut(ProgramKind::Gi)
                .is_enabled(Keywords::TEXTURE_RANDOM)
        );
    }
}
