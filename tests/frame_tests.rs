//! Whole-frame recording against a recorder that only logs what it is asked to do.

use std::collections::HashSet;

use gilight2d::targets::ids;
use gilight2d::*;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Acquire(BindSlot),
    Release(BindSlot),
    CreateNoise(UVec2),
    Global(BindSlot, BindSlot),
    External(BindSlot),
    Scene(BindSlot),
    Draw {
        program: ProgramKind,
        pass: u32,
        target: RenderDest,
        keywords: Keywords,
    },
}

#[derive(Default)]
struct LogRecorder {
    calls: Vec<Call>,
    live: HashSet<BindSlot>,
    capture_scales: Vec<f32>,
    fail_program: Option<ProgramKind>,
    fail_noise: bool,
}

impl LogRecorder {
    fn draws(&self) -> Vec<(ProgramKind, u32, RenderDest)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw {
                    program,
                    pass,
                    target,
                    ..
                } => Some((*program, *pass, *target)),
                _ => None,
            })
            .collect()
    }

    fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    fn acquired(&self) -> Vec<BindSlot> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Acquire(slot) => Some(*slot),
                _ => None,
            })
            .collect()
    }

    fn gi_keywords(&self) -> Vec<Keywords> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw {
                    program: ProgramKind::Gi,
                    keywords,
                    ..
                } => Some(*keywords),
                _ => None,
            })
            .collect()
    }
}

impl CommandRecorder for LogRecorder {
    type Texture = UVec2;

    fn acquire(&mut self, slot: BindSlot, _: &TargetDescriptor) {
        assert!(self.live.insert(slot), "{slot:?} acquired while live");
        self.calls.push(Call::Acquire(slot));
    }

    fn release(&mut self, slot: BindSlot) {
        assert!(self.live.remove(&slot), "{slot:?} released while not live");
        self.calls.push(Call::Release(slot));
    }

    fn create_noise_texture(&mut self, size: UVec2, texels: &[u8]) -> gilight2d::Result<UVec2> {
        assert_eq!(texels.len(), (size.x * size.y) as usize);
        self.calls.push(Call::CreateNoise(size));
        if self.fail_noise {
            return Err(GiError::TextureCreation("out of memory".into()));
        }
        Ok(size)
    }

    fn set_global_texture(&mut self, name: BindSlot, source: BindSlot) {
        self.calls.push(Call::Global(name, source));
    }

    fn set_global_external(&mut self, name: BindSlot, _: &UVec2) {
        self.calls.push(Call::External(name));
    }

    fn draw_scene(&mut self, draw: &SceneDraw<'_>) -> gilight2d::Result<()> {
        assert!(self.live.contains(&draw.target));
        self.calls.push(Call::Scene(draw.target));
        self.capture_scales.push(draw.capture_scale);
        Ok(())
    }

    fn draw_fullscreen(
        &mut self,
        material: &Material,
        pass: u32,
        target: RenderDest,
    ) -> gilight2d::Result<()> {
        if self.fail_program == Some(material.program()) {
            return Err(GiError::UnboundTexture("injected".into()));
        }
        if let RenderDest::Target(slot) = target {
            assert!(self.live.contains(&slot), "draw into {slot:?} which is not live");
        }
        self.calls.push(Call::Draw {
            program: material.program(),
            pass,
            target,
            keywords: material.keywords(),
        });
        Ok(())
    }
}

fn feature(settings: GiSettings) -> GiLightFeature<UVec2> {
    GiLightFeature::create(settings, NoiseProvider::with_seed(7).shared()).unwrap()
}

fn game(width: u32, height: u32) -> CameraContext {
    CameraContext::new(CameraKind::Game, width, height, 5.0)
}

#[test]
fn plain_frame_is_scene_flood_distance_gi() {
    let mut gi = feature(GiSettings::new().bounces(0));
    let mut rec = LogRecorder::default();
    gi.record_frame(&game(64, 64), &mut rec).unwrap();

    assert_eq!(rec.count(|c| matches!(c, Call::Scene(_))), 1);
    let draws = rec.draws();
    assert_eq!(draws.len(), 1 + 6 + 1 + 1);
    assert_eq!(
        draws[0],
        (ProgramKind::JumpFlood, 0, RenderDest::Target(ids::JFA_A_TEX))
    );
    assert!(draws[1..7].iter().all(|(p, pass, _)| *p == ProgramKind::JumpFlood && *pass == 1));
    assert_eq!(
        draws[7],
        (ProgramKind::Distance, 0, RenderDest::Target(ids::DIST_TEX))
    );
    assert_eq!(draws[8], (ProgramKind::Gi, 0, RenderDest::Camera));
    assert!(draws.iter().all(|(p, _, _)| *p != ProgramKind::Blit));

    let acquired: HashSet<_> = rec.acquired().into_iter().collect();
    let expected: HashSet<_> = [ids::OBJECTS_TEX, ids::JFA_A_TEX, ids::JFA_B_TEX, ids::DIST_TEX]
        .into_iter()
        .collect();
    assert_eq!(acquired, expected);
    assert!(rec.live.is_empty());
}

#[test]
fn scene_capture_comes_first_and_release_last() {
    let mut gi = feature(GiSettings::new());
    let mut rec = LogRecorder::default();
    gi.record_frame(&game(32, 32), &mut rec).unwrap();

    let first_scene = rec.calls.iter().position(|c| matches!(c, Call::Scene(_))).unwrap();
    let last_acquire = rec.calls.iter().rposition(|c| matches!(c, Call::Acquire(_))).unwrap();
    let first_release = rec.calls.iter().position(|c| matches!(c, Call::Release(_))).unwrap();
    let last_draw = rec.calls.iter().rposition(|c| matches!(c, Call::Draw { .. })).unwrap();
    assert!(last_acquire < first_scene);
    assert!(last_draw < first_release);
    assert_eq!(rec.calls[first_scene], Call::Scene(ids::OBJECTS_TEX));
}

#[test]
fn flood_steps_alternate_and_distance_reads_the_result() {
    // 8x8 needs three steps, so the seed field ends in B
    let mut gi = feature(GiSettings::new().bounces(0));
    let mut rec = LogRecorder::default();
    gi.record_frame(&game(8, 8), &mut rec).unwrap();

    let flood_targets: Vec<_> = rec
        .draws()
        .into_iter()
        .filter(|(p, _, _)| *p == ProgramKind::JumpFlood)
        .map(|(_, _, target)| target)
        .collect();
    let a = RenderDest::Target(ids::JFA_A_TEX);
    let b = RenderDest::Target(ids::JFA_B_TEX);
    assert_eq!(flood_targets, vec![a, b, a, b]);

    let distance = rec
        .calls
        .iter()
        .position(|c| matches!(c, Call::Draw { program: ProgramKind::Distance, .. }))
        .unwrap();
    assert_eq!(rec.calls[distance - 1], Call::Global(ids::MAIN_TEX, ids::JFA_B_TEX));
}

#[test]
fn bounces_mask_alpha_and_chain_through_the_pair() {
    let mut settings = GiSettings::new().bounces(2);
    settings.trace.clean_edges = true;
    let mut gi = feature(settings);
    let mut rec = LogRecorder::default();
    gi.record_frame(&game(16, 16), &mut rec).unwrap();

    let draws = rec.draws();
    assert_eq!(
        draws[0],
        (ProgramKind::Blit, 1, RenderDest::Target(ids::ALPHA_TEX))
    );
    let gi_draws: Vec<_> = draws
        .iter()
        .filter(|(p, _, _)| *p == ProgramKind::Gi)
        .map(|(_, pass, target)| (*pass, *target))
        .collect();
    assert_eq!(
        gi_draws,
        vec![
            (0, RenderDest::Target(ids::GI_A_TEX)),
            (1, RenderDest::Target(ids::GI_B_TEX)),
            (2, RenderDest::Camera),
        ]
    );
    assert!(rec.acquired().contains(&ids::ALPHA_TEX));
    assert!(rec.live.is_empty());
}

#[test]
fn disabled_tracing_skips_bounces() {
    let mut settings = GiSettings::new().bounces(3);
    settings.trace.enabled = false;
    let mut gi = feature(settings);
    let mut rec = LogRecorder::default();
    gi.record_frame(&game(16, 16), &mut rec).unwrap();

    assert_eq!(rec.gi_keywords().len(), 1);
    assert!(!rec.acquired().contains(&ids::ALPHA_TEX));
}

#[test]
fn blur_runs_after_gi_into_the_camera() {
    let mut settings = GiSettings::new().bounces(0).blur(BlurMode::Horizontal);
    settings.blur.passes = 3;
    let mut gi = feature(settings);
    let mut rec = LogRecorder::default();
    gi.record_frame(&game(16, 16), &mut rec).unwrap();

    let draws = rec.draws();
    let tail = &draws[draws.len() - 4..];
    assert_eq!(
        tail,
        &[
            (ProgramKind::Gi, 0, RenderDest::Target(ids::GI_RESULT_TEX)),
            (ProgramKind::Blur, 0, RenderDest::Target(ids::BLUR_A_TEX)),
            (ProgramKind::Blur, 0, RenderDest::Target(ids::BLUR_B_TEX)),
            (ProgramKind::Blur, 0, RenderDest::Camera),
        ]
    );
    assert!(rec.live.is_empty());
}

#[test]
fn debug_output_replaces_the_final_image() {
    let mut gi = feature(GiSettings::new().debug_output(DebugOutput::Distance));
    let mut rec = LogRecorder::default();
    gi.record_frame(&game(32, 32), &mut rec).unwrap();

    let draws = rec.draws();
    assert_eq!(draws.last(), Some(&(ProgramKind::Blit, 0, RenderDest::Camera)));
    let composite = rec.calls.iter().rposition(|c| matches!(c, Call::Draw { .. })).unwrap();
    assert_eq!(rec.calls[composite - 1], Call::Global(ids::MAIN_TEX, ids::DIST_TEX));
    assert!(
        draws
            .iter()
            .filter(|(p, _, _)| *p == ProgramKind::Gi)
            .all(|(_, _, target)| *target != RenderDest::Camera)
    );
}

/// The blit that ends the frame and the buffer it reads.
fn composite(rec: &LogRecorder) -> (Call, Call) {
    let last = rec.calls.iter().rposition(|c| matches!(c, Call::Draw { .. })).unwrap();
    (rec.calls[last - 1].clone(), rec.calls[last].clone())
}

fn blit_to_camera() -> Call {
    Call::Draw {
        program: ProgramKind::Blit,
        pass: 0,
        target: RenderDest::Camera,
        keywords: Keywords::empty(),
    }
}

#[test]
fn debug_objects_shows_the_scene_capture() {
    let mut gi = feature(GiSettings::new().debug_output(DebugOutput::Objects));
    let mut rec = LogRecorder::default();
    gi.record_frame(&game(32, 32), &mut rec).unwrap();

    assert_eq!(
        composite(&rec),
        (Call::Global(ids::MAIN_TEX, ids::OBJECTS_TEX), blit_to_camera())
    );
    assert!(rec.live.is_empty());
}

#[test]
fn debug_flood_shows_the_last_flood_target() {
    let mut gi = feature(GiSettings::new().debug_output(DebugOutput::Flood));

    // 8x8 floods three times and ends in B, 16x16 four times and ends in A
    for (size, last) in [(8, ids::JFA_B_TEX), (16, ids::JFA_A_TEX)] {
        let mut rec = LogRecorder::default();
        gi.record_frame(&game(size, size), &mut rec).unwrap();

        let last_flood = rec
            .draws()
            .into_iter()
            .filter(|(p, _, _)| *p == ProgramKind::JumpFlood)
            .last()
            .map(|(_, _, target)| target);
        assert_eq!(last_flood, Some(RenderDest::Target(last)), "{size}x{size}");
        assert_eq!(
            composite(&rec),
            (Call::Global(ids::MAIN_TEX, last), blit_to_camera()),
            "{size}x{size}"
        );
    }
}

#[test]
fn scene_capture_covers_the_border() {
    let mut gi = feature(GiSettings::new().border(1.0));
    let mut rec = LogRecorder::default();
    gi.record_frame(&game(50, 50), &mut rec).unwrap();
    assert_eq!(rec.capture_scales, vec![1.2]);

    let mut plain = feature(GiSettings::new());
    let mut rec = LogRecorder::default();
    plain.record_frame(&game(50, 50), &mut rec).unwrap();
    assert_eq!(rec.capture_scales, vec![1.0]);
}

#[test]
fn output_name_of_a_pipeline_buffer_is_rejected() {
    let result = GiLightFeature::<UVec2>::create(
        GiSettings::new().output_texture("_DistTex"),
        NoiseProvider::with_seed(1).shared(),
    );
    assert!(matches!(result, Err(GiError::InvalidSettings(_))));

    let mut gi = feature(GiSettings::new());
    assert!(gi.configure(|s| s.output.global_texture = "_GiObjectsTex".into()).is_ok());
    assert!(
        gi.configure(|s| s.output.destination = FinalBlit::Texture)
            .is_err()
    );
    assert_eq!(gi.settings().output.destination, FinalBlit::Camera);
}

#[test]
fn border_crops_into_the_camera() {
    let mut gi = feature(GiSettings::new().bounces(0).border(2.0));
    let mut rec = LogRecorder::default();
    let camera = CameraContext::new(CameraKind::Game, 40, 40, 2.0);
    gi.record_frame(&camera, &mut rec).unwrap();

    let plan = gi.last_plan().unwrap();
    assert_eq!(plan.descriptor.size(), UVec2::new(80, 80));
    assert!(plan.crops());
    assert_eq!(
        rec.draws().last(),
        Some(&(ProgramKind::Blit, 0, RenderDest::Camera))
    );
    assert_eq!(
        gi.materials().material(ProgramKind::Blit).float(ids::UV_SCALE),
        Some(0.5)
    );
}

#[test]
fn texture_output_is_acquired_and_published() {
    let mut gi = feature(GiSettings::new().bounces(0).output_texture("_GiLight"));
    let mut rec = LogRecorder::default();
    gi.record_frame(&game(16, 16), &mut rec).unwrap();

    let output = BindSlot::named("_GiLight");
    assert!(rec.acquired().contains(&output));
    assert!(
        rec.draws()
            .contains(&(ProgramKind::Gi, 0, RenderDest::Target(output)))
    );
    let publish = rec
        .calls
        .iter()
        .position(|c| *c == Call::Global(output, output))
        .unwrap();
    let release = rec
        .calls
        .iter()
        .position(|c| *c == Call::Release(output))
        .unwrap();
    assert!(publish < release);
    assert!(!rec.draws().iter().any(|(_, _, t)| *t == RenderDest::Camera));
}

#[test]
fn targets_balance_across_frames() {
    let mut gi = feature(
        GiSettings::new()
            .bounces(2)
            .blur(BlurMode::Box)
            .border(1.0)
            .noise_mode(NoiseMode::Static),
    );
    let mut rec = LogRecorder::default();
    for size in [64, 64, 48] {
        gi.record_frame(&game(size, size), &mut rec).unwrap();
        assert!(rec.live.is_empty());
    }
    assert_eq!(
        rec.count(|c| matches!(c, Call::Acquire(_))),
        rec.count(|c| matches!(c, Call::Release(_)))
    );
}

#[test]
fn failed_draw_still_releases_every_target() {
    let mut gi = feature(GiSettings::new().blur(BlurMode::Cross));
    let mut rec = LogRecorder {
        fail_program: Some(ProgramKind::Distance),
        ..Default::default()
    };
    let result = gi.record_frame(&game(32, 32), &mut rec);

    assert!(matches!(result, Err(GiError::UnboundTexture(_))));
    assert!(!rec.acquired().is_empty());
    assert!(rec.live.is_empty());
    assert!(rec.gi_keywords().is_empty());
}

#[test]
fn invalid_camera_fails_before_anything_is_recorded() {
    let mut gi = feature(GiSettings::new().border(1.0).noise_mode(NoiseMode::Dynamic));
    let mut rec = LogRecorder::default();
    let camera = CameraContext::new(CameraKind::Game, 32, 32, 0.0);

    let result = gi.record_frame(&camera, &mut rec);
    assert!(matches!(result, Err(GiError::InvalidCamera { .. })));
    assert!(rec.calls.is_empty());
}

#[test]
fn unknown_raw_modes_are_rejected() {
    let mut gi = feature(GiSettings::new());
    assert!(matches!(
        gi.set_noise_mode_raw(9),
        Err(GiError::UnknownNoiseMode(9))
    ));
    assert!(matches!(
        gi.set_blur_mode_raw(-1),
        Err(GiError::UnknownBlurMode(-1))
    ));
    assert_eq!(gi.settings().noise.mode, NoiseMode::Shader);
}

#[test]
fn cameras_are_gated_by_kind() {
    let gi = feature(GiSettings::new());
    let camera = |kind| CameraContext::new(kind, 32, 32, 5.0);
    assert!(gi.should_run(&camera(CameraKind::Game)));
    assert!(!gi.should_run(&camera(CameraKind::SceneView)));
    assert!(!gi.should_run(&camera(CameraKind::Preview)));
    assert!(!gi.should_run(&camera(CameraKind::Reflection)));
    assert!(!gi.should_run(&CameraContext::new(CameraKind::Game, 0, 32, 5.0)));

    let mut settings = GiSettings::new();
    settings.run_in_scene_view = true;
    let gi = feature(settings);
    assert!(gi.should_run(&camera(CameraKind::SceneView)));
}

#[test]
fn noise_texture_is_created_once_and_bound() {
    let mut gi = feature(GiSettings::new().noise_mode(NoiseMode::Dynamic));
    let mut rec = LogRecorder::default();
    gi.record_frame(&game(32, 32), &mut rec).unwrap();
    gi.record_frame(&game(32, 32), &mut rec).unwrap();

    assert_eq!(rec.count(|c| matches!(c, Call::CreateNoise(_))), 1);
    assert_eq!(rec.count(|c| *c == Call::External(ids::NOISE_TEX)), 2);
    assert!(
        rec.gi_keywords()
            .iter()
            .all(|k| k.contains(Keywords::TEXTURE_RANDOM))
    );
}

#[test]
fn noise_failure_falls_back_to_shader_noise() {
    let mut gi = feature(GiSettings::new().noise_mode(NoiseMode::Static));
    let mut rec = LogRecorder {
        fail_noise: true,
        ..Default::default()
    };
    gi.record_frame(&game(32, 32), &mut rec).unwrap();
    gi.record_frame(&game(32, 32), &mut rec).unwrap();

    // Not retried at the same size
    assert_eq!(rec.count(|c| matches!(c, Call::CreateNoise(_))), 1);
    assert_eq!(rec.count(|c| matches!(c, Call::External(_))), 0);
    for keywords in rec.gi_keywords() {
        assert!(keywords.contains(Keywords::FRAGMENT_RANDOM));
        assert!(!keywords.contains(Keywords::TEXTURE_RANDOM));
    }
    assert!(
        gi.materials()
            .material(ProgramKind::Gi)
            .is_enabled(Keywords::TEXTURE_RANDOM)
    );
}

#[test]
fn shader_noise_never_touches_the_provider() {
    let mut gi = feature(GiSettings::new().noise_mode(NoiseMode::Shader));
    let mut rec = LogRecorder::default();
    gi.record_frame(&game(32, 32), &mut rec).unwrap();

    assert_eq!(rec.count(|c| matches!(c, Call::CreateNoise(_))), 0);
    assert_eq!(gi.noise().borrow().allocations(), 0);
}

#[test]
fn unknown_modes_in_settings_documents_are_rejected() {
    assert!(matches!(
        GiSettings::from_json(r#"{ "noise": { "mode": "sparkly" } }"#),
        Err(GiError::Settings(_))
    ));
}
