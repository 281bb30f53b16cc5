//! Program instances, capability keywords and their state transitions.
//!
//! Each of the five GPU programs is driven through a [`Material`]: the program kind, the
//! set of capability [`Keywords`] (shader variant switches) and the named constants and
//! texture inputs of the next draw.
//!
//! [`MaterialStateManager`] owns the five materials and is the only place keywords change.
//! Mode categories (noise, blur) map each mode to at most one keyword, and switching modes
//! always clears the old keyword before setting the new one, so two mutually exclusive
//! variants are never active together.

use std::collections::HashMap;

use bitflags::bitflags;
use glam::Vec4;

use crate::error::Result;
use crate::settings::{BlurMode, GiSettings, NoiseMode};
use crate::targets::{BindSlot, ids};

bitflags! {
    /// Capability flags selecting program variants.
    ///
    /// Flag names are the names the GPU programs declare, e.g. `TEXTURE_RANDOM`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Keywords: u16 {
        // gi: noise source
        const TEXTURE_RANDOM   = 1 << 0;
        const FRAGMENT_RANDOM  = 1 << 1;
        // gi: optional terms
        const FALLOFF_IMPACT   = 1 << 2;
        const INTENSITY_IMPACT = 1 << 3;
        // distance
        const ENABLE_OFFSET    = 1 << 4;
        // blur: direction
        const HORIZONTAL       = 1 << 5;
        const VERTICAL         = 1 << 6;
        const CROSS            = 1 << 7;
        const BOX              = 1 << 8;
    }
}

impl Keywords {
    /// Flags of the noise category; at most one may be active.
    pub const NOISE: Keywords = Keywords::TEXTURE_RANDOM.union(Keywords::FRAGMENT_RANDOM);
    /// Flags of the blur category; at most one may be active.
    pub const BLUR: Keywords = Keywords::HORIZONTAL
        .union(Keywords::VERTICAL)
        .union(Keywords::CROSS)
        .union(Keywords::BOX);

    /// The flag selected by a noise mode; empty for [`NoiseMode::None`].
    pub fn for_noise(mode: NoiseMode) -> Keywords {
        match mode {
            NoiseMode::Dynamic | NoiseMode::Static => Keywords::TEXTURE_RANDOM,
            NoiseMode::Shader => Keywords::FRAGMENT_RANDOM,
            NoiseMode::None => Keywords::empty(),
        }
    }

    pub fn for_blur(mode: BlurMode) -> Keywords {
        match mode {
            BlurMode::Horizontal => Keywords::HORIZONTAL,
            BlurMode::Vertical => Keywords::VERTICAL,
            BlurMode::Cross => Keywords::CROSS,
            BlurMode::Box => Keywords::BOX,
        }
    }
}

/// The five GPU programs of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProgramKind {
    /// Pass 0 copies `_MainTex`, pass 1 extracts its alpha mask.
    Blit,
    /// Pass 0 writes seed coordinates, pass 1 runs one flood step.
    JumpFlood,
    /// Pass 0 gathers light, pass 1 bounces it, pass 2 bounces and cleans edges.
    Gi,
    /// Pass 0 blurs `_MainTex` along the selected direction.
    Blur,
    /// Pass 0 turns the seed field into distances.
    Distance,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 5] = [
        ProgramKind::Blit,
        ProgramKind::JumpFlood,
        ProgramKind::Gi,
        ProgramKind::Blur,
        ProgramKind::Distance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProgramKind::Blit => "blit",
            ProgramKind::JumpFlood => "jump_flood",
            ProgramKind::Gi => "gi",
            ProgramKind::Blur => "blur",
            ProgramKind::Distance => "distance",
        }
    }

    /// Keywords the program declares.
    pub fn supported_keywords(self) -> Keywords {
        match self {
            ProgramKind::Gi => {
                Keywords::NOISE | Keywords::FALLOFF_IMPACT | Keywords::INTENSITY_IMPACT
            }
            ProgramKind::Blur => Keywords::BLUR,
            ProgramKind::Distance => Keywords::ENABLE_OFFSET,
            ProgramKind::Blit | ProgramKind::JumpFlood => Keywords::empty(),
        }
    }

    pub fn pass_count(self) -> u32 {
        match self {
            ProgramKind::Gi => 3,
            ProgramKind::Blit | ProgramKind::JumpFlood => 2,
            ProgramKind::Blur | ProgramKind::Distance => 1,
        }
    }
}

/// A named program input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Property {
    Float(f32),
    Vector(Vec4),
    Texture(BindSlot),
}

/// One program instance with its keywords and inputs.
#[derive(Debug, Clone)]
pub struct Material {
    program: ProgramKind,
    keywords: Keywords,
    properties: HashMap<BindSlot, Property>,
    #[cfg(test)]
    pub(crate) toggles: Vec<(Keywords, bool)>,
}

impl Material {
    /// A material for `program` with no keywords and no properties.
    pub fn new(program: ProgramKind) -> Self {
        Self {
            program,
            keywords: Keywords::empty(),
            properties: HashMap::new(),
            #[cfg(test)]
            toggles: Vec::new(),
        }
    }

    pub fn program(&self) -> ProgramKind {
        self.program
    }

    pub fn keywords(&self) -> Keywords {
        self.keywords
    }

    pub fn is_enabled(&self, keyword: Keywords) -> bool {
        self.keywords.contains(keyword)
    }

    /// Enables `keyword`. Keywords the program does not declare are ignored.
    pub fn enable_keyword(&mut self, keyword: Keywords) {
        let supported = keyword & self.program.supported_keywords();
        if supported != keyword {
            log::warn!(
                "{} program has no keyword {:?}",
                self.program.name(),
                keyword - supported
            );
        }
        #[cfg(test)]
        self.toggles.push((supported, true));
        self.keywords.insert(supported);
    }

    /// Disables `keyword`. Disabling an unset keyword is a no-op.
    pub fn disable_keyword(&mut self, keyword: Keywords) {
        #[cfg(test)]
        self.toggles.push((keyword, false));
        self.keywords.remove(keyword);
    }

    pub fn set_keyword(&mut self, keyword: Keywords, enabled: bool) {
        if enabled {
            self.enable_keyword(keyword);
        } else {
            self.disable_keyword(keyword);
        }
    }

    pub fn set_float(&mut self, id: BindSlot, value: f32) {
        self.properties.insert(id, Property::Float(value));
    }

    pub fn set_vector(&mut self, id: BindSlot, value: Vec4) {
        self.properties.insert(id, Property::Vector(value));
    }

    /// Binds the texture behind `source` to the property `id`. The recorder resolves
    /// `source` at draw time, so it may be acquired after this call.
    pub fn set_texture(&mut self, id: BindSlot, source: BindSlot) {
        self.properties.insert(id, Property::Texture(source));
    }

    pub fn clear_property(&mut self, id: BindSlot) {
        self.properties.remove(&id);
    }

    /// The property stored under `id`, whatever its kind.
    pub fn property(&self, id: BindSlot) -> Option<Property> {
        self.properties.get(&id).copied()
    }

    pub fn float(&self, id: BindSlot) -> Option<f32> {
        match self.properties.get(&id) {
            Some(Property::Float(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn vector(&self, id: BindSlot) -> Option<Vec4> {
        match self.properties.get(&id) {
            Some(Property::Vector(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn texture(&self, id: BindSlot) -> Option<BindSlot> {
        match self.properties.get(&id) {
            Some(Property::Texture(slot)) => Some(*slot),
            _ => None,
        }
    }
}

/// Owns the five program instances and applies settings to their keywords.
///
/// Materials are built once; afterwards only explicit transitions change keywords.
#[derive(Debug, Clone)]
pub struct MaterialStateManager {
    blit: Material,
    jump_flood: Material,
    gi: Material,
    blur: Material,
    distance: Material,
    noise_mode: NoiseMode,
    blur_mode: BlurMode,
}

impl MaterialStateManager {
    pub fn new(settings: &GiSettings) -> Self {
        let mut manager = Self {
            blit: Material::new(ProgramKind::Blit),
            jump_flood: Material::new(ProgramKind::JumpFlood),
            gi: Material::new(ProgramKind::Gi),
            blur: Material::new(ProgramKind::Blur),
            distance: Material::new(ProgramKind::Distance),
            noise_mode: settings.noise.mode,
            blur_mode: settings.blur.mode,
        };
        manager.blur.enable_keyword(Keywords::for_blur(settings.blur.mode));
        manager.gi.enable_keyword(Keywords::for_noise(settings.noise.mode));
        manager.apply_toggles(settings);
        manager
    }

    /// Re-applies the enabled-state flags (falloff, intensity, distance offset).
    ///
    /// These are fixed after construction; call this after changing them in settings.
    pub fn reinitialize(&mut self, settings: &GiSettings) {
        self.apply_toggles(settings);
    }

    fn apply_toggles(&mut self, settings: &GiSettings) {
        self.distance
            .set_keyword(Keywords::ENABLE_OFFSET, settings.distance_offset.enabled);
        if settings.distance_offset.enabled {
            self.distance
                .set_float(ids::OFFSET, settings.distance_offset.value);
        } else {
            self.distance.clear_property(ids::OFFSET);
        }
        self.gi
            .set_keyword(Keywords::FALLOFF_IMPACT, settings.falloff.enabled);
        self.gi
            .set_keyword(Keywords::INTENSITY_IMPACT, settings.intensity.enabled);
    }

    pub fn noise_mode(&self) -> NoiseMode {
        self.noise_mode
    }

    pub fn blur_mode(&self) -> BlurMode {
        self.blur_mode
    }

    /// Switches the GI noise variant. Returns whether anything changed.
    pub fn set_noise_mode(&mut self, mode: NoiseMode) -> bool {
        if mode == self.noise_mode {
            return false;
        }
        self.gi.disable_keyword(Keywords::for_noise(self.noise_mode));
        self.noise_mode = mode;
        self.gi.enable_keyword(Keywords::for_noise(mode));
        true
    }

    /// Switches the blur direction variant. Returns whether anything changed.
    pub fn set_blur_mode(&mut self, mode: BlurMode) -> bool {
        if mode == self.blur_mode {
            return false;
        }
        self.blur.disable_keyword(Keywords::for_blur(self.blur_mode));
        self.blur_mode = mode;
        self.blur.enable_keyword(Keywords::for_blur(mode));
        true
    }

    /// [`set_noise_mode`](Self::set_noise_mode) from a raw mode value.
    pub fn set_noise_mode_raw(&mut self, raw: i32) -> Result<bool> {
        Ok(self.set_noise_mode(NoiseMode::try_from(raw)?))
    }

    /// [`set_blur_mode`](Self::set_blur_mode) from a raw mode value.
    pub fn set_blur_mode_raw(&mut self, raw: i32) -> Result<bool> {
        Ok(self.set_blur_mode(BlurMode::try_from(raw)?))
    }

    pub fn material(&self, program: ProgramKind) -> &Material {
        match program {
            ProgramKind::Blit => &self.blit,
            ProgramKind::JumpFlood => &self.jump_flood,
            ProgramKind::Gi => &self.gi,
            ProgramKind::Blur => &self.blur,
            ProgramKind::Distance => &self.distance,
        }
    }

    pub fn material_mut(&mut self, program: ProgramKind) -> &mut Material {
        match program {
            ProgramKind::Blit => &mut self.blit,
            ProgramKind::JumpFlood => &mut self.jump_flood,
            ProgramKind::Gi => &mut self.gi,
            ProgramKind::Blur => &mut self.blur,
            ProgramKind::Distance => &mut self.distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GiError;

    fn exclusive(material: &Material, group: Keywords) -> bool {
        (material.keywords() & group).bits().count_ones() <= 1
    }

    #[test]
    fn init_maps_settings_to_keywords() {
        let mut settings = GiSettings::new().blur(BlurMode::Horizontal);
        settings.falloff.enabled = true;
        settings.distance_offset.enabled = true;
        settings.distance_offset.value = 0.05;

        let m = MaterialStateManager::new(&settings);
        let gi = m.material(ProgramKind::Gi);
        assert!(gi.is_enabled(Keywords::FRAGMENT_RANDOM));
        assert!(gi.is_enabled(Keywords::FALLOFF_IMPACT));
        assert!(!gi.is_enabled(Keywords::INTENSITY_IMPACT));
        assert!(m.material(ProgramKind::Blur).is_enabled(Keywords::HORIZONTAL));
        let dist = m.material(ProgramKind::Distance);
        assert!(dist.is_enabled(Keywords::ENABLE_OFFSET));
        assert_eq!(dist.float(ids::OFFSET), Some(0.05));
        assert!(m.material(ProgramKind::Blit).keywords().is_empty());
    }

    #[test]
    fn noise_transition_clears_old_before_setting_new() {
        let mut m = MaterialStateManager::new(&GiSettings::new().noise_mode(NoiseMode::Shader));
        m.gi.toggles.clear();

        assert!(m.set_noise_mode(NoiseMode::Dynamic));
        assert_eq!(
            m.gi.toggles,
            vec![
                (Keywords::FRAGMENT_RANDOM, false),
                (Keywords::TEXTURE_RANDOM, true),
            ]
        );
        assert!(m.gi.is_enabled(Keywords::TEXTURE_RANDOM));
        assert!(!m.gi.is_enabled(Keywords::FRAGMENT_RANDOM));
    }

    #[test]
    fn noise_flags_stay_exclusive_through_every_transition() {
        let modes = [
            NoiseMode::Dynamic,
            NoiseMode::Static,
            NoiseMode::Shader,
            NoiseMode::None,
        ];
        for from in modes {
            for to in modes {
                let mut m = MaterialStateManager::new(&GiSettings::new().noise_mode(from));
                m.set_noise_mode(to);
                let gi = m.material(ProgramKind::Gi);
                assert!(exclusive(gi, Keywords::NOISE), "{from:?} -> {to:?}");
                assert_eq!(gi.keywords() & Keywords::NOISE, Keywords::for_noise(to));
            }
        }
    }

    #[test]
    fn same_mode_is_not_a_transition() {
        let mut m = MaterialStateManager::new(&GiSettings::new());
        m.gi.toggles.clear();
        assert!(!m.set_noise_mode(NoiseMode::Shader));
        assert!(m.gi.toggles.is_empty());
    }

    #[test]
    fn blur_transition_keeps_one_direction() {
        let mut m = MaterialStateManager::new(&GiSettings::new().blur(BlurMode::Cross));
        assert!(m.set_blur_mode(BlurMode::Box));
        let blur = m.material(ProgramKind::Blur);
        assert_eq!(blur.keywords(), Keywords::BOX);
        assert_eq!(m.blur_mode(), BlurMode::Box);
    }

    #[test]
    fn raw_modes_are_checked_before_any_flag_changes() {
        let mut m = MaterialStateManager::new(&GiSettings::new());
        let before = m.material(ProgramKind::Gi).keywords();
        assert!(matches!(
            m.set_noise_mode_raw(9),
            Err(GiError::UnknownNoiseMode(9))
        ));
        assert!(matches!(
            m.set_blur_mode_raw(4),
            Err(GiError::UnknownBlurMode(4))
        ));
        assert_eq!(m.material(ProgramKind::Gi).keywords(), before);
        assert!(m.set_noise_mode_raw(3).unwrap());
        assert_eq!(m.noise_mode(), NoiseMode::None);
    }

    #[test]
    fn unsupported_keywords_are_ignored() {
        let mut blit = Material::new(ProgramKind::Blit);
        blit.enable_keyword(Keywords::CROSS);
        assert!(blit.keywords().is_empty());
    }

    #[test]
    fn reinitialize_applies_toggle_changes() {
        let mut settings = GiSettings::new();
        let mut m = MaterialStateManager::new(&settings);
        settings.intensity.enabled = true;
        m.reinitialize(&settings);
        assert!(m.material(ProgramKind::Gi).is_enabled(Keywords::INTENSITY_IMPACT));
        assert!(m.material(ProgramKind::Gi).is_enabled(Keywords::FRAGMENT_RANDOM));
    }
}
