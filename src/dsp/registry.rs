//! Effect registry
//!
//! The set of effects is closed: `EffectType` names every variant and
//! `AnyEffect` holds one of them, dispatching the `Effect` trait with a match
//! instead of a vtable. Tags are the strings written to saved state.

use super::audio_buffer::{AudioBlock, ProcessSpec};
use super::delay::DelayEffect;
use super::distortion::DistortionEffect;
use super::effect::Effect;
use super::filter::FilterEffect;
use super::params::ParameterDescriptor;
use super::pitch::PitchShiftEffect;
use super::reverb::ReverbEffect;
use super::saturation::SaturationEffect;
use crate::config::EngineConfig;
use crate::error::FxError;
use crate::state::StateElement;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Effect variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectType {
    Reverb,
    Delay,
    Filter,
    Distortion,
    Saturation,
    PitchShift,
}

impl EffectType {
    /// Every variant, in browser order
    pub const ALL: [EffectType; 6] = [
        EffectType::Reverb,
        EffectType::Delay,
        EffectType::Filter,
        EffectType::Distortion,
        EffectType::Saturation,
        EffectType::PitchShift,
    ];

    /// Tag written to saved state
    pub fn tag(&self) -> &'static str {
        match self {
            EffectType::Reverb => "Reverb",
            EffectType::Delay => "Delay",
            EffectType::Filter => "Filter",
            EffectType::Distortion => "Distortion",
            EffectType::Saturation => "Saturation",
            EffectType::PitchShift => "PitchShift",
        }
    }

    /// Parse a saved-state tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Get display name for the effect
    pub fn display_name(&self) -> &'static str {
        match self {
            EffectType::PitchShift => "Pitch",
            other => other.tag(),
        }
    }

    /// Browser category
    pub fn category(&self) -> &'static str {
        match self {
            EffectType::Reverb => "Reverb",
            EffectType::Delay => "Time",
            EffectType::Filter => "Filter",
            EffectType::Distortion | EffectType::Saturation => "Distortion",
            EffectType::PitchShift => "Pitch",
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EffectType {
    type Err = FxError;

    /// Parse a tag or display name, ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.tag().eq_ignore_ascii_case(s) || t.display_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| FxError::UnknownEffectType { tag: s.to_string() })
    }
}

/// One effect of any registered type
#[derive(Debug, Clone)]
pub enum AnyEffect {
    Reverb(ReverbEffect),
    Delay(DelayEffect),
    Filter(FilterEffect),
    Distortion(DistortionEffect),
    Saturation(SaturationEffect),
    PitchShift(PitchShiftEffect),
}

impl AnyEffect {
    /// Construct an effect with default parameters
    pub fn new(effect_type: EffectType) -> Self {
        Self::with_config(effect_type, &EngineConfig::default())
    }

    /// Construct an effect sized from an engine configuration
    pub fn with_config(effect_type: EffectType, config: &EngineConfig) -> Self {
        match effect_type {
            EffectType::Reverb => AnyEffect::Reverb(ReverbEffect::new()),
            EffectType::Delay => {
                AnyEffect::Delay(DelayEffect::with_max_delay(config.max_delay_seconds))
            }
            EffectType::Filter => AnyEffect::Filter(FilterEffect::new()),
            EffectType::Distortion => AnyEffect::Distortion(DistortionEffect::new()),
            EffectType::Saturation => AnyEffect::Saturation(SaturationEffect::new()),
            EffectType::PitchShift => AnyEffect::PitchShift(PitchShiftEffect::new()),
        }
    }

    /// Construct from a saved `Effect` element; `None` for unknown or missing types
    pub fn from_state(element: &StateElement, config: &EngineConfig) -> Option<Self> {
        let effect_type = EffectType::from_tag(element.get_str("Type")?)?;
        let mut effect = Self::with_config(effect_type, config);
        effect.load_state(element);
        Some(effect)
    }

    fn inner(&self) -> &dyn Effect {
        match self {
            AnyEffect::Reverb(e) => e,
            AnyEffect::Delay(e) => e,
            AnyEffect::Filter(e) => e,
            AnyEffect::Distortion(e) => e,
            AnyEffect::Saturation(e) => e,
            AnyEffect::PitchShift(e) => e,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Effect {
        match self {
            AnyEffect::Reverb(e) => e,
            AnyEffect::Delay(e) => e,
            AnyEffect::Filter(e) => e,
            AnyEffect::Distortion(e) => e,
            AnyEffect::Saturation(e) => e,
            AnyEffect::PitchShift(e) => e,
        }
    }
}

impl Effect for AnyEffect {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.inner_mut().prepare(spec)
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        self.inner_mut().process(block)
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }

    fn effect_type(&self) -> EffectType {
        self.inner().effect_type()
    }

    fn parameter_descriptors(&self) -> &'static [ParameterDescriptor] {
        self.inner().parameter_descriptors()
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        self.inner_mut().set_parameter(index, value)
    }

    fn get_parameter(&self, index: usize) -> f32 {
        self.inner().get_parameter(index)
    }

    fn id(&self) -> &str {
        self.inner().id()
    }

    fn set_id(&mut self, id: String) {
        self.inner_mut().set_id(id)
    }

    fn is_enabled(&self) -> bool {
        self.inner().is_enabled()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.inner_mut().set_enabled(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::audio_buffer::AudioBuffer;
    use test_case::test_case;

    #[test]
    fn test_tags_round_trip() {
        for t in EffectType::ALL {
            assert_eq!(EffectType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(EffectType::from_tag("Chorus"), None);
        assert_eq!(EffectType::PitchShift.to_string(), "PitchShift");
    }

    #[test_case("reverb", EffectType::Reverb ; "lowercase tag")]
    #[test_case("Pitch", EffectType::PitchShift ; "display name")]
    #[test_case("PITCHSHIFT", EffectType::PitchShift ; "uppercase tag")]
    #[test_case("Saturation", EffectType::Saturation ; "exact tag")]
    fn test_parse_names(input: &str, expected: EffectType) {
        assert_eq!(input.parse::<EffectType>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_name() {
        let err = "wah".parse::<EffectType>().unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_EFFECT_TYPE");
    }

    #[test_case(EffectType::Reverb, "Reverb" ; "reverb")]
    #[test_case(EffectType::Delay, "Time" ; "delay")]
    #[test_case(EffectType::Filter, "Filter" ; "filter")]
    #[test_case(EffectType::Distortion, "Distortion" ; "distortion")]
    #[test_case(EffectType::Saturation, "Distortion" ; "saturation")]
    #[test_case(EffectType::PitchShift, "Pitch" ; "pitch")]
    fn test_categories(effect_type: EffectType, category: &str) {
        assert_eq!(AnyEffect::new(effect_type).category(), category);
    }

    #[test]
    fn test_any_effect_reports_its_type() {
        for t in EffectType::ALL {
            let effect = AnyEffect::new(t);
            assert_eq!(effect.effect_type(), t);
            assert!(effect.num_parameters() > 0);
            assert_eq!(effect.parameter_ranges().len(), effect.num_parameters() * 3);
        }
    }

    #[test]
    fn test_set_get_identity_every_type() {
        for t in EffectType::ALL {
            let mut effect = AnyEffect::new(t);
            for (i, d) in effect.parameter_descriptors().iter().enumerate() {
                let mid = (d.min + d.max) * 0.5;
                effect.set_parameter(i, mid);
                assert_eq!(effect.get_parameter(i), mid, "{t} parameter {i}");
            }
            // Unknown indices are ignored
            effect.set_parameter(99, 1.0);
            assert_eq!(effect.get_parameter(99), 0.0);
        }
    }

    #[test]
    fn test_state_round_trip_every_type() {
        for t in EffectType::ALL {
            let mut effect = AnyEffect::new(t);
            for (i, d) in effect.parameter_descriptors().iter().enumerate() {
                effect.set_parameter(i, d.min + (d.max - d.min) * 0.25);
            }
            effect.set_enabled(false);

            let mut el = StateElement::new("Effect");
            el.set_str("Type", t.tag());
            effect.save_state(&mut el);

            let restored = AnyEffect::from_state(&el, &EngineConfig::default());
            let Some(restored) = restored else {
                panic!("{t} failed to restore");
            };
            assert!(!restored.is_enabled());
            for i in 0..effect.num_parameters() {
                assert_eq!(restored.get_parameter(i), effect.get_parameter(i));
            }
        }
    }

    #[test]
    fn test_from_state_rejects_unknown_type() {
        let mut el = StateElement::new("Effect");
        assert!(AnyEffect::from_state(&el, &EngineConfig::default()).is_none());
        el.set_str("Type", "Flanger");
        assert!(AnyEffect::from_state(&el, &EngineConfig::default()).is_none());
    }

    #[test]
    fn test_disabled_identity_every_type() {
        let spec = ProcessSpec::new(44100.0, 256, 2);
        for t in EffectType::ALL {
            let mut effect = AnyEffect::new(t);
            effect.prepare(&spec);
            effect.set_enabled(false);
            let original = AudioBuffer::sine(330.0, 0.7, 2, 256, 44100.0);
            let mut buffer = original.clone();
            effect.process(&mut buffer.as_block());
            assert_eq!(buffer, original, "{t} altered audio while disabled");
        }
    }
}
