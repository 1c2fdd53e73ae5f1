//! DSP Effects Library
//!
//! Building blocks, the six chainable effects and the two standalone engines.
//! All chainable effects implement the `Effect` trait for uniform processing.

pub mod audio_buffer;
pub mod chain;
pub mod delay;
pub mod delay_line;
pub mod distortion;
pub mod effect;
pub mod filter;
pub mod granular;
pub mod interpolation;
pub mod params;
pub mod pitch;
pub mod registry;
pub mod reverb;
pub mod saturation;
pub mod smoothing;
pub mod time_stretch;
pub mod waveshaper;

pub use audio_buffer::{AudioBlock, AudioBuffer, ProcessSpec, MAX_CHANNELS};
pub use chain::EffectChain;
pub use delay::{DelayEffect, DelayType};
pub use delay_line::DelayLine;
pub use distortion::DistortionEffect;
pub use effect::{Effect, EffectParams};
pub use filter::{FilterEffect, FilterType, StateVariableFilter};
pub use granular::{Grain, GranularEngine};
pub use params::ParameterDescriptor;
pub use pitch::PitchShiftEffect;
pub use registry::{AnyEffect, EffectType};
pub use reverb::{Freeverb, FreeverbSettings, ReverbEffect};
pub use saturation::SaturationEffect;
pub use smoothing::SmoothedValue;
pub use time_stretch::TimeStretchEngine;
pub use waveshaper::{ShaperCurve, Waveshaper};
