//! Sampler FX - Real-time Audio Effects Core
//!
//! The effects layer of a sampler-style instrument: six chainable effects
//! (reverb, delay, filter, distortion, saturation, pitch-shift) and two
//! standalone engines (tape time-stretch and granular).
//!
//! # Architecture
//!
//! - `dsp`: audio-thread code. Prepared once per spec, then processes blocks
//!   in place without allocating, locking or failing.
//! - `bridge` / `processor`: the boundary between a control thread writing
//!   parameters and the audio thread reading them once per block.
//! - `state`, `midi`, `presets`: control-side state, saved as element trees.
//! - `io`, `cli`: offline host glue around the core.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod error;
pub mod io;
pub mod midi;
pub mod presets;
pub mod processor;
pub mod state;

pub use bridge::{AtomicParam, ParameterAddress, ParameterBridge, ParameterTarget, SpecMailbox};
pub use config::EngineConfig;
pub use dsp::{AnyEffect, AudioBlock, AudioBuffer, Effect, EffectChain, EffectType, ProcessSpec};
pub use error::{FxError, Result};
pub use midi::MidiMapper;
pub use presets::PresetBank;
pub use processor::{ControlHandle, FxProcessor, ProcessorCore};
pub use state::StateElement;
