//! Host-facing processor
//!
//! `FxProcessor` owns an audio core (an effect chain or a standalone engine)
//! together with its parameter bridge. The audio thread calls
//! `process_block`; control threads hold a `ControlHandle`.

use crate::bridge::{
    ParameterAddress, ParameterBridge, ParameterSnapshot, ParameterTarget, SpecMailbox,
};
use crate::dsp::audio_buffer::{AudioBlock, ProcessSpec};
use crate::dsp::chain::EffectChain;
use crate::dsp::granular::GranularEngine;
use crate::dsp::params::ParameterDescriptor;
use crate::dsp::time_stretch::TimeStretchEngine;
use crate::error::{FxError, Result};
use std::sync::Arc;
use tracing::debug;

/// Audio-side object driven by a processor
pub trait ProcessorCore: Send {
    fn prepare(&mut self, spec: &ProcessSpec);
    fn process(&mut self, block: &mut AudioBlock<'_>);
    fn reset(&mut self);

    /// Apply one parameter value taken from the bridge
    fn apply(&mut self, address: ParameterAddress, value: f32);

    /// Host parameter table for this core
    fn build_bridge(&self) -> Result<ParameterBridge>;
}

impl ProcessorCore for EffectChain {
    fn prepare(&mut self, spec: &ProcessSpec) {
        EffectChain::prepare(self, spec)
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        EffectChain::process(self, block)
    }

    fn reset(&mut self) {
        EffectChain::reset(self)
    }

    fn apply(&mut self, address: ParameterAddress, value: f32) {
        if let ParameterAddress::Effect {
            effect_index,
            parameter_index,
        } = address
        {
            self.set_effect_parameter(effect_index, parameter_index, value);
        }
    }

    fn build_bridge(&self) -> Result<ParameterBridge> {
        ParameterBridge::for_chain(self)
    }
}

macro_rules! impl_engine_core {
    ($engine:ty) => {
        impl ProcessorCore for $engine {
            fn prepare(&mut self, spec: &ProcessSpec) {
                <$engine>::prepare(self, spec)
            }

            fn process(&mut self, block: &mut AudioBlock<'_>) {
                <$engine>::process(self, block)
            }

            fn reset(&mut self) {
                <$engine>::reset(self)
            }

            fn apply(&mut self, address: ParameterAddress, value: f32) {
                if let ParameterAddress::Engine { parameter_index } = address {
                    self.set_parameter(parameter_index, value);
                }
            }

            fn build_bridge(&self) -> Result<ParameterBridge> {
                let bridge = ParameterBridge::for_engine(self.parameter_descriptors())?;
                for index in 0..bridge.len() {
                    bridge.set(index, self.get_parameter(index));
                }
                Ok(bridge)
            }
        }
    };
}

impl_engine_core!(TimeStretchEngine);
impl_engine_core!(GranularEngine);

/// Control-thread handle onto a running processor
#[derive(Debug, Clone)]
pub struct ControlHandle {
    bridge: Arc<ParameterBridge>,
    mailbox: Arc<SpecMailbox>,
}

impl ControlHandle {
    pub fn bridge(&self) -> &ParameterBridge {
        &self.bridge
    }

    /// Write a parameter by host name
    pub fn set_parameter(&self, name: &str, value: f32) -> Result<()> {
        self.bridge.set_by_name(name, value)
    }

    /// Read a parameter by host name
    pub fn get_parameter(&self, name: &str) -> Result<f32> {
        self.bridge.get_by_name(name)
    }

    /// Ask the audio thread to re-prepare with a new spec at its next block
    pub fn request_spec(&self, spec: ProcessSpec) {
        self.mailbox.post(spec);
    }
}

impl ParameterTarget for ControlHandle {
    fn set_effect_parameter(&mut self, effect_index: usize, parameter_index: usize, value: f32) {
        let address = ParameterAddress::Effect {
            effect_index,
            parameter_index,
        };
        if let Some(index) = self.bridge.index_of_address(address) {
            self.bridge.set(index, value);
        }
    }

    fn parameter_descriptor(
        &self,
        effect_index: usize,
        parameter_index: usize,
    ) -> Option<ParameterDescriptor> {
        let address = ParameterAddress::Effect {
            effect_index,
            parameter_index,
        };
        let index = self.bridge.index_of_address(address)?;
        self.bridge.descriptor(index).copied()
    }
}

/// Audio core plus its parameter bridge and spec mailbox
#[derive(Debug)]
pub struct FxProcessor<C: ProcessorCore> {
    core: C,
    bridge: Arc<ParameterBridge>,
    mailbox: Arc<SpecMailbox>,
    snapshot: ParameterSnapshot,
    spec: Option<ProcessSpec>,
}

impl<C: ProcessorCore> FxProcessor<C> {
    /// Wrap a core and expose its parameters
    pub fn new(core: C) -> Result<Self> {
        let bridge = Arc::new(core.build_bridge()?);
        let snapshot = ParameterSnapshot::new(&bridge);
        debug!(parameters = bridge.len(), "processor created");
        Ok(Self {
            core,
            bridge,
            mailbox: Arc::new(SpecMailbox::new()),
            snapshot,
            spec: None,
        })
    }

    /// New handle for a control thread
    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            bridge: Arc::clone(&self.bridge),
            mailbox: Arc::clone(&self.mailbox),
        }
    }

    pub fn bridge(&self) -> &ParameterBridge {
        &self.bridge
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    /// Direct access for structural edits; call `rebind` afterwards when the
    /// parameter layout changed
    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }

    /// Last spec the core was prepared with
    pub fn spec(&self) -> Option<ProcessSpec> {
        self.spec
    }

    /// Rebuild the bridge after the core's parameter layout changed
    ///
    /// Handles taken earlier keep pointing at the old table.
    pub fn rebind(&mut self) -> Result<()> {
        let bridge = self.core.build_bridge()?;
        debug!(parameters = bridge.len(), "processor rebound");
        self.snapshot = ParameterSnapshot::new(&bridge);
        self.bridge = Arc::new(bridge);
        Ok(())
    }

    /// Write a parameter by host name from the owning thread
    pub fn set_parameter(&self, name: &str, value: f32) -> Result<()> {
        self.bridge.set_by_name(name, value)
    }

    /// Validate and prepare the core
    pub fn prepare(&mut self, spec: &ProcessSpec) -> Result<()> {
        if !(spec.sample_rate > 0.0) || spec.max_block_size == 0 || spec.num_channels == 0 {
            return Err(FxError::InvalidConfig {
                field: "spec".to_string(),
                value: format!("{spec:?}"),
                expected: "positive sample rate, block size and channel count".to_string(),
            });
        }
        self.core.prepare(spec);
        self.spec = Some(*spec);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.core.reset();
    }

    /// Process one block on the audio thread
    ///
    /// Applies a pending spec change, then parameter values that moved since
    /// the last block, then runs the core.
    pub fn process_block(&mut self, block: &mut AudioBlock<'_>) {
        if let Some(spec) = self.mailbox.try_take() {
            self.core.prepare(&spec);
            self.spec = Some(spec);
        }

        let core = &mut self.core;
        self.snapshot
            .refresh(&self.bridge, |address, value| core.apply(address, value));

        self.core.process(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::dsp::audio_buffer::AudioBuffer;
    use crate::dsp::effect::Effect;
    use crate::dsp::registry::EffectType;
    use crate::dsp::{delay, granular, time_stretch};
    use std::thread;

    fn delay_chain() -> EffectChain {
        let mut chain = EffectChain::new();
        chain.add_effect_type(EffectType::Delay);
        chain
    }

    #[test]
    fn test_bridge_values_reach_the_chain() {
        let mut processor = FxProcessor::new(delay_chain()).unwrap();
        processor.prepare(&ProcessSpec::new(44100.0, 256, 2)).unwrap();

        let handle = processor.handle();
        handle.set_parameter("Delay0.Feedback", 0.8).unwrap();
        // Not applied before the next block
        let feedback = |p: &FxProcessor<EffectChain>| {
            p.core().get_effect(0).map(|e| e.get_parameter(delay::param::FEEDBACK))
        };
        assert_eq!(feedback(&processor), Some(0.5));

        let mut buffer = AudioBuffer::new(2, 256, 44100.0);
        processor.process_block(&mut buffer.as_block());
        assert_eq!(feedback(&processor), Some(0.8));
    }

    #[test]
    fn test_handle_from_control_thread() {
        let mut processor = FxProcessor::new(delay_chain()).unwrap();
        processor.prepare(&ProcessSpec::new(44100.0, 128, 2)).unwrap();
        let handle = processor.handle();

        thread::spawn(move || {
            handle.set_parameter("Delay0.Mix", 0.1).unwrap();
            handle.request_spec(ProcessSpec::new(48000.0, 512, 2));
        })
        .join()
        .unwrap();

        let mut buffer = AudioBuffer::new(2, 128, 48000.0);
        processor.process_block(&mut buffer.as_block());
        assert_eq!(processor.spec(), Some(ProcessSpec::new(48000.0, 512, 2)));
        assert_eq!(processor.core().spec().sample_rate, 48000.0);
        assert_eq!(
            processor.core().get_effect(0).map(|e| e.get_parameter(delay::param::MIX)),
            Some(0.1)
        );
    }

    #[test]
    fn test_prepare_rejects_empty_spec() {
        let mut processor = FxProcessor::new(delay_chain()).unwrap();
        let err = processor.prepare(&ProcessSpec::new(44100.0, 0, 2)).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(processor.spec().is_none());
    }

    #[test]
    fn test_rebind_after_structural_edit() {
        let mut processor = FxProcessor::new(delay_chain()).unwrap();
        assert!(processor.set_parameter("Filter1.Cutoff", 500.0).is_err());

        processor.core_mut().add_effect_type(EffectType::Filter);
        processor.rebind().unwrap();
        processor.set_parameter("Filter1.Cutoff", 500.0).unwrap();

        let mut buffer = AudioBuffer::new(2, 64, 44100.0);
        processor.process_block(&mut buffer.as_block());
        assert_eq!(
            processor.core().get_effect(1).map(|e| e.get_parameter(0)),
            Some(500.0)
        );
    }

    #[test]
    fn test_time_stretch_resize_through_mailbox() {
        let config = EngineConfig::default();
        let mut processor = FxProcessor::new(TimeStretchEngine::new(&config)).unwrap();
        processor.prepare(&ProcessSpec::new(44100.0, 256, 2)).unwrap();
        let before = processor.core().ring_length();

        let handle = processor.handle();
        handle.set_parameter("TimeDiv", 3.0).unwrap();
        handle.request_spec(ProcessSpec::new(96000.0, 256, 2));

        let mut buffer = AudioBuffer::sine(440.0, 0.5, 2, 256, 96000.0);
        processor.process_block(&mut buffer.as_block());
        assert!(processor.core().ring_length() > before);
        assert_eq!(processor.core().get_parameter(time_stretch::param::TIME_DIV), 3.0);
        assert!(buffer.is_valid());
    }

    #[test]
    fn test_granular_parameters_by_key() {
        let config = EngineConfig::default();
        let mut processor = FxProcessor::new(GranularEngine::with_seed(&config, 7)).unwrap();
        processor.prepare(&ProcessSpec::new(44100.0, 512, 2)).unwrap();
        processor.set_parameter("Density", 0.0).unwrap();

        let mut buffer = AudioBuffer::sine(220.0, 0.5, 2, 512, 44100.0);
        processor.process_block(&mut buffer.as_block());
        assert_eq!(processor.core().get_parameter(granular::param::DENSITY), 0.0);
        assert_eq!(processor.core().active_grains(), 0);
    }

    #[test]
    fn test_control_handle_as_parameter_target() {
        let processor = FxProcessor::new(delay_chain()).unwrap();
        let mut handle = processor.handle();
        handle.set_normalized_parameter(0, delay::param::TIME, 0.5);
        assert_eq!(handle.get_parameter("Delay0.Time").unwrap(), 1.0);

        // Unbound addresses are ignored
        handle.set_normalized_parameter(4, 0, 1.0);
        assert!(handle.parameter_descriptor(4, 0).is_none());
    }
}
