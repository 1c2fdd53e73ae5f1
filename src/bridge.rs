//! Parameter bridge between the control thread and the audio thread
//!
//! The control thread writes host parameters into `AtomicParam` cells; the
//! audio thread copies every cell once at the start of a block and applies
//! the values that moved. Spec changes posted from the control thread travel
//! through `SpecMailbox`, the only lock shared with the audio thread.

use crate::dsp::audio_buffer::ProcessSpec;
use crate::dsp::chain::EffectChain;
use crate::dsp::effect::Effect;
use crate::dsp::params::ParameterDescriptor;
use crate::error::{FxError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::debug;

/// Lock-free `f32` cell stored as its bit pattern
#[derive(Debug, Default)]
pub struct AtomicParam(AtomicU32);

impl AtomicParam {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Where a host parameter lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterAddress {
    /// Parameter of an effect in a chain
    Effect {
        effect_index: usize,
        parameter_index: usize,
    },
    /// Parameter of a standalone engine
    Engine { parameter_index: usize },
}

/// Anything that accepts parameter writes addressed by effect and parameter index
pub trait ParameterTarget {
    /// Write a raw parameter value; unknown addresses are ignored
    fn set_effect_parameter(&mut self, effect_index: usize, parameter_index: usize, value: f32);

    /// Range information for an address
    fn parameter_descriptor(
        &self,
        effect_index: usize,
        parameter_index: usize,
    ) -> Option<ParameterDescriptor>;

    /// Write a 0..1 value mapped onto the parameter's range
    fn set_normalized_parameter(&mut self, effect_index: usize, parameter_index: usize, normalized: f32) {
        if let Some(descriptor) = self.parameter_descriptor(effect_index, parameter_index) {
            let value = descriptor.from_normalized(normalized);
            self.set_effect_parameter(effect_index, parameter_index, value);
        }
    }
}

impl ParameterTarget for EffectChain {
    fn set_effect_parameter(&mut self, effect_index: usize, parameter_index: usize, value: f32) {
        EffectChain::set_effect_parameter(self, effect_index, parameter_index, value);
    }

    fn parameter_descriptor(
        &self,
        effect_index: usize,
        parameter_index: usize,
    ) -> Option<ParameterDescriptor> {
        self.get_effect(effect_index)?
            .parameter_descriptors()
            .get(parameter_index)
            .copied()
    }
}

#[derive(Debug)]
struct HostParameter {
    name: String,
    descriptor: ParameterDescriptor,
    address: ParameterAddress,
    cell: AtomicParam,
}

/// Table of host-exposed parameters
///
/// Binding happens on the control thread before the bridge is shared; after
/// that the table shape is fixed and only cell values change.
#[derive(Debug, Default)]
pub struct ParameterBridge {
    parameters: Vec<HostParameter>,
    by_name: HashMap<String, usize>,
}

impl ParameterBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bridge exposing every parameter of every effect in `chain`
    ///
    /// Names follow `<Type><index>.<Key>`, e.g. `Delay0.Time`. Cells start at
    /// the effects' current values.
    pub fn for_chain(chain: &EffectChain) -> Result<Self> {
        let mut bridge = Self::new();
        for (effect_index, effect) in chain.iter().enumerate() {
            for (parameter_index, descriptor) in effect.parameter_descriptors().iter().enumerate() {
                let name = format!("{}{}.{}", effect.effect_type().tag(), effect_index, descriptor.key);
                let index = bridge.bind(
                    &name,
                    *descriptor,
                    ParameterAddress::Effect {
                        effect_index,
                        parameter_index,
                    },
                )?;
                bridge.set(index, effect.get_parameter(parameter_index));
            }
        }
        Ok(bridge)
    }

    /// Expose a single chain parameter under a custom host name
    pub fn bind_effect(
        &mut self,
        chain: &EffectChain,
        name: &str,
        effect_index: usize,
        parameter_index: usize,
    ) -> Result<usize> {
        let out_of_range = || FxError::ParameterOutOfRange {
            effect_index,
            parameter_index,
        };
        let effect = chain.get_effect(effect_index).ok_or_else(out_of_range)?;
        let descriptor = *effect
            .parameter_descriptors()
            .get(parameter_index)
            .ok_or_else(out_of_range)?;
        let index = self.bind(
            name,
            descriptor,
            ParameterAddress::Effect {
                effect_index,
                parameter_index,
            },
        )?;
        self.set(index, effect.get_parameter(parameter_index));
        Ok(index)
    }

    /// Build a bridge over a standalone engine's parameter table
    ///
    /// Names are the descriptor keys.
    pub fn for_engine(descriptors: &[ParameterDescriptor]) -> Result<Self> {
        let mut bridge = Self::new();
        for (parameter_index, descriptor) in descriptors.iter().enumerate() {
            bridge.bind(
                descriptor.key,
                *descriptor,
                ParameterAddress::Engine { parameter_index },
            )?;
        }
        Ok(bridge)
    }

    /// Expose one parameter under a host name; the cell starts at the default
    pub fn bind(
        &mut self,
        name: &str,
        descriptor: ParameterDescriptor,
        address: ParameterAddress,
    ) -> Result<usize> {
        if self.by_name.contains_key(name) {
            return Err(FxError::DuplicateParameter {
                name: name.to_string(),
            });
        }
        let index = self.parameters.len();
        self.parameters.push(HostParameter {
            name: name.to_string(),
            descriptor,
            address,
            cell: AtomicParam::new(descriptor.default),
        });
        self.by_name.insert(name.to_string(), index);
        debug!(name, index, "parameter bound");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Host index of a named parameter
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.parameters.get(index).map(|p| p.name.as_str())
    }

    pub fn descriptor(&self, index: usize) -> Option<&ParameterDescriptor> {
        self.parameters.get(index).map(|p| &p.descriptor)
    }

    pub fn address(&self, index: usize) -> Option<ParameterAddress> {
        self.parameters.get(index).map(|p| p.address)
    }

    /// Host index of the parameter bound to `address`
    pub fn index_of_address(&self, address: ParameterAddress) -> Option<usize> {
        self.parameters.iter().position(|p| p.address == address)
    }

    /// Host names in index order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    /// Write a value from the control thread; unknown indices are ignored
    pub fn set(&self, index: usize, value: f32) {
        if let Some(p) = self.parameters.get(index) {
            p.cell.store(value);
        }
    }

    /// Current value, 0.0 for unknown indices
    pub fn get(&self, index: usize) -> f32 {
        self.parameters.get(index).map_or(0.0, |p| p.cell.load())
    }

    pub fn set_by_name(&self, name: &str, value: f32) -> Result<()> {
        let index = self.index_of(name).ok_or_else(|| FxError::UnknownParameter {
            name: name.to_string(),
        })?;
        self.set(index, value);
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> Result<f32> {
        self.index_of(name)
            .map(|index| self.get(index))
            .ok_or_else(|| FxError::UnknownParameter {
                name: name.to_string(),
            })
    }

    /// Write a normalized 0..1 value, mapped onto the parameter range
    pub fn set_normalized(&self, index: usize, normalized: f32) {
        if let Some(p) = self.parameters.get(index) {
            p.cell.store(p.descriptor.from_normalized(normalized));
        }
    }

    /// Copy every cell into `out`, one relaxed load each
    pub fn snapshot(&self, out: &mut [f32]) {
        for (slot, p) in out.iter_mut().zip(&self.parameters) {
            *slot = p.cell.load();
        }
    }
}

/// Per-block view of the bridge held by the audio thread
///
/// `refresh` reads the cells and reports which ones moved since the last
/// applied value. Storage is sized once at construction.
#[derive(Debug, Clone)]
pub struct ParameterSnapshot {
    current: Vec<f32>,
    applied: Vec<f32>,
}

impl ParameterSnapshot {
    /// Snapshot sized for `bridge`; every value counts as changed on the first refresh
    pub fn new(bridge: &ParameterBridge) -> Self {
        Self {
            current: vec![0.0; bridge.len()],
            applied: vec![f32::NAN; bridge.len()],
        }
    }

    /// Values read by the last refresh
    pub fn values(&self) -> &[f32] {
        &self.current
    }

    /// Read the bridge and visit each parameter whose value changed
    pub fn refresh<F>(&mut self, bridge: &ParameterBridge, mut apply: F)
    where
        F: FnMut(ParameterAddress, f32),
    {
        bridge.snapshot(&mut self.current);
        for (index, (&value, last)) in self.current.iter().zip(self.applied.iter_mut()).enumerate() {
            if value.to_bits() != last.to_bits() {
                *last = value;
                if let Some(address) = bridge.address(index) {
                    apply(address, value);
                }
            }
        }
    }
}

/// Pending spec change posted by the control thread
#[derive(Debug, Default)]
pub struct SpecMailbox {
    pending: AtomicBool,
    slot: Mutex<Option<ProcessSpec>>,
}

impl SpecMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a new spec; a later post replaces an unread one
    pub fn post(&self, spec: ProcessSpec) {
        *self.slot.lock() = Some(spec);
        self.pending.store(true, Ordering::Release);
        debug!(
            sample_rate = spec.sample_rate,
            max_block_size = spec.max_block_size,
            num_channels = spec.num_channels,
            "spec change posted"
        );
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Take the pending spec without blocking
    ///
    /// Returns `None` when nothing is pending or the control thread holds the
    /// lock; the posted ProcessSpec is picked up on a later block.
    pub fn try_take(&self) -> Option<ProcessSpec> {
        if !self.is_pending() {
            return None;
        }
        let mut slot = self.slot.try_lock()?;
        self.pending.store(false, Ordering::Release);
        slot.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::registry::EffectType;
    use crate::dsp::{delay, granular};
    use std::sync::Arc;
    use std::thread;

    fn chain() -> EffectChain {
        let mut chain = EffectChain::new();
        chain.add_effect_type(EffectType::Delay);
        chain.add_effect_type(EffectType::Reverb);
        chain
    }

    #[test]
    fn test_atomic_param_round_trip() {
        let cell = AtomicParam::new(0.25);
        assert_eq!(cell.load(), 0.25);
        cell.store(-3.5);
        assert_eq!(cell.load(), -3.5);
    }

    #[test]
    fn test_for_chain_names_and_values() {
        let mut chain = chain();
        chain.set_effect_parameter(0, delay::param::TIME, 0.2);
        let bridge = ParameterBridge::for_chain(&chain).unwrap();

        assert_eq!(bridge.len(), 4 + 6);
        let time = bridge.index_of("Delay0.Time").unwrap();
        assert_eq!(bridge.get(time), 0.2);
        assert_eq!(
            bridge.address(time),
            Some(ParameterAddress::Effect {
                effect_index: 0,
                parameter_index: delay::param::TIME
            })
        );
        assert!(bridge.index_of("Reverb1.RoomSize").is_some());
        assert!(bridge.index_of("Reverb0.RoomSize").is_none());
    }

    #[test]
    fn test_bind_rejects_duplicates() {
        let mut bridge = ParameterBridge::new();
        let d = delay::DELAY_PARAMETERS[0];
        bridge
            .bind("time", d, ParameterAddress::Engine { parameter_index: 0 })
            .unwrap();
        let err = bridge
            .bind("time", d, ParameterAddress::Engine { parameter_index: 1 })
            .unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_PARAMETER");
    }

    #[test]
    fn test_bind_single_effect_parameter() {
        let chain = chain();
        let mut bridge = ParameterBridge::new();
        let index = bridge
            .bind_effect(&chain, "echo_time", 0, delay::param::TIME)
            .unwrap();
        assert_eq!(bridge.get(index), 0.5);
        assert_eq!(bridge.name(index), Some("echo_time"));

        let err = bridge.bind_effect(&chain, "ghost", 5, 0).unwrap_err();
        assert_eq!(err.error_code(), "PARAMETER_OUT_OF_RANGE");
        let err = bridge.bind_effect(&chain, "ghost", 0, 17).unwrap_err();
        assert!(matches!(
            err,
            FxError::ParameterOutOfRange {
                effect_index: 0,
                parameter_index: 17
            }
        ));
    }

    #[test]
    fn test_unknown_names() {
        let bridge = ParameterBridge::for_chain(&chain()).unwrap();
        assert!(matches!(
            bridge.set_by_name("Chorus0.Rate", 1.0),
            Err(FxError::UnknownParameter { .. })
        ));
        assert!(bridge.get_by_name("nope").is_err());
        // Unknown indices are ignored
        bridge.set(999, 1.0);
        assert_eq!(bridge.get(999), 0.0);
    }

    #[test]
    fn test_engine_bridge_uses_keys() {
        let bridge = ParameterBridge::for_engine(granular::GRANULAR_PARAMETERS).unwrap();
        assert_eq!(bridge.len(), granular::GRANULAR_PARAMETERS.len());
        let density = bridge.index_of("Density").unwrap();
        assert_eq!(
            bridge.address(density),
            Some(ParameterAddress::Engine {
                parameter_index: granular::param::DENSITY
            })
        );
        bridge.set_normalized(density, 0.5);
        assert_eq!(bridge.get(density), 0.5);
    }

    #[test]
    fn test_snapshot_reports_only_changes() {
        let bridge = ParameterBridge::for_chain(&chain()).unwrap();
        let mut snapshot = ParameterSnapshot::new(&bridge);

        let mut changed = Vec::new();
        snapshot.refresh(&bridge, |address, value| changed.push((address, value)));
        assert_eq!(changed.len(), bridge.len());

        changed.clear();
        snapshot.refresh(&bridge, |address, value| changed.push((address, value)));
        assert!(changed.is_empty());

        bridge.set_by_name("Delay0.Mix", 0.9).unwrap();
        snapshot.refresh(&bridge, |address, value| changed.push((address, value)));
        assert_eq!(
            changed,
            vec![(
                ParameterAddress::Effect {
                    effect_index: 0,
                    parameter_index: delay::param::MIX
                },
                0.9
            )]
        );
    }

    #[test]
    fn test_writes_from_another_thread() {
        let bridge = Arc::new(ParameterBridge::for_chain(&chain()).unwrap());
        let control = Arc::clone(&bridge);
        let handle = thread::spawn(move || {
            for i in 0..1000 {
                control.set(0, i as f32 / 1000.0);
            }
        });
        handle.join().unwrap();
        assert_eq!(bridge.get(0), 0.999);
    }

    #[test]
    fn test_mailbox_take_once() {
        let mailbox = SpecMailbox::new();
        assert!(mailbox.try_take().is_none());

        mailbox.post(ProcessSpec::new(48000.0, 256, 2));
        mailbox.post(ProcessSpec::new(96000.0, 1024, 2));
        assert!(mailbox.is_pending());
        assert_eq!(mailbox.try_take(), Some(ProcessSpec::new(96000.0, 1024, 2)));
        assert!(!mailbox.is_pending());
        assert!(mailbox.try_take().is_none());
    }

    #[test]
    fn test_mailbox_try_take_does_not_block() {
        let mailbox = SpecMailbox::new();
        mailbox.post(ProcessSpec::new(48000.0, 256, 2));
        let guard = mailbox.slot.lock();
        assert!(mailbox.try_take().is_none());
        drop(guard);
        assert!(mailbox.try_take().is_some());
    }
}
