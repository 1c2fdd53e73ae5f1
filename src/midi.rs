//! MIDI CC mapping
//!
//! Maps controller numbers onto effect parameters, with a learn mode that
//! binds the next incoming controller to an armed parameter. Controller values
//! are normalized to 0..1 and forwarded through `ParameterTarget`.

use crate::bridge::ParameterTarget;
use crate::state::StateElement;
use tracing::debug;

/// Tag of one saved mapping
pub const MAPPING_TAG: &str = "MidiMapping";

/// Highest controller value
const CC_MAX: f32 = 127.0;

/// One controller binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiMapping {
    pub effect_index: usize,
    pub parameter_index: usize,
    pub cc_number: u8,
}

/// A decoded channel-voice message; only controllers matter here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    ControlChange { channel: u8, controller: u8, value: u8 },
    Other,
}

impl MidiMessage {
    /// Decode a raw three-byte message
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bytes {
            [status, controller, value, ..] if status & 0xF0 == 0xB0 => MidiMessage::ControlChange {
                channel: status & 0x0F,
                controller: controller & 0x7F,
                value: value & 0x7F,
            },
            _ => MidiMessage::Other,
        }
    }
}

/// Controller mapping table with learn mode
#[derive(Debug, Clone, Default)]
pub struct MidiMapper {
    mappings: Vec<MidiMapping>,
    learn_target: Option<(usize, usize)>,
}

impl MidiMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a controller to a parameter, replacing any binding that parameter had
    pub fn add_mapping(&mut self, effect_index: usize, parameter_index: usize, cc_number: u8) {
        self.remove_mapping(effect_index, parameter_index);
        self.mappings.push(MidiMapping {
            effect_index,
            parameter_index,
            cc_number,
        });
        debug!(effect_index, parameter_index, cc_number, "midi mapping added");
    }

    pub fn remove_mapping(&mut self, effect_index: usize, parameter_index: usize) {
        self.mappings
            .retain(|m| !(m.effect_index == effect_index && m.parameter_index == parameter_index));
    }

    pub fn clear_all_mappings(&mut self) {
        self.mappings.clear();
    }

    pub fn mappings(&self) -> &[MidiMapping] {
        &self.mappings
    }

    /// Arm learn mode; the next controller received binds to this parameter
    pub fn start_learn(&mut self, effect_index: usize, parameter_index: usize) {
        self.learn_target = Some((effect_index, parameter_index));
    }

    pub fn cancel_learn(&mut self) {
        self.learn_target = None;
    }

    pub fn is_learn_active(&self) -> bool {
        self.learn_target.is_some()
    }

    pub fn is_parameter_mapped(&self, effect_index: usize, parameter_index: usize) -> bool {
        self.mapped_cc(effect_index, parameter_index).is_some()
    }

    /// Controller bound to a parameter
    pub fn mapped_cc(&self, effect_index: usize, parameter_index: usize) -> Option<u8> {
        self.mappings
            .iter()
            .find(|m| m.effect_index == effect_index && m.parameter_index == parameter_index)
            .map(|m| m.cc_number)
    }

    /// Handle a raw message; non-controller messages are ignored
    pub fn handle_message<T: ParameterTarget + ?Sized>(&mut self, message: MidiMessage, target: &mut T) {
        if let MidiMessage::ControlChange {
            controller, value, ..
        } = message
        {
            self.handle_cc(controller, value, target);
        }
    }

    /// Handle one controller change
    ///
    /// In learn mode the controller is bound and nothing is forwarded.
    /// Otherwise `value / 127` goes to every parameter bound to `cc_number`.
    pub fn handle_cc<T: ParameterTarget + ?Sized>(&mut self, cc_number: u8, value: u8, target: &mut T) {
        if let Some((effect_index, parameter_index)) = self.learn_target.take() {
            self.add_mapping(effect_index, parameter_index, cc_number);
            return;
        }

        let normalized = f32::from(value.min(127)) / CC_MAX;
        for m in self.mappings.iter().filter(|m| m.cc_number == cc_number) {
            target.set_normalized_parameter(m.effect_index, m.parameter_index, normalized);
        }
    }

    /// Append one `MidiMapping` child per binding
    pub fn save_state(&self, element: &mut StateElement) {
        for m in &self.mappings {
            let child = element.add_child(StateElement::new(MAPPING_TAG));
            child.set_f64("effectIndex", m.effect_index as f64);
            child.set_f64("parameterIndex", m.parameter_index as f64);
            child.set_f64("ccNumber", f64::from(m.cc_number));
        }
    }

    /// Replace all bindings with the `MidiMapping` children of `element`
    ///
    /// Children with missing or invalid fields are skipped.
    pub fn load_state(&mut self, element: &StateElement) {
        self.clear_all_mappings();
        for child in element.children_named(MAPPING_TAG) {
            let fields = (
                child.get_usize("effectIndex"),
                child.get_usize("parameterIndex"),
                child.get_usize("ccNumber").and_then(|cc| u8::try_from(cc).ok()),
            );
            match fields {
                (Some(effect_index), Some(parameter_index), Some(cc)) if cc <= 127 => {
                    self.add_mapping(effect_index, parameter_index, cc);
                }
                _ => debug!("skipping malformed midi mapping"),
            }
        }
    }
}
