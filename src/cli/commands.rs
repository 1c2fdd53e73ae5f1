//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use super::RenderArgs;
use crate::config::EngineConfig;
use crate::dsp::audio_buffer::{AudioBuffer, ProcessSpec};
use crate::dsp::chain::EffectChain;
use crate::dsp::effect::Effect;
use crate::dsp::granular::GranularEngine;
use crate::dsp::registry::{AnyEffect, EffectType};
use crate::dsp::time_stretch::{param as stretch_param, TimeStretchEngine, DIVISION_LABELS};
use crate::io::{read_wav, write_wav, ExportFormat};
use crate::processor::{FxProcessor, ProcessorCore};

/// Load the engine configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = EngineConfig::from_json_str(&text)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    info!("Loaded engine config from {}", path.display());
    Ok(config)
}

/// Render a file through an effect chain.
pub fn render_chain(
    config: &EngineConfig,
    render: &RenderArgs,
    effects: &[String],
    state: Option<&Path>,
    save_state: Option<&Path>,
) -> Result<()> {
    let mut chain = EffectChain::with_config(config.clone());

    match state {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read chain state {}", path.display()))?;
            chain
                .from_json(&json)
                .with_context(|| format!("Invalid chain state {}", path.display()))?;
            if !effects.is_empty() {
                warn!("--effect ignored because --state was given");
            }
        }
        None => {
            for name in effects {
                let effect_type: EffectType = name
                    .parse()
                    .with_context(|| format!("Unknown effect `{name}`"))?;
                chain.add_effect(AnyEffect::with_config(effect_type, config));
            }
        }
    }

    if chain.is_empty() {
        warn!("Effect chain is empty; output will equal input");
    }
    info!(
        "Chain: {}",
        chain
            .iter()
            .map(|e| e.name())
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let processor = run_render(chain, render)?;

    if let Some(path) = save_state {
        let json = processor.core().to_json()?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write chain state {}", path.display()))?;
        println!("Chain state saved: {}", path.display());
    }

    Ok(())
}

/// Render a file through the time-stretch engine.
pub fn render_stretch(
    config: &EngineConfig,
    render: &RenderArgs,
    division: u8,
    pitch: f32,
    mix: f32,
) -> Result<()> {
    if usize::from(division) >= DIVISION_LABELS.len() {
        bail!("Division must be 0..{}", DIVISION_LABELS.len() - 1);
    }

    let mut engine = TimeStretchEngine::new(config);
    engine.set_parameter(stretch_param::TIME_DIV, f32::from(division));
    engine.set_parameter(stretch_param::PITCH, pitch);
    engine.set_parameter(stretch_param::MIX, mix);
    info!(
        "Time-stretch {} at {:+} st, ratio {:.3}",
        DIVISION_LABELS[usize::from(division)],
        pitch,
        engine.ratio()
    );

    run_render(engine, render)?;
    Ok(())
}

/// Render a file through the granular engine.
pub fn render_granular(config: &EngineConfig, render: &RenderArgs, seed: Option<u64>) -> Result<()> {
    let engine = match seed {
        Some(seed) => GranularEngine::with_seed(config, seed),
        None => GranularEngine::new(config),
    };
    run_render(engine, render)?;
    Ok(())
}

/// Print every effect type with its parameter table.
pub fn list_effects() -> Result<()> {
    for effect_type in EffectType::ALL {
        let effect = AnyEffect::new(effect_type);
        println!("{} [{}] ({})", effect.name(), effect.category(), effect_type.tag());
        for descriptor in effect.parameter_descriptors() {
            println!(
                "  {:<12} {:>6} .. {:<8} default {:<8} {}",
                descriptor.key, descriptor.min, descriptor.max, descriptor.default, descriptor.label
            );
        }
    }
    Ok(())
}

/// Read the input, push it through the core block by block, write the output.
fn run_render<C: ProcessorCore>(core: C, render: &RenderArgs) -> Result<FxProcessor<C>> {
    if render.block_size == 0 {
        bail!("Block size must be at least 1");
    }

    let mut buffer = read_wav(&render.input)
        .with_context(|| format!("Failed to read {}", render.input.display()))?;
    info!(
        "Input: {} ({} ch, {} samples, {} Hz)",
        render.input.display(),
        buffer.num_channels(),
        buffer.num_samples(),
        buffer.sample_rate()
    );

    let mut processor = FxProcessor::new(core)?;
    for (name, value) in &render.set {
        processor
            .set_parameter(name, *value)
            .with_context(|| format!("Cannot set `{name}`"))?;
    }

    let spec = ProcessSpec::new(buffer.sample_rate(), render.block_size, buffer.num_channels());
    processor.prepare(&spec)?;
    process_in_blocks(&mut processor, &mut buffer, render.block_size);

    if !buffer.is_valid() {
        warn!("Output contains non-finite or out-of-range samples");
    }

    write_wav(&render.output, &buffer, ExportFormat::new(render.bit_depth))
        .with_context(|| format!("Failed to write {}", render.output.display()))?;
    println!("Rendered: {}", render.output.display());
    Ok(processor)
}

/// Process a whole buffer in consecutive blocks of at most `block_size` samples.
pub fn process_in_blocks<C: ProcessorCore>(
    processor: &mut FxProcessor<C>,
    buffer: &mut AudioBuffer,
    block_size: usize,
) {
    let total = buffer.num_samples();
    let mut start = 0;
    while start < total {
        let len = block_size.min(total - start);
        processor.process_block(&mut buffer.block_range(start, len));
        start += len;
    }
}
