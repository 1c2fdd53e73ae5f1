//! CLI Module
//!
//! Offline renderer for sampler-fx: runs WAV files through an effect chain or
//! one of the standalone engines, block by block, the way a host would.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sampler FX - effect chain, tape time-stretch and granular renderer
#[derive(Parser, Debug)]
#[command(name = "sampler-fx")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every render command
#[derive(clap::Args, Debug, Clone)]
pub struct RenderArgs {
    /// Input WAV file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output WAV file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Block size used for processing
    #[arg(short, long, default_value_t = 512)]
    pub block_size: usize,

    /// Output bit depth (16, 24 or 32)
    #[arg(long, default_value_t = 24)]
    pub bit_depth: u16,

    /// Host parameter assignment, e.g. `Delay0.Time=0.25`
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, f32)>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a file through an effect chain
    #[command(name = "chain")]
    Chain {
        #[command(flatten)]
        render: RenderArgs,

        /// Effects in signal order (reverb, delay, filter, distortion, saturation, pitch)
        #[arg(short, long = "effect", value_name = "TYPE")]
        effects: Vec<String>,

        /// Load the chain from a saved state file instead of --effect
        #[arg(long)]
        state: Option<PathBuf>,

        /// Write the final chain state to this file
        #[arg(long)]
        save_state: Option<PathBuf>,
    },

    /// Render a file through the tape time-stretch engine
    #[command(name = "stretch")]
    Stretch {
        #[command(flatten)]
        render: RenderArgs,

        /// Division index 0..6 (1/1 .. 1/64)
        #[arg(short, long, default_value_t = 0)]
        division: u8,

        /// Pitch in semitones (-12..12)
        #[arg(short, long, default_value_t = 0.0, allow_hyphen_values = true)]
        pitch: f32,

        /// Wet mix in percent (0..100)
        #[arg(short, long, default_value_t = 100.0)]
        mix: f32,
    },

    /// Render a file through the granular engine
    #[command(name = "granular")]
    Granular {
        #[command(flatten)]
        render: RenderArgs,

        /// Seed for grain scheduling
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List effects and their parameters
    #[command(name = "effects")]
    Effects,
}

/// Parse `NAME=VALUE`
fn parse_assignment(s: &str) -> Result<(String, f32), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    let value = value
        .trim()
        .parse::<f32>()
        .map_err(|e| format!("invalid value for `{name}`: {e}"))?;
    Ok((name.trim().to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("Delay0.Time=0.25"),
            Ok(("Delay0.Time".to_string(), 0.25))
        );
        assert_eq!(parse_assignment("Pitch = -7"), Ok(("Pitch".to_string(), -7.0)));
        assert!(parse_assignment("Mix").is_err());
        assert!(parse_assignment("Mix=loud").is_err());
    }

    #[test]
    fn test_cli_parses_chain() {
        let cli = Cli::try_parse_from([
            "sampler-fx",
            "chain",
            "-i",
            "in.wav",
            "-o",
            "out.wav",
            "-e",
            "delay",
            "-e",
            "reverb",
            "--set",
            "Delay0.Mix=0.3",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Chain {
                render, effects, ..
            }) => {
                assert_eq!(effects, vec!["delay", "reverb"]);
                assert_eq!(render.block_size, 512);
                assert_eq!(render.set, vec![("Delay0.Mix".to_string(), 0.3)]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_stretch() {
        let cli = Cli::try_parse_from([
            "sampler-fx", "stretch", "-i", "a.wav", "-o", "b.wav", "-d", "2", "-p", "-3",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Stretch {
                division, pitch, mix, ..
            }) => {
                assert_eq!(division, 2);
                assert_eq!(pitch, -3.0);
                assert_eq!(mix, 100.0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
