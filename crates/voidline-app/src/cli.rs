//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use voidline_core::config::SimConfig;

use crate::game_loop::LoopConfig;
use crate::AppError;

/// Headless VOIDLINE simulation driver
#[derive(Parser, Debug)]
#[command(name = "voidline")]
#[command(about = "Run the VOIDLINE simulation headless and print a run summary")]
pub struct Args {
    /// JSON config file; built-in demo systems when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Frames to run; 0 runs until Escape is pressed
    #[arg(long, default_value_t = 300)]
    pub frames: u64,

    /// Random seed override
    #[arg(long)]
    pub seed: Option<u64>,

    /// Initial time scale override
    #[arg(long)]
    pub time_scale: Option<f64>,

    /// Pace ticks against the wall clock instead of running flat out
    #[arg(long)]
    pub realtime: bool,

    /// Scripted key tap, e.g. `30:F1` (repeatable)
    #[arg(long = "press", value_name = "FRAME:KEY")]
    pub press: Vec<String>,
}

impl Args {
    pub fn load_config(&self) -> Result<SimConfig, AppError> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| AppError::ConfigIo {
                    path: path.clone(),
                    source,
                })?;
                SimConfig::from_json_str(&raw)?
            }
            None => SimConfig::default(),
        };

        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(scale) = self.time_scale {
            config.time_scale = scale;
        }
        Ok(config)
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_frames: (self.frames > 0).then_some(self.frames),
            throttle: self.realtime,
            ..LoopConfig::default()
        }
    }
}
