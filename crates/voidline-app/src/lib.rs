//! VOIDLINE headless driver.
//!
//! Wires the simulation crates into a runnable process: CLI parsing,
//! tracing setup, config loading, the fixed-step game loop thread and the
//! shared handle presentation readers use to fetch published traces.

use std::path::PathBuf;

use thiserror::Error;

use voidline_core::config::ConfigError;
use voidline_sim::SimError;

pub mod bootstrap;
pub mod cli;
pub mod game_loop;
pub mod script;
pub mod state;

pub use voidline_core as core;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid key script: {0}")]
    Script(#[from] script::ScriptError),
    #[error("failed to spawn game loop thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
    #[error("game loop thread panicked")]
    LoopPanicked,
    #[error("simulation fault: {0}")]
    Sim(#[from] SimError),
    #[error("failed to encode run summary: {0}")]
    Encode(#[from] serde_json::Error),
}
