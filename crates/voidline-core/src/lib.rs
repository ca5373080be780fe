//! Core types and definitions for the VOIDLINE simulation.
//!
//! This crate defines the vocabulary shared across all other crates:
//! identities, components, commands, world-state records, events,
//! configuration and constants. It has no dependency on an ECS or any
//! runtime framework.

pub mod commands;
pub mod components;
pub mod config;
pub mod constants;
pub mod enums;
pub mod events;
pub mod identity;
pub mod state;
pub mod types;

pub use identity::IdentityService;
pub use types::{SimTime, SpawnIntent, SubstepSample, Uid};
