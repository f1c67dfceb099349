//! Configuration for the arena host: typed sections with sensible defaults,
//! RON persistence, and CLI overrides.

pub mod cli;
pub mod config;
pub mod error;

pub use cli::CliArgs;
pub use config::{ArenaConfig, CombatConfig, Config, DebugConfig, NetworkConfig};
pub use error::ConfigError;
