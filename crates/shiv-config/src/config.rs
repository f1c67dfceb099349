//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Network/session settings.
    pub network: NetworkConfig,
    /// Arena geometry settings.
    pub arena: ArenaConfig,
    /// Combat tunables.
    pub combat: CombatConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Network/session configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the host binds on.
    pub bind_address: String,
    /// Host port.
    pub port: u16,
    /// Maximum number of connected participants.
    pub max_participants: u32,
    /// Authority simulation tick rate (Hz).
    pub tick_rate: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 7777,
            max_participants: 16,
            tick_rate: 60,
        }
    }
}

/// Arena geometry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArenaConfig {
    /// Spawn points participants respawn at (chosen at random).
    pub spawn_points: Vec<[f32; 3]>,
    /// Distance from the arena center past which a participant is warped
    /// back to a spawn point.
    pub out_of_bounds_radius: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            spawn_points: vec![
                [20.0, 0.5, 20.0],
                [-20.0, 0.5, 20.0],
                [-20.0, 0.5, -20.0],
                [20.0, 0.5, -20.0],
            ],
            out_of_bounds_radius: 60.0,
        }
    }
}

/// Combat tunables. Defaults match the balance the arena shipped with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CombatConfig {
    /// Seconds between dashes.
    pub dash_cooldown: f32,
    /// Dash speed while the dash window is open.
    pub dash_power: f32,
    /// Length of the dash window in seconds.
    pub dash_length: f32,
    /// Speed applied once the dash window closes.
    pub after_dash_speed: f32,
    /// Seconds between death and respawn.
    pub respawn_duration: f32,
    /// Stun added per non-lethal hit, in seconds. Re-triggers accumulate.
    pub stun_duration: f32,
    /// Post-respawn immunity window in seconds.
    pub invulnerable_time: f32,
    /// Immunity window granted with each dash, in seconds.
    pub dash_invulnerable_time: f32,
    /// Magnitude of the random direction perturbation per thrown knife.
    pub knife_spread: f32,
    /// Seconds between knife bursts.
    pub knife_cooldown: f32,
    /// Knives per burst.
    pub knife_count: u32,
    /// Delay between knives within a burst, in seconds.
    pub knife_burst_time: f32,
    /// Knife flight speed.
    pub knife_speed: f32,
    /// Knife lifetime budget in seconds.
    pub knife_lifetime: f32,
    /// Window after an attack input during which the combo chains to the
    /// next stage, in seconds.
    pub melee_grace: f32,
    /// Maximum knife aim-ray distance.
    pub aim_max_distance: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            dash_cooldown: 3.0,
            dash_power: 10.0,
            dash_length: 0.2,
            after_dash_speed: 10.0,
            respawn_duration: 5.0,
            stun_duration: 0.6,
            invulnerable_time: 3.0,
            dash_invulnerable_time: 0.5,
            knife_spread: 0.05,
            knife_cooldown: 10.0,
            knife_count: 3,
            knife_burst_time: 0.1,
            knife_speed: 5.0,
            knife_lifetime: 60.0,
            melee_grace: 0.3,
            aim_max_distance: 100.0,
        }
    }
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Allow the debug self-kill request.
    pub allow_suicide: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            allow_suicide: false,
        }
    }
}

// --- Load / Save ---

impl Config {
    /// The default config directory (`<platform config dir>/shiv-arena`),
    /// falling back to the working directory.
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .map(|base| base.join("shiv-arena"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            tracing::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            tracing::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
