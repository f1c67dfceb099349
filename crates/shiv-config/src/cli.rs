//! Command-line argument parsing for the arena host.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Arena host command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "shiv-server", about = "Shiv Arena authority host")]
pub struct CliArgs {
    /// Bind address.
    #[arg(long)]
    pub bind: Option<String>,

    /// Host port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum connected participants.
    #[arg(long)]
    pub max_participants: Option<u32>,

    /// Simulation tick rate in Hz.
    #[arg(long)]
    pub tick_rate: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of scripted local participants to run.
    #[arg(long, default_value_t = 2)]
    pub bots: u32,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref bind) = args.bind {
            self.network.bind_address = bind.clone();
        }
        if let Some(port) = args.port {
            self.network.port = port;
        }
        if let Some(max) = args.max_participants {
            self.network.max_participants = max;
        }
        if let Some(rate) = args.tick_rate {
            self.network.tick_rate = rate;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override_precedence() {
        let mut config = Config::default();
        let args = CliArgs {
            port: Some(9999),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.network.port, 9999);
        assert_eq!(config.debug.log_level, "debug");
        // Untouched fields keep their loaded values.
        assert_eq!(config.network.bind_address, "127.0.0.1");
    }
}
