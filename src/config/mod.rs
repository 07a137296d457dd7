//! Configuration module - environment variable parsing

use std::env;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Fixed RNG seed for the arena (random when unset)
    pub arena_seed: Option<u64>,
    /// Maximum players per arena
    pub max_players: usize,
    /// Number of scripted demo players to drive
    pub demo_players: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let arena_seed = match env::var("ARENA_SEED") {
            Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid("ARENA_SEED"))?),
            Err(_) => None,
        };

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            arena_seed,

            max_players: env::var("ARENA_MAX_PLAYERS")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("ARENA_MAX_PLAYERS"))?,

            demo_players: env::var("DEMO_PLAYERS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("DEMO_PLAYERS"))?,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
