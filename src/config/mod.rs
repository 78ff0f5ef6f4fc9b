mod schema;

pub use schema::*;

use std::path::Path;
use thiserror::Error;

use crate::filter::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.maxrows.debug > debug::ALL {
        return Err(ConfigError::Invalid(format!(
            "maxrows.debug must be between {} and {}, got {}",
            debug::NONE,
            debug::ALL,
            config.maxrows.debug
        )));
    }
    Ok(())
}
